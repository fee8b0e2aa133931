//! Notification fan-out for event state changes.
//!
//! The [`NotificationDispatcher`] turns one domain-change signal into zero or
//! more deliveries. Recipients are derived at call time from the current
//! guest list (or, for new all-teams events, from every registered user),
//! filtered by channel preferences, then handed to a
//! [`NotificationChannel`].
//!
//! Dispatch never fails its caller. Every call returns a
//! [`DispatchOutcome`]; errors are logged with the triggering event id and
//! reported as [`DispatchOutcome::Failed`].

mod batch;
mod channel;
mod dispatcher;
mod error;

pub use batch::{BatchFailure, BatchReport};
pub use channel::{DeliveryError, NotificationChannel, NotificationPayload, TracingChannel};
pub use dispatcher::{DispatchOutcome, GuestListOutcome, NotificationDispatcher};
pub use error::NotifyError;
