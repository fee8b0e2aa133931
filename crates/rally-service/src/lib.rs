//! Business rules for events.
//!
//! [`EventService`] validates every mutation, enforces ownership and
//! visibility, bootstraps guest lists and decides which notifications fire.
//! Notifications are best-effort: their outcomes are returned next to the
//! mutation result in an [`Outcome`] and never turn a successful mutation
//! into an error.
//!
//! Each inbound request builds a fresh [`RequestCache`] and passes it to
//! every call it makes, so loaded rows never outlive the request.

mod cache;
mod error;
mod feeds;
mod service;

pub use cache::RequestCache;
pub use error::ServiceError;
pub use feeds::PageRequest;
pub use service::{EventService, Outcome};
