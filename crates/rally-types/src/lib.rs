//! Shared types and constants for the Rally platform.
//!
//! This crate provides the foundational types used across all Rally crates:
//! the event and guest records, tri-state attendance, sort direction for
//! keyset feeds, notification types, and per-user delivery channel flags.
//!
//! No crate in the workspace depends on anything *except* `rally-types` for
//! cross-cutting type definitions. This keeps the dependency graph clean and
//! prevents circular dependencies.

use serde::{Deserialize, Serialize};

mod event;
pub use event::{Event, Guest, Location};

/// Tri-state attendance of a guest.
///
/// Persisted as a nullable boolean: `true` accepted, `false` declined,
/// `NULL` pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Attendance {
    /// The guest accepted the invitation.
    Accepted,
    /// The guest declined the invitation.
    Declined,
    /// The guest has not answered yet.
    Pending,
}

impl Attendance {
    /// Converts the nullable database flag into an `Attendance`.
    pub fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            Some(true) => Self::Accepted,
            Some(false) => Self::Declined,
            None => Self::Pending,
        }
    }

    /// Returns the nullable database flag for this attendance.
    pub fn as_flag(self) -> Option<bool> {
        match self {
            Self::Accepted => Some(true),
            Self::Declined => Some(false),
            Self::Pending => None,
        }
    }

    /// Returns the string label for this attendance.
    pub fn label(self) -> &'static str {
        match self {
            Self::Accepted => "ACCEPTED",
            Self::Declined => "DECLINED",
            Self::Pending => "PENDING",
        }
    }
}

/// Sort direction for `(starts_at, id)` ordered feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    /// Oldest `starts_at` first.
    #[default]
    Asc,
    /// Newest `starts_at` first.
    Desc,
}

impl SortOrder {
    /// SQL keyword for `ORDER BY`.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// Comparison operator that moves past the cursor in this direction.
    pub fn operator(self) -> &'static str {
        match self {
            Self::Asc => ">",
            Self::Desc => "<",
        }
    }
}

/// Kinds of notification the platform can emit about an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    /// The event was cancelled by its owner.
    EventCancelled,
    /// The event's start or end time changed.
    EventDateTimeUpdated,
    /// The event's location changed.
    EventLocationUpdated,
    /// A new organization-wide event was created.
    NewAllTeamsEvent,
    /// The recipient was added to the guest list.
    EventInvitation,
    /// The recipient was removed from the guest list.
    EventInvitationRemoved,
    /// The recipient has not answered an invitation to an upcoming event.
    AwaitingInvitation,
}

impl NotificationType {
    /// Returns the canonical string label for this notification type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EventCancelled => "EVENT_CANCELLED",
            Self::EventDateTimeUpdated => "EVENT_DATE_TIME_UPDATED",
            Self::EventLocationUpdated => "EVENT_LOCATION_UPDATED",
            Self::NewAllTeamsEvent => "NEW_ALL_TEAMS_EVENT",
            Self::EventInvitation => "EVENT_INVITATION",
            Self::EventInvitationRemoved => "EVENT_INVITATION_REMOVED",
            Self::AwaitingInvitation => "AWAITING_INVITATION",
        }
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-user delivery channel preferences.
///
/// A user without a stored preference row receives every channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelFlags {
    /// Mobile push notifications.
    pub push: bool,
    /// Email notifications.
    pub email: bool,
    /// SMS notifications.
    pub sms: bool,
}

impl ChannelFlags {
    /// Returns `true` if at least one channel is enabled.
    pub fn any_enabled(&self) -> bool {
        self.push || self.email || self.sms
    }
}

impl Default for ChannelFlags {
    fn default() -> Self {
        Self {
            push: true,
            email: true,
            sms: true,
        }
    }
}
