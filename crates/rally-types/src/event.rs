//! Event and guest records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Attendance;

/// Structured location of an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lng: f64,
    /// Human readable place name.
    pub name: Option<String>,
}

/// A calendar event.
///
/// An event with no `team_id` is an all-teams event, visible to every user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Sortable unique identifier (UUID v7).
    pub id: String,
    /// User who created the event and may mutate it.
    pub owner_id: String,
    /// Owning team, or `None` for an all-teams event.
    pub team_id: Option<String>,
    pub title: String,
    pub description: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    /// Event targets a single invitee rather than the whole team.
    pub is_individual: bool,
    pub is_cancelled: bool,
    pub address: Option<String>,
    pub image_url: Option<String>,
    pub location: Option<Location>,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
    /// Last update timestamp (ISO 8601).
    pub updated_at: String,
}

impl Event {
    /// Returns `true` if the event has no owning team.
    pub fn is_all_teams(&self) -> bool {
        self.team_id.is_none()
    }

    /// Returns `true` if `now` is at or past the event's start.
    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.starts_at <= now
    }
}

/// An invitation linking a user to an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guest {
    pub event_id: String,
    pub user_id: String,
    pub attendance: Attendance,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
    /// Last update timestamp (ISO 8601).
    pub updated_at: String,
}
