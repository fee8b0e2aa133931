//! Delivery seam and the payload handed to it.

use chrono::{DateTime, Utc};
use rally_directory::Recipient;
use rally_types::{Event, Location, NotificationType};
use serde::{Deserialize, Serialize};

/// Error reported by a delivery channel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{channel}: {message}")]
pub struct DeliveryError {
    /// Name of the channel that failed.
    pub channel: String,
    pub message: String,
}

impl DeliveryError {
    pub fn new(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            message: message.into(),
        }
    }
}

/// Snapshot of the event a notification is about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub event_id: String,
    pub title: String,
    pub team_id: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_cancelled: bool,
    pub address: Option<String>,
    pub location: Option<Location>,
}

impl From<&Event> for NotificationPayload {
    fn from(event: &Event) -> Self {
        Self {
            event_id: event.id.clone(),
            title: event.title.clone(),
            team_id: event.team_id.clone(),
            starts_at: event.starts_at,
            ends_at: event.ends_at,
            is_cancelled: event.is_cancelled,
            address: event.address.clone(),
            location: event.location.clone(),
        }
    }
}

/// Something that can deliver a notification to a set of recipients.
///
/// Implementations decide how each recipient's [`rally_types::ChannelFlags`]
/// map to push, email or SMS. Calls are blocking; the dispatcher invokes
/// them from synchronous request code and from blocking batch workers.
pub trait NotificationChannel: Send + Sync {
    fn notify(
        &self,
        recipients: &[Recipient],
        notification_type: NotificationType,
        payload: &NotificationPayload,
    ) -> Result<(), DeliveryError>;
}

/// Channel that records each notification as a structured log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingChannel;

impl NotificationChannel for TracingChannel {
    fn notify(
        &self,
        recipients: &[Recipient],
        notification_type: NotificationType,
        payload: &NotificationPayload,
    ) -> Result<(), DeliveryError> {
        let body = serde_json::to_string(payload)
            .map_err(|e| DeliveryError::new("tracing", e.to_string()))?;
        let push = recipients.iter().filter(|r| r.channels.push).count();
        let email = recipients.iter().filter(|r| r.channels.email).count();
        let sms = recipients.iter().filter(|r| r.channels.sms).count();

        tracing::info!(
            notification_type = %notification_type,
            event_id = %payload.event_id,
            recipients = recipients.len(),
            push,
            email,
            sms,
            payload = %body,
            "notification dispatched"
        );
        Ok(())
    }
}
