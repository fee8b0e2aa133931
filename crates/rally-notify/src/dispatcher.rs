//! Per-event notification triggers.

use std::sync::Arc;

use rally_directory::{find_recipients_by_user_ids, get_all_registered_user_ids, Recipient};
use rally_events::{find_event_by_id, find_guest_user_ids};
use rally_types::{Event, NotificationType};
use rusqlite::Connection;

use crate::{NotificationChannel, NotificationPayload, NotifyError};

/// Result of a single dispatch.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The channel accepted the notification for these user ids.
    Delivered { recipients: Vec<String> },
    /// Nothing was sent, e.g. because no recipient remained.
    Skipped(String),
    /// Dispatch failed. The error has already been logged.
    Failed(NotifyError),
}

impl DispatchOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// User ids that received the notification. Empty unless delivered.
    pub fn recipients(&self) -> &[String] {
        match self {
            Self::Delivered { recipients } => recipients,
            _ => &[],
        }
    }
}

/// Outcomes of a guest-list update, one per group.
#[derive(Debug)]
pub struct GuestListOutcome {
    pub invited: DispatchOutcome,
    pub removed: DispatchOutcome,
}

/// Computes recipients for event changes and hands them to a channel.
#[derive(Clone)]
pub struct NotificationDispatcher {
    channel: Arc<dyn NotificationChannel>,
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher").finish_non_exhaustive()
    }
}

impl NotificationDispatcher {
    pub fn new(channel: Arc<dyn NotificationChannel>) -> Self {
        Self { channel }
    }

    pub fn notify_on_event_cancellation(
        &self,
        conn: &Connection,
        event_id: &str,
        is_owner_included: bool,
    ) -> DispatchOutcome {
        self.notify_guests(
            conn,
            event_id,
            NotificationType::EventCancelled,
            is_owner_included,
        )
    }

    pub fn notify_on_event_date_time_update(
        &self,
        conn: &Connection,
        event_id: &str,
        is_owner_included: bool,
    ) -> DispatchOutcome {
        self.notify_guests(
            conn,
            event_id,
            NotificationType::EventDateTimeUpdated,
            is_owner_included,
        )
    }

    pub fn notify_on_event_location_update(
        &self,
        conn: &Connection,
        event_id: &str,
        is_owner_included: bool,
    ) -> DispatchOutcome {
        self.notify_guests(
            conn,
            event_id,
            NotificationType::EventLocationUpdated,
            is_owner_included,
        )
    }

    /// Notifies every registered user about a new all-teams event.
    pub fn notify_on_new_all_teams_event(
        &self,
        conn: &Connection,
        event_id: &str,
        is_owner_included: bool,
    ) -> DispatchOutcome {
        let kind = NotificationType::NewAllTeamsEvent;
        let result = load_event(conn, event_id).and_then(|event| {
            let user_ids = get_all_registered_user_ids(conn)?;
            let user_ids = exclude_owner(user_ids, &event, is_owner_included);
            self.deliver(conn, &event, kind, &user_ids)
        });
        settle(event_id, kind, result)
    }

    /// Notifies users added to and removed from the guest list.
    ///
    /// The two groups are dispatched separately, so a failure in one does
    /// not prevent the other.
    pub fn notify_on_event_guest_list_update(
        &self,
        conn: &Connection,
        event_id: &str,
        added_user_ids: &[String],
        removed_user_ids: &[String],
        exclude_owner_id: bool,
    ) -> GuestListOutcome {
        let group = |kind: NotificationType, user_ids: &[String]| {
            let result = load_event(conn, event_id).and_then(|event| {
                let user_ids = exclude_owner(user_ids.to_vec(), &event, !exclude_owner_id);
                self.deliver(conn, &event, kind, &user_ids)
            });
            settle(event_id, kind, result)
        };

        GuestListOutcome {
            invited: group(NotificationType::EventInvitation, added_user_ids),
            removed: group(NotificationType::EventInvitationRemoved, removed_user_ids),
        }
    }

    fn notify_guests(
        &self,
        conn: &Connection,
        event_id: &str,
        kind: NotificationType,
        is_owner_included: bool,
    ) -> DispatchOutcome {
        let result = load_event(conn, event_id).and_then(|event| {
            let user_ids = find_guest_user_ids(conn, event_id)?;
            let user_ids = exclude_owner(user_ids, &event, is_owner_included);
            self.deliver(conn, &event, kind, &user_ids)
        });
        settle(event_id, kind, result)
    }

    /// Resolves preferences for `user_ids` and sends to those with at least
    /// one channel enabled.
    pub(crate) fn deliver(
        &self,
        conn: &Connection,
        event: &Event,
        kind: NotificationType,
        user_ids: &[String],
    ) -> Result<DispatchOutcome, NotifyError> {
        if user_ids.is_empty() {
            return Ok(DispatchOutcome::Skipped("no recipients".to_string()));
        }

        let recipients: Vec<Recipient> = find_recipients_by_user_ids(conn, user_ids)?
            .into_iter()
            .filter(|r| r.channels.any_enabled())
            .collect();
        if recipients.is_empty() {
            return Ok(DispatchOutcome::Skipped(
                "every recipient disabled all channels".to_string(),
            ));
        }

        self.channel
            .notify(&recipients, kind, &NotificationPayload::from(event))?;

        Ok(DispatchOutcome::Delivered {
            recipients: recipients.into_iter().map(|r| r.user_id).collect(),
        })
    }
}

fn load_event(conn: &Connection, event_id: &str) -> Result<Event, NotifyError> {
    find_event_by_id(conn, event_id)?
        .ok_or_else(|| NotifyError::EventNotFound(event_id.to_string()))
}

fn exclude_owner(mut user_ids: Vec<String>, event: &Event, is_owner_included: bool) -> Vec<String> {
    if !is_owner_included {
        user_ids.retain(|id| *id != event.owner_id);
    }
    user_ids
}

/// Collapses a dispatch result into an outcome, logging failures.
fn settle(
    event_id: &str,
    kind: NotificationType,
    result: Result<DispatchOutcome, NotifyError>,
) -> DispatchOutcome {
    match result {
        Ok(outcome) => {
            if let DispatchOutcome::Skipped(reason) = &outcome {
                tracing::debug!(
                    event_id,
                    notification_type = %kind,
                    reason = %reason,
                    "notification skipped"
                );
            }
            outcome
        }
        Err(e) => {
            tracing::warn!(
                event_id,
                notification_type = %kind,
                error = %e,
                "notification dispatch failed"
            );
            DispatchOutcome::Failed(e)
        }
    }
}
