//! Reminder batch for guests who have not answered an invitation.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rally_db::DbPool;
use rally_events::{find_all_by_starts_at, find_pending_guests_by_event_ids};
use rally_types::{Event, NotificationType};
use serde::Serialize;
use tokio::task::JoinSet;

use crate::{DispatchOutcome, NotificationDispatcher, NotifyError};

/// One reminder job that did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub event_id: String,
    pub error: String,
}

/// Aggregated result of a reminder batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Event ids whose job finished without error, including jobs that had
    /// no reachable recipient.
    pub succeeded: Vec<String>,
    pub failed: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn jobs(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

impl NotificationDispatcher {
    /// Reminds pending guests of every non-cancelled event starting within
    /// `[from, to]`.
    ///
    /// One job runs per event and every job runs to completion; a failing
    /// job is logged with its event id and recorded in the report. This
    /// method never returns an error.
    pub async fn send_notifications_on_awaiting_invitations(
        &self,
        pool: &DbPool,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> BatchReport {
        let lookup_pool = pool.clone();
        let lookup =
            tokio::task::spawn_blocking(move || pending_by_event(&lookup_pool, from, to)).await;

        let jobs = match lookup {
            Ok(Ok(jobs)) => jobs,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "failed to load events awaiting answers");
                return BatchReport::default();
            }
            Err(e) => {
                tracing::error!(error = %e, "awaiting invitation lookup panicked");
                return BatchReport::default();
            }
        };

        let mut set = JoinSet::new();
        let mut task_events: HashMap<tokio::task::Id, String> = HashMap::new();
        for (event, user_ids) in jobs {
            let dispatcher = self.clone();
            let pool = pool.clone();
            let event_id = event.id.clone();
            let handle = set.spawn_blocking(move || {
                let result = pool
                    .get()
                    .map_err(|e| NotifyError::Pool(e.to_string()))
                    .and_then(|conn| {
                        dispatcher.deliver(
                            &conn,
                            &event,
                            NotificationType::AwaitingInvitation,
                            &user_ids,
                        )
                    });
                (event.id, result)
            });
            task_events.insert(handle.id(), event_id);
        }

        let mut report = BatchReport::default();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((event_id, Ok(outcome))) => {
                    if let DispatchOutcome::Delivered { recipients } = &outcome {
                        tracing::debug!(
                            event_id = %event_id,
                            recipients = recipients.len(),
                            "reminder sent"
                        );
                    }
                    report.succeeded.push(event_id);
                }
                Ok((event_id, Err(e))) => {
                    tracing::warn!(event_id = %event_id, error = %e, "reminder job failed");
                    report.failed.push(BatchFailure {
                        event_id,
                        error: e.to_string(),
                    });
                }
                Err(e) => {
                    let event_id = task_events.remove(&e.id()).unwrap_or_default();
                    tracing::error!(event_id = %event_id, error = %e, "reminder job panicked");
                    report.failed.push(BatchFailure {
                        event_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        report.succeeded.sort();
        report.failed.sort_by(|a, b| a.event_id.cmp(&b.event_id));
        tracing::info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "awaiting invitation batch finished"
        );
        report
    }
}

/// Loads the events in range with at least one pending guest, paired with
/// those guests' ids.
fn pending_by_event(
    pool: &DbPool,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<(Event, Vec<String>)>, NotifyError> {
    let conn = pool.get().map_err(|e| NotifyError::Pool(e.to_string()))?;
    let events = find_all_by_starts_at(&conn, from, to, true)?;
    let event_ids: Vec<String> = events.iter().map(|e| e.id.clone()).collect();

    let mut pending: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for guest in find_pending_guests_by_event_ids(&conn, &event_ids)? {
        pending.entry(guest.event_id).or_default().push(guest.user_id);
    }

    Ok(events
        .into_iter()
        .filter_map(|event| pending.remove(&event.id).map(|ids| (event, ids)))
        .collect())
}
