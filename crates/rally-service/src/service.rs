//! Event mutations and their guards.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rally_directory::{find_missing_user_ids, find_teams_by_ids, find_user_by_id_or_err};
use rally_events::{
    add_guests, create_event, find_guests, remove_guests, set_attendance, update_event,
    update_event_as_admin, EventDraft, EventPatch,
};
use rally_notify::{DispatchOutcome, NotificationDispatcher};
use rally_types::{Attendance, Event, Guest};
use rusqlite::Connection;

use crate::{RequestCache, ServiceError};

/// A mutation result together with the notifications it triggered.
#[derive(Debug)]
pub struct Outcome<T> {
    pub value: T,
    pub notifications: Vec<DispatchOutcome>,
}

impl<T> Outcome<T> {
    fn quiet(value: T) -> Self {
        Self {
            value,
            notifications: Vec::new(),
        }
    }
}

/// Validates and applies event mutations, then fires notifications.
#[derive(Debug, Clone)]
pub struct EventService {
    dispatcher: NotificationDispatcher,
}

impl EventService {
    pub fn new(dispatcher: NotificationDispatcher) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    /// Creates an event and its initial guest list.
    ///
    /// The owner is added as an accepted guest when `is_owner_attending`.
    /// Every other id in `guest_ids` is invited as pending. An unknown team or
    /// guest fails the whole call with `NotFound`. Creating an
    /// all-teams event announces it to every registered user.
    pub fn create(
        &self,
        conn: &Connection,
        cache: &mut RequestCache,
        draft: EventDraft,
        is_owner_attending: bool,
        guest_ids: &[String],
    ) -> Result<Outcome<Event>, ServiceError> {
        let now = Utc::now();
        if draft.starts_at <= now {
            return Err(ServiceError::validation("event must start in the future"));
        }
        check_interval(draft.starts_at, draft.ends_at)?;
        if draft.is_individual && draft.team_id.is_none() {
            return Err(ServiceError::validation(
                "an individual event must belong to a team",
            ));
        }

        let owner = find_user_by_id_or_err(conn, &draft.owner_id)?;
        if !owner.is_enabled {
            return Err(ServiceError::Authorization(format!(
                "user {} is disabled",
                owner.id
            )));
        }

        if let Some(team_id) = &draft.team_id {
            require_team(conn, team_id)?;
        }
        let invited = distinct_without(guest_ids, &owner.id);
        require_users(conn, &invited)?;

        let tx = conn.unchecked_transaction()?;
        let event = create_event(&tx, &draft)?;
        if is_owner_attending {
            add_guests(&tx, &event.id, &[owner.id.clone()], Attendance::Accepted)?;
        }
        add_guests(&tx, &event.id, &invited, Attendance::Pending)?;
        tx.commit()?;

        tracing::info!(
            event_id = %event.id,
            owner_id = %event.owner_id,
            guests = invited.len(),
            "event created"
        );

        let mut notifications = Vec::new();
        if event.is_all_teams() {
            notifications.push(
                self.dispatcher
                    .notify_on_new_all_teams_event(conn, &event.id, false),
            );
        }

        cache.prime(event.clone());
        Ok(Outcome {
            value: event,
            notifications,
        })
    }

    /// Updates an event owned by `owner_id`.
    ///
    /// A changed location notifies guests of the move; a changed start or
    /// end notifies them of the new time.
    pub fn update(
        &self,
        conn: &Connection,
        cache: &mut RequestCache,
        id: &str,
        owner_id: &str,
        patch: EventPatch,
    ) -> Result<Outcome<Event>, ServiceError> {
        if patch.is_cancelled.is_some() {
            return Err(ServiceError::validation(
                "cancellation is changed through cancel and restore",
            ));
        }

        let now = Utc::now();
        let current = cache.require_event(conn, id)?;
        require_owner(&current, owner_id)?;
        require_mutable(&current, now)?;
        check_patch_times(&current, &patch, now)?;

        let updated = update_event(conn, id, owner_id, &patch)?;
        cache.prime(updated.clone());

        let mut notifications = Vec::new();
        if updated.location != current.location {
            notifications.push(
                self.dispatcher
                    .notify_on_event_location_update(conn, id, false),
            );
        }
        if updated.starts_at != current.starts_at || updated.ends_at != current.ends_at {
            notifications.push(
                self.dispatcher
                    .notify_on_event_date_time_update(conn, id, false),
            );
        }

        tracing::info!(event_id = %id, notifications = notifications.len(), "event updated");
        Ok(Outcome {
            value: updated,
            notifications,
        })
    }

    /// Privileged update that skips ownership and lifecycle guards.
    ///
    /// Time ordering is still enforced. No notification is sent.
    pub fn update_as_admin(
        &self,
        conn: &Connection,
        cache: &mut RequestCache,
        id: &str,
        patch: EventPatch,
    ) -> Result<Outcome<Event>, ServiceError> {
        let current = cache.require_event(conn, id)?;
        check_patch_times(&current, &patch, Utc::now())?;

        let updated = update_event_as_admin(conn, id, &patch)?;
        cache.prime(updated.clone());
        tracing::info!(event_id = %id, "event updated by admin");
        Ok(Outcome::quiet(updated))
    }

    /// Cancels an event that has not started yet.
    pub fn cancel_one(
        &self,
        conn: &Connection,
        cache: &mut RequestCache,
        id: &str,
        owner_id: &str,
    ) -> Result<Outcome<Event>, ServiceError> {
        let current = cache.require_event(conn, id)?;
        require_owner(&current, owner_id)?;
        require_not_started(&current, Utc::now())?;
        if current.is_cancelled {
            return Err(ServiceError::validation("event is already cancelled"));
        }

        let cancelled = update_event(conn, id, owner_id, &cancellation(true))?;
        cache.prime(cancelled.clone());
        tracing::info!(event_id = %id, "event cancelled");

        let notification = self.dispatcher.notify_on_event_cancellation(conn, id, false);
        Ok(Outcome {
            value: cancelled,
            notifications: vec![notification],
        })
    }

    /// Reverses a cancellation. Events that have already started stay
    /// cancelled.
    pub fn restore_one(
        &self,
        conn: &Connection,
        cache: &mut RequestCache,
        id: &str,
        owner_id: &str,
    ) -> Result<Outcome<Event>, ServiceError> {
        let current = cache.require_event(conn, id)?;
        require_owner(&current, owner_id)?;
        if !current.is_cancelled {
            return Err(ServiceError::validation("event is not cancelled"));
        }
        require_not_started(&current, Utc::now())?;

        let restored = update_event(conn, id, owner_id, &cancellation(false))?;
        cache.prime(restored.clone());
        tracing::info!(event_id = %id, "event restored");
        Ok(Outcome::quiet(restored))
    }

    /// Invites and uninvites guests. Returns the resulting guest list.
    ///
    /// The owner cannot be removed. Ids already on the list (or not on it,
    /// for removals) are ignored, and only the effective changes are
    /// notified.
    pub fn update_guest_list(
        &self,
        conn: &Connection,
        cache: &mut RequestCache,
        id: &str,
        owner_id: &str,
        add: &[String],
        remove: &[String],
    ) -> Result<Outcome<Vec<Guest>>, ServiceError> {
        let current = cache.require_event(conn, id)?;
        require_owner(&current, owner_id)?;
        require_mutable(&current, Utc::now())?;
        if remove.iter().any(|u| *u == current.owner_id) {
            return Err(ServiceError::validation(
                "the owner cannot be removed from the guest list",
            ));
        }

        let add = distinct_without(add, &current.owner_id);
        let remove = distinct_without(remove, &current.owner_id);
        require_users(conn, &add)?;

        let tx = conn.unchecked_transaction()?;
        let added = add_guests(&tx, id, &add, Attendance::Pending)?;
        let removed = remove_guests(&tx, id, &remove)?;
        tx.commit()?;

        tracing::info!(
            event_id = %id,
            added = added.len(),
            removed = removed.len(),
            "guest list updated"
        );

        let outcome = self
            .dispatcher
            .notify_on_event_guest_list_update(conn, id, &added, &removed, true);
        Ok(Outcome {
            value: find_guests(conn, id)?,
            notifications: vec![outcome.invited, outcome.removed],
        })
    }

    /// Records an invited guest's answer.
    pub fn respond(
        &self,
        conn: &Connection,
        cache: &mut RequestCache,
        id: &str,
        user_id: &str,
        attending: bool,
    ) -> Result<Outcome<Guest>, ServiceError> {
        let current = cache.require_event(conn, id)?;
        require_mutable(&current, Utc::now())?;

        let attendance = if attending {
            Attendance::Accepted
        } else {
            Attendance::Declined
        };
        let guest = set_attendance(conn, id, user_id, attendance).map_err(|e| match e {
            rally_events::StoreError::NotFound(_) => {
                ServiceError::Authorization(format!("user {user_id} is not invited to event {id}"))
            }
            other => other.into(),
        })?;
        tracing::debug!(event_id = %id, user_id, attendance = attendance.label(), "guest responded");
        Ok(Outcome::quiet(guest))
    }
}

fn cancellation(is_cancelled: bool) -> EventPatch {
    EventPatch {
        is_cancelled: Some(is_cancelled),
        ..EventPatch::default()
    }
}

fn require_owner(event: &Event, user_id: &str) -> Result<(), ServiceError> {
    if event.owner_id == user_id {
        Ok(())
    } else {
        Err(ServiceError::Authorization(format!(
            "only the owner may modify event {}",
            event.id
        )))
    }
}

fn require_team(conn: &Connection, team_id: &str) -> Result<(), ServiceError> {
    if find_teams_by_ids(conn, &[team_id.to_string()])?.is_empty() {
        return Err(ServiceError::NotFound(format!("team {team_id}")));
    }
    Ok(())
}

/// Fails with `NotFound` naming the first id that matches no user.
fn require_users(conn: &Connection, user_ids: &[String]) -> Result<(), ServiceError> {
    match find_missing_user_ids(conn, user_ids)?.into_iter().next() {
        Some(missing) => Err(ServiceError::NotFound(format!("user {missing}"))),
        None => Ok(()),
    }
}

fn require_not_started(event: &Event, now: DateTime<Utc>) -> Result<(), ServiceError> {
    if event.has_started(now) {
        Err(ServiceError::validation("event has already started"))
    } else {
        Ok(())
    }
}

/// Not started and not cancelled.
fn require_mutable(event: &Event, now: DateTime<Utc>) -> Result<(), ServiceError> {
    require_not_started(event, now)?;
    if event.is_cancelled {
        return Err(ServiceError::validation("event is cancelled"));
    }
    Ok(())
}

fn check_interval(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Result<(), ServiceError> {
    if starts_at > ends_at {
        return Err(ServiceError::validation("event cannot end before it starts"));
    }
    Ok(())
}

/// Checks the patched interval against the unchanged bound when only one
/// side is supplied.
fn check_patch_times(
    current: &Event,
    patch: &EventPatch,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    if let Some(starts_at) = patch.starts_at {
        if starts_at < now {
            return Err(ServiceError::validation("event must start in the future"));
        }
    }
    check_interval(
        patch.starts_at.unwrap_or(current.starts_at),
        patch.ends_at.unwrap_or(current.ends_at),
    )
}

/// Deduplicates `ids` in order and drops `excluded`.
fn distinct_without(ids: &[String], excluded: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| id.as_str() != excluded && seen.insert(id.as_str()))
        .cloned()
        .collect()
}
