//! Visibility checks and viewer-specific feeds.

use chrono::Utc;
use rally_directory::{find_membership, find_user_by_id};
use rally_events::{
    find_all, find_all_by_team_ids, find_by_invited_user, find_guest, search_by_title,
    EventFilter, EventRange, Page, TeamScope,
};
use rally_types::{Attendance, Event};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{EventService, RequestCache, ServiceError};

/// Keyset position requested by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

impl PageRequest {
    fn apply(&self, range: EventRange) -> EventRange {
        range
            .with_cursor(self.cursor.clone())
            .with_limit(self.limit)
    }
}

impl EventService {
    /// Returns the event if `user_id` may see it.
    ///
    /// Checked in order: all-teams events are visible to any enabled user,
    /// then the owner, then members of the event's team, then invited
    /// guests.
    pub fn find_one(
        &self,
        conn: &Connection,
        cache: &mut RequestCache,
        id: &str,
        user_id: &str,
    ) -> Result<Event, ServiceError> {
        let user = find_user_by_id(conn, user_id)?
            .ok_or_else(|| ServiceError::NotFound(format!("user {user_id}")))?;
        if !user.is_enabled {
            return Err(ServiceError::Authorization(format!(
                "user {user_id} is disabled"
            )));
        }

        let event = cache.require_event(conn, id)?;
        if event.is_all_teams() || event.owner_id == user_id {
            return Ok(event);
        }
        if let Some(team_id) = &event.team_id {
            if find_membership(conn, team_id, user_id)?.is_some() {
                return Ok(event);
            }
        }
        if find_guest(conn, id, user_id)?.is_some() {
            return Ok(event);
        }

        tracing::debug!(event_id = %id, user_id, "event hidden from user");
        Err(ServiceError::Authorization(format!(
            "user {user_id} cannot view event {id}"
        )))
    }

    /// Upcoming invitations the user has not answered. Cancelled events are
    /// left out since there is nothing left to answer.
    pub fn find_pending(
        &self,
        conn: &Connection,
        user_id: &str,
        page: &PageRequest,
    ) -> Result<Page<Event>, ServiceError> {
        let filter = EventFilter {
            is_cancelled: Some(false),
            ..EventFilter::default()
        };
        let range = page.apply(EventRange::upcoming(Utc::now(), false));
        Ok(find_by_invited_user(
            conn,
            user_id,
            Some(Attendance::Pending),
            &filter,
            &range,
        )?)
    }

    /// Upcoming invitations the user declined.
    pub fn find_declined(
        &self,
        conn: &Connection,
        user_id: &str,
        page: &PageRequest,
    ) -> Result<Page<Event>, ServiceError> {
        let range = page.apply(EventRange::upcoming(Utc::now(), false));
        Ok(find_by_invited_user(
            conn,
            user_id,
            Some(Attendance::Declined),
            &EventFilter::default(),
            &range,
        )?)
    }

    /// Accepted events that have not ended yet, including ongoing ones.
    pub fn find_yours(
        &self,
        conn: &Connection,
        user_id: &str,
        page: &PageRequest,
    ) -> Result<Page<Event>, ServiceError> {
        let range = page.apply(EventRange::upcoming(Utc::now(), true));
        Ok(find_by_invited_user(
            conn,
            user_id,
            Some(Attendance::Accepted),
            &EventFilter::default(),
            &range,
        )?)
    }

    /// Accepted events that have ended, most recent first.
    pub fn find_past(
        &self,
        conn: &Connection,
        user_id: &str,
        page: &PageRequest,
    ) -> Result<Page<Event>, ServiceError> {
        let range = page.apply(EventRange::past(Utc::now()));
        Ok(find_by_invited_user(
            conn,
            user_id,
            Some(Attendance::Accepted),
            &EventFilter::default(),
            &range,
        )?)
    }

    /// Events of the teams the user belongs to.
    pub fn find_team_events(
        &self,
        conn: &Connection,
        cache: &mut RequestCache,
        user_id: &str,
        page: &PageRequest,
    ) -> Result<Page<Event>, ServiceError> {
        let team_ids = cache.team_ids(conn, user_id)?;
        if team_ids.is_empty() {
            return Ok(Page::empty());
        }
        let range = page.apply(EventRange::upcoming(Utc::now(), true));
        Ok(find_all_by_team_ids(
            conn,
            &team_ids,
            &EventFilter::default(),
            &range,
        )?)
    }

    /// Organization-wide events.
    pub fn find_all_teams(
        &self,
        conn: &Connection,
        page: &PageRequest,
    ) -> Result<Page<Event>, ServiceError> {
        let filter = EventFilter {
            team_scope: Some(TeamScope::AllTeams),
            ..EventFilter::default()
        };
        let range = page.apply(EventRange::upcoming(Utc::now(), true));
        Ok(find_all(conn, &filter, &range)?)
    }

    /// Title search over the user's teams and all-teams events.
    pub fn search(
        &self,
        conn: &Connection,
        cache: &mut RequestCache,
        user_id: &str,
        text: &str,
        page: &PageRequest,
    ) -> Result<Page<Event>, ServiceError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ServiceError::validation("search text must not be empty"));
        }
        let team_ids = cache.team_ids(conn, user_id)?;
        let range = page.apply(EventRange::default());
        Ok(search_by_title(conn, &team_ids, text, &range)?)
    }
}
