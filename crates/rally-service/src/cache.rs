//! Per-request load-and-memoize cache.

use std::collections::HashMap;

use rally_events::find_event_by_id;
use rally_types::Event;
use rusqlite::Connection;

use crate::ServiceError;

/// Rows loaded while serving one request.
///
/// Build one per inbound request and drop it when the response is sent.
/// Misses are cached too, so a missing event is looked up once.
#[derive(Debug, Default)]
pub struct RequestCache {
    events: HashMap<String, Option<Event>>,
    team_ids: HashMap<String, Vec<String>>,
}

impl RequestCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the event `id`, loading it on first use.
    pub fn event(&mut self, conn: &Connection, id: &str) -> Result<Option<Event>, ServiceError> {
        if let Some(cached) = self.events.get(id) {
            return Ok(cached.clone());
        }
        let loaded = find_event_by_id(conn, id)?;
        self.events.insert(id.to_string(), loaded.clone());
        Ok(loaded)
    }

    /// Like [`Self::event`] but fails with `NotFound` on a miss.
    pub fn require_event(&mut self, conn: &Connection, id: &str) -> Result<Event, ServiceError> {
        self.event(conn, id)?.ok_or_else(|| ServiceError::event_not_found(id))
    }

    /// Replaces the cached entry with a freshly persisted row.
    pub fn prime(&mut self, event: Event) {
        self.events.insert(event.id.clone(), Some(event));
    }

    /// Returns the ids of the teams `user_id` belongs to, loading them on
    /// first use.
    pub fn team_ids(
        &mut self,
        conn: &Connection,
        user_id: &str,
    ) -> Result<Vec<String>, ServiceError> {
        if let Some(ids) = self.team_ids.get(user_id) {
            return Ok(ids.clone());
        }
        let ids = rally_directory::find_team_ids_by_user_id(conn, user_id)?;
        self.team_ids.insert(user_id.to_string(), ids.clone());
        Ok(ids)
    }

    /// Number of cached event entries, hits and misses alike.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
