//! Event rows: creation, owner-scoped and privileged updates, and the feed
//! entry points built on [`EventQuery`].

use chrono::{DateTime, Utc};
use rally_types::{Attendance, Event, Location, SortOrder};
use rusqlite::types::{ToSql, Type};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::error::storage;
use crate::query::EventQuery;
use crate::range::{EventFilter, EventRange, Page, TeamScope};
use crate::StoreError;

pub(crate) const EVENT_COLUMNS: &str = "id, owner_id, team_id, title, description, starts_at, \
     ends_at, is_individual, is_cancelled, address, image_url, location_json, created_at, updated_at";

pub(crate) const EVENT_COLUMNS_E: &str = "e.id, e.owner_id, e.team_id, e.title, e.description, \
     e.starts_at, e.ends_at, e.is_individual, e.is_cancelled, e.address, e.image_url, \
     e.location_json, e.created_at, e.updated_at";

/// Parameters for creating a new event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDraft {
    pub owner_id: String,
    pub team_id: Option<String>,
    pub title: String,
    pub description: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_individual: bool,
    pub address: Option<String>,
    pub image_url: Option<String>,
    pub location: Option<Location>,
}

/// Fields to change on an existing event.
///
/// `None` leaves a field untouched. For nullable columns, `Some(None)`
/// clears the value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub address: Option<Option<String>>,
    pub image_url: Option<Option<String>>,
    pub location: Option<Option<Location>>,
    pub is_cancelled: Option<bool>,
}

/// Inserts a new event and returns the stored row.
///
/// The id is a UUID v7, so ids sort by creation time.
pub fn create_event(conn: &Connection, draft: &EventDraft) -> Result<Event, StoreError> {
    let id = uuid::Uuid::now_v7().to_string();
    let location_json = draft
        .location
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    let sql = format!(
        "INSERT INTO events (
            id, owner_id, team_id, title, description, starts_at, ends_at,
            is_individual, address, image_url, location_json
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        RETURNING {EVENT_COLUMNS}"
    );

    let event = conn
        .query_row(
            &sql,
            params![
                id,
                draft.owner_id,
                draft.team_id,
                draft.title,
                draft.description,
                draft.starts_at.timestamp_millis(),
                draft.ends_at.timestamp_millis(),
                draft.is_individual,
                draft.address,
                draft.image_url,
                location_json,
            ],
            map_row_to_event,
        )
        .map_err(storage("create_event"))?;

    tracing::debug!(event_id = %event.id, owner_id = %event.owner_id, "event created");
    Ok(event)
}

/// Retrieves an event by id.
pub fn find_event_by_id(conn: &Connection, id: &str) -> Result<Option<Event>, StoreError> {
    let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1");
    conn.query_row(&sql, [id], map_row_to_event)
        .optional()
        .map_err(storage("find_event_by_id"))
}

/// Applies `patch` to the event `id` owned by `owner_id` in one statement.
///
/// The ownership check is part of the `UPDATE` predicate. When no row
/// matches (unknown id or another owner) the result is
/// [`StoreError::NotFound`].
pub fn update_event(
    conn: &Connection,
    id: &str,
    owner_id: &str,
    patch: &EventPatch,
) -> Result<Event, StoreError> {
    apply_patch(conn, "update_event", id, Some(owner_id), patch)
}

/// Applies `patch` to the event `id` regardless of its owner.
///
/// Privileged path for administrative tooling.
pub fn update_event_as_admin(
    conn: &Connection,
    id: &str,
    patch: &EventPatch,
) -> Result<Event, StoreError> {
    apply_patch(conn, "update_event_as_admin", id, None, patch)
}

fn apply_patch(
    conn: &Connection,
    op: &'static str,
    id: &str,
    owner_id: Option<&str>,
    patch: &EventPatch,
) -> Result<Event, StoreError> {
    let mut set_parts: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    let mut set = |column: &str, value: Box<dyn ToSql>| {
        values.push(value);
        set_parts.push(format!("{column} = ?{}", values.len()));
    };

    if let Some(title) = &patch.title {
        set("title", Box::new(title.clone()));
    }
    if let Some(description) = &patch.description {
        set("description", Box::new(description.clone()));
    }
    if let Some(starts_at) = patch.starts_at {
        set("starts_at", Box::new(starts_at.timestamp_millis()));
    }
    if let Some(ends_at) = patch.ends_at {
        set("ends_at", Box::new(ends_at.timestamp_millis()));
    }
    if let Some(address) = &patch.address {
        set("address", Box::new(address.clone()));
    }
    if let Some(image_url) = &patch.image_url {
        set("image_url", Box::new(image_url.clone()));
    }
    if let Some(location) = &patch.location {
        let json = location.as_ref().map(serde_json::to_string).transpose()?;
        set("location_json", Box::new(json));
    }
    if let Some(cancelled) = patch.is_cancelled {
        set("is_cancelled", Box::new(cancelled));
    }

    set_parts.push("updated_at = datetime('now')".to_string());

    values.push(Box::new(id.to_string()));
    let mut predicate = format!("id = ?{}", values.len());
    if let Some(owner_id) = owner_id {
        values.push(Box::new(owner_id.to_string()));
        predicate.push_str(&format!(" AND owner_id = ?{}", values.len()));
    }

    let sql = format!(
        "UPDATE events SET {} WHERE {predicate} RETURNING {EVENT_COLUMNS}",
        set_parts.join(", ")
    );
    let params: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();

    conn.query_row(&sql, params.as_slice(), map_row_to_event)
        .optional()
        .map_err(storage(op))?
        .ok_or_else(|| match owner_id {
            Some(owner_id) => StoreError::NotFound(format!("event {id} owned by {owner_id}")),
            None => StoreError::NotFound(format!("event {id}")),
        })
}

/// Lists events matching `filter` within `range`.
pub fn find_all(
    conn: &Connection,
    filter: &EventFilter,
    range: &EventRange,
) -> Result<Page<Event>, StoreError> {
    EventQuery::new()
        .filter(filter)
        .range(range)
        .fetch_page(conn, "find_all", range)
}

/// Lists events of the given teams. Other team constraints in `filter` are
/// replaced.
pub fn find_all_by_team_ids(
    conn: &Connection,
    team_ids: &[String],
    filter: &EventFilter,
    range: &EventRange,
) -> Result<Page<Event>, StoreError> {
    let filter = EventFilter {
        team_scope: Some(TeamScope::Teams(team_ids.to_vec())),
        ..filter.clone()
    };
    EventQuery::new()
        .filter(&filter)
        .range(range)
        .fetch_page(conn, "find_all_by_team_ids", range)
}

/// Lists every event within `range`.
pub fn get_all(conn: &Connection, range: &EventRange) -> Result<Page<Event>, StoreError> {
    EventQuery::new()
        .range(range)
        .fetch_page(conn, "get_all", range)
}

/// Lists events `user_id` is invited to, optionally restricted to one
/// attendance state.
pub fn find_by_invited_user(
    conn: &Connection,
    user_id: &str,
    attendance: Option<Attendance>,
    filter: &EventFilter,
    range: &EventRange,
) -> Result<Page<Event>, StoreError> {
    EventQuery::new()
        .invited(user_id, attendance)
        .filter(filter)
        .range(range)
        .fetch_page(conn, "find_by_invited_user", range)
}

/// Title search scoped to the given teams plus all-teams events.
pub fn search_by_title(
    conn: &Connection,
    team_ids: &[String],
    text: &str,
    range: &EventRange,
) -> Result<Page<Event>, StoreError> {
    let filter = EventFilter {
        team_scope: Some(TeamScope::TeamsOrAllTeams(team_ids.to_vec())),
        ..EventFilter::default()
    };
    EventQuery::new()
        .filter(&filter)
        .title_contains(text)
        .range(range)
        .fetch_page(conn, "search_by_title", range)
}

/// Lists every event starting within `[from, to]`, oldest first.
pub fn find_all_by_starts_at(
    conn: &Connection,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    exclude_cancelled: bool,
) -> Result<Vec<Event>, StoreError> {
    let filter = EventFilter {
        is_cancelled: exclude_cancelled.then_some(false),
        ..EventFilter::default()
    };
    EventQuery::new()
        .filter(&filter)
        .starts_within(from, to)
        .fetch_all(conn, "find_all_by_starts_at", SortOrder::Asc)
}

pub(crate) fn map_row_to_event(row: &Row) -> rusqlite::Result<Event> {
    let location_json: Option<String> = row.get(11)?;
    let location = match location_json {
        Some(s) => Some(serde_json::from_str(&s).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(11, Type::Text, Box::new(e))
        })?),
        None => None,
    };

    Ok(Event {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        team_id: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        starts_at: millis_to_datetime(row, 5)?,
        ends_at: millis_to_datetime(row, 6)?,
        is_individual: row.get(7)?,
        is_cancelled: row.get(8)?,
        address: row.get(9)?,
        image_url: row.get(10)?,
        location,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn millis_to_datetime(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let millis: i64 = row.get(idx)?;
    DateTime::<Utc>::from_timestamp_millis(millis).ok_or(rusqlite::Error::IntegralValueOutOfRange(
        idx, millis,
    ))
}
