//! Guest (invitation) rows keyed by `(event_id, user_id)`.

use rally_types::{Attendance, Guest};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::error::storage;
use crate::StoreError;

const GUEST_COLUMNS: &str = "event_id, user_id, is_attending, created_at, updated_at";

/// Invites `user_ids` to an event with the given attendance.
///
/// Users already on the guest list keep their current row. Returns the ids
/// that were newly added, in input order.
pub fn add_guests(
    conn: &Connection,
    event_id: &str,
    user_ids: &[String],
    attendance: Attendance,
) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn
        .prepare(
            "INSERT OR IGNORE INTO event_users (event_id, user_id, is_attending) VALUES (?1, ?2, ?3)",
        )
        .map_err(storage("add_guests"))?;

    let mut added = Vec::new();
    for user_id in user_ids {
        let count = stmt
            .execute(params![event_id, user_id, attendance.as_flag()])
            .map_err(storage("add_guests"))?;
        if count > 0 {
            added.push(user_id.clone());
        }
    }
    Ok(added)
}

/// Removes `user_ids` from the guest list. Returns the ids that were
/// actually removed.
pub fn remove_guests(
    conn: &Connection,
    event_id: &str,
    user_ids: &[String],
) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn
        .prepare("DELETE FROM event_users WHERE event_id = ?1 AND user_id = ?2")
        .map_err(storage("remove_guests"))?;

    let mut removed = Vec::new();
    for user_id in user_ids {
        let count = stmt
            .execute(params![event_id, user_id])
            .map_err(storage("remove_guests"))?;
        if count > 0 {
            removed.push(user_id.clone());
        }
    }
    Ok(removed)
}

/// Records a guest's answer. Fails with `NotFound` if the user is not
/// invited.
pub fn set_attendance(
    conn: &Connection,
    event_id: &str,
    user_id: &str,
    attendance: Attendance,
) -> Result<Guest, StoreError> {
    let sql = format!(
        "UPDATE event_users SET is_attending = ?1, updated_at = datetime('now')
         WHERE event_id = ?2 AND user_id = ?3
         RETURNING {GUEST_COLUMNS}"
    );
    conn.query_row(
        &sql,
        params![attendance.as_flag(), event_id, user_id],
        map_row_to_guest,
    )
    .optional()
    .map_err(storage("set_attendance"))?
    .ok_or_else(|| StoreError::NotFound(format!("guest {user_id} of event {event_id}")))
}

/// Retrieves one guest row.
pub fn find_guest(
    conn: &Connection,
    event_id: &str,
    user_id: &str,
) -> Result<Option<Guest>, StoreError> {
    let sql =
        format!("SELECT {GUEST_COLUMNS} FROM event_users WHERE event_id = ?1 AND user_id = ?2");
    conn.query_row(&sql, params![event_id, user_id], map_row_to_guest)
        .optional()
        .map_err(storage("find_guest"))
}

/// Lists the guests of an event, oldest invitation first.
pub fn find_guests(conn: &Connection, event_id: &str) -> Result<Vec<Guest>, StoreError> {
    let sql = format!(
        "SELECT {GUEST_COLUMNS} FROM event_users WHERE event_id = ?1 ORDER BY created_at ASC, user_id ASC"
    );
    let mut stmt = conn.prepare(&sql).map_err(storage("find_guests"))?;
    let rows = stmt
        .query_map([event_id], map_row_to_guest)
        .map_err(storage("find_guests"))?;

    let mut guests = Vec::new();
    for row in rows {
        guests.push(row.map_err(storage("find_guests"))?);
    }
    Ok(guests)
}

/// Lists the user ids on an event's guest list, ordered by id.
pub fn find_guest_user_ids(conn: &Connection, event_id: &str) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn
        .prepare("SELECT user_id FROM event_users WHERE event_id = ?1 ORDER BY user_id ASC")
        .map_err(storage("find_guest_user_ids"))?;
    let rows = stmt
        .query_map([event_id], |row| row.get(0))
        .map_err(storage("find_guest_user_ids"))?;

    let mut ids = Vec::new();
    for row in rows {
        ids.push(row.map_err(storage("find_guest_user_ids"))?);
    }
    Ok(ids)
}

/// Lists guests who have not answered, across the given events.
pub fn find_pending_guests_by_event_ids(
    conn: &Connection,
    event_ids: &[String],
) -> Result<Vec<Guest>, StoreError> {
    if event_ids.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!(
        "SELECT {GUEST_COLUMNS} FROM event_users
         WHERE is_attending IS NULL AND event_id IN ({})
         ORDER BY event_id ASC, user_id ASC",
        rally_db::placeholders(1, event_ids.len())
    );
    let op = "find_pending_guests_by_event_ids";
    let mut stmt = conn.prepare(&sql).map_err(storage(op))?;
    let rows = stmt
        .query_map(params_from_iter(event_ids.iter()), map_row_to_guest)
        .map_err(storage(op))?;

    let mut guests = Vec::new();
    for row in rows {
        guests.push(row.map_err(storage(op))?);
    }
    Ok(guests)
}

fn map_row_to_guest(row: &Row) -> rusqlite::Result<Guest> {
    Ok(Guest {
        event_id: row.get(0)?,
        user_id: row.get(1)?,
        attendance: Attendance::from_flag(row.get(2)?),
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}
