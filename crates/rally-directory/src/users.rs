//! User directory.

use std::collections::HashSet;

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::DirectoryError;

/// A platform user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub display_name: String,
    /// Disabled users cannot own events or authenticate.
    pub is_enabled: bool,
    /// Opted in to organization-wide announcements.
    pub is_registered: bool,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
}

/// Parameters for creating a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserParams {
    pub id: String,
    pub display_name: String,
    pub is_registered: bool,
}

/// Creates a new enabled user.
pub fn create_user(conn: &Connection, params: &CreateUserParams) -> Result<(), DirectoryError> {
    conn.execute(
        "INSERT INTO users (id, display_name, is_registered) VALUES (?1, ?2, ?3)",
        params![params.id, params.display_name, params.is_registered],
    )?;
    Ok(())
}

/// Enables or disables a user.
pub fn set_user_enabled(conn: &Connection, id: &str, enabled: bool) -> Result<(), DirectoryError> {
    let count = conn.execute(
        "UPDATE users SET is_enabled = ?1 WHERE id = ?2",
        params![enabled, id],
    )?;
    if count == 0 {
        return Err(DirectoryError::NotFound {
            entity: "user",
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Looks up a user by id.
pub fn find_user_by_id(conn: &Connection, id: &str) -> Result<Option<User>, DirectoryError> {
    let user = conn
        .query_row(
            "SELECT id, display_name, is_enabled, is_registered, created_at
             FROM users WHERE id = ?1",
            [id],
            map_row_to_user,
        )
        .optional()?;
    Ok(user)
}

/// Looks up a user by id, failing with `NotFound` if absent.
pub fn find_user_by_id_or_err(conn: &Connection, id: &str) -> Result<User, DirectoryError> {
    find_user_by_id(conn, id)?.ok_or_else(|| DirectoryError::NotFound {
        entity: "user",
        id: id.to_string(),
    })
}

/// Returns the ids of every enabled user opted in to organization-wide
/// announcements, ordered by id.
pub fn get_all_registered_user_ids(conn: &Connection) -> Result<Vec<String>, DirectoryError> {
    let mut stmt = conn.prepare(
        "SELECT id FROM users WHERE is_registered = 1 AND is_enabled = 1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    let mut ids = Vec::new();
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

/// Returns the ids in `ids` that match no user, in input order without
/// duplicates.
pub fn find_missing_user_ids(
    conn: &Connection,
    ids: &[String],
) -> Result<Vec<String>, DirectoryError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!(
        "SELECT id FROM users WHERE id IN ({})",
        rally_db::placeholders(1, ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(ids.iter()), |row| row.get::<_, String>(0))?;
    let mut known = HashSet::new();
    for row in rows {
        known.insert(row?);
    }

    let mut seen = HashSet::new();
    Ok(ids
        .iter()
        .filter(|id| !known.contains(id.as_str()) && seen.insert(id.as_str()))
        .cloned()
        .collect())
}

fn map_row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        display_name: row.get(1)?,
        is_enabled: row.get(2)?,
        is_registered: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::setup_db;

    fn seed(conn: &Connection, id: &str, registered: bool) {
        create_user(
            conn,
            &CreateUserParams {
                id: id.to_string(),
                display_name: format!("User {id}"),
                is_registered: registered,
            },
        )
        .expect("create user failed");
    }

    #[test]
    fn create_and_find_user() {
        let conn = setup_db();
        seed(&conn, "u1", true);

        let user = find_user_by_id(&conn, "u1")
            .expect("lookup failed")
            .expect("user should exist");
        assert_eq!(user.display_name, "User u1");
        assert!(user.is_enabled);
        assert!(user.is_registered);

        assert!(find_user_by_id(&conn, "ghost").unwrap().is_none());
        match find_user_by_id_or_err(&conn, "ghost").unwrap_err() {
            DirectoryError::NotFound { entity, id } => {
                assert_eq!(entity, "user");
                assert_eq!(id, "ghost");
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn registered_ids_skip_opted_out_and_disabled_users() {
        let conn = setup_db();
        seed(&conn, "u3", true);
        seed(&conn, "u1", true);
        seed(&conn, "u2", false);
        seed(&conn, "u4", true);
        set_user_enabled(&conn, "u4", false).expect("disable failed");

        let ids = get_all_registered_user_ids(&conn).expect("query failed");
        assert_eq!(ids, vec!["u1".to_string(), "u3".to_string()]);
    }

    #[test]
    fn disabling_unknown_user_is_not_found() {
        let conn = setup_db();
        let err = set_user_enabled(&conn, "ghost", false).unwrap_err();
        assert!(matches!(err, DirectoryError::NotFound { .. }));
    }

    #[test]
    fn missing_ids_keep_input_order() {
        let conn = setup_db();
        seed(&conn, "u1", true);
        seed(&conn, "u2", false);

        let ids: Vec<String> = ["ghost", "u1", "zed", "ghost", "u2"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let missing = find_missing_user_ids(&conn, &ids).expect("query failed");
        assert_eq!(missing, vec!["ghost".to_string(), "zed".to_string()]);
        assert!(find_missing_user_ids(&conn, &[]).unwrap().is_empty());
    }
}
