//! Team directory and membership lookups.

use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::DirectoryError;

/// A team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
}

/// Membership of a user in a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMembership {
    pub team_id: String,
    pub user_id: String,
    /// Join timestamp (ISO 8601).
    pub joined_at: String,
}

/// Creates a new team.
pub fn create_team(conn: &Connection, id: &str, name: &str) -> Result<(), DirectoryError> {
    conn.execute(
        "INSERT INTO teams (id, name) VALUES (?1, ?2)",
        params![id, name],
    )?;
    Ok(())
}

/// Adds a user to a team. Adding an existing member is a no-op.
pub fn add_team_member(
    conn: &Connection,
    team_id: &str,
    user_id: &str,
) -> Result<(), DirectoryError> {
    conn.execute(
        "INSERT OR IGNORE INTO team_members (team_id, user_id) VALUES (?1, ?2)",
        params![team_id, user_id],
    )?;
    Ok(())
}

/// Removes a user from a team. Leaving is idempotent.
pub fn remove_team_member(
    conn: &Connection,
    team_id: &str,
    user_id: &str,
) -> Result<(), DirectoryError> {
    conn.execute(
        "DELETE FROM team_members WHERE team_id = ?1 AND user_id = ?2",
        params![team_id, user_id],
    )?;
    Ok(())
}

/// Returns the ids of every team the user belongs to, ordered by id.
pub fn find_team_ids_by_user_id(
    conn: &Connection,
    user_id: &str,
) -> Result<Vec<String>, DirectoryError> {
    let mut stmt =
        conn.prepare("SELECT team_id FROM team_members WHERE user_id = ?1 ORDER BY team_id ASC")?;
    let rows = stmt.query_map([user_id], |row| row.get(0))?;
    let mut ids = Vec::new();
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

/// Returns the membership of `user_id` in `team_id`, if any.
pub fn find_membership(
    conn: &Connection,
    team_id: &str,
    user_id: &str,
) -> Result<Option<TeamMembership>, DirectoryError> {
    let membership = conn
        .query_row(
            "SELECT team_id, user_id, joined_at FROM team_members
             WHERE team_id = ?1 AND user_id = ?2",
            params![team_id, user_id],
            |row| {
                Ok(TeamMembership {
                    team_id: row.get(0)?,
                    user_id: row.get(1)?,
                    joined_at: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(membership)
}

/// Returns the teams with the given ids, ordered by name. Unknown ids are
/// skipped.
pub fn find_teams_by_ids(conn: &Connection, ids: &[String]) -> Result<Vec<Team>, DirectoryError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!(
        "SELECT id, name, created_at FROM teams WHERE id IN ({}) ORDER BY name ASC",
        rally_db::placeholders(1, ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(ids.iter()), |row| {
        Ok(Team {
            id: row.get(0)?,
            name: row.get(1)?,
            created_at: row.get(2)?,
        })
    })?;

    let mut teams = Vec::new();
    for row in rows {
        teams.push(row?);
    }
    Ok(teams)
}
