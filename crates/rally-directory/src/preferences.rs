//! Notification channel preferences.

use std::collections::HashMap;

use rally_types::ChannelFlags;
use rusqlite::{params, params_from_iter, Connection};
use serde::{Deserialize, Serialize};

use crate::DirectoryError;

/// A notification recipient with its resolved channel preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub user_id: String,
    pub channels: ChannelFlags,
}

/// Stores the channel preferences of a user, replacing any previous value.
pub fn set_preferences(
    conn: &Connection,
    user_id: &str,
    flags: ChannelFlags,
) -> Result<(), DirectoryError> {
    conn.execute(
        "INSERT INTO notification_preferences (user_id, push, email, sms)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(user_id) DO UPDATE SET
            push = excluded.push,
            email = excluded.email,
            sms = excluded.sms,
            updated_at = datetime('now')",
        params![user_id, flags.push, flags.email, flags.sms],
    )?;
    Ok(())
}

/// Resolves channel preferences for each user id.
///
/// The result follows the order of `user_ids` with duplicates removed. Users
/// without a stored preference get [`ChannelFlags::default`].
pub fn find_recipients_by_user_ids(
    conn: &Connection,
    user_ids: &[String],
) -> Result<Vec<Recipient>, DirectoryError> {
    if user_ids.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!(
        "SELECT user_id, push, email, sms FROM notification_preferences WHERE user_id IN ({})",
        rally_db::placeholders(1, user_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(user_ids.iter()), |row| {
        Ok((
            row.get::<_, String>(0)?,
            ChannelFlags {
                push: row.get(1)?,
                email: row.get(2)?,
                sms: row.get(3)?,
            },
        ))
    })?;

    let mut stored = HashMap::new();
    for row in rows {
        let (user_id, flags) = row?;
        stored.insert(user_id, flags);
    }

    let mut seen = std::collections::HashSet::new();
    let recipients = user_ids
        .iter()
        .filter(|id| seen.insert(id.as_str()))
        .map(|id| Recipient {
            user_id: id.clone(),
            channels: stored.get(id).copied().unwrap_or_default(),
        })
        .collect();
    Ok(recipients)
}
