//! User, team and notification preference directories.
//!
//! These are the collaborators the event core consumes but does not own:
//! user lookup (existence, enabled flag, organization-wide opt-in), team
//! membership, and per-user delivery channel preferences. Each is a set of
//! free functions over a SQLite connection, sharing the schema created by
//! `rally-db`.

mod error;
pub mod preferences;
pub mod teams;
pub mod users;

pub use error::DirectoryError;
pub use preferences::{find_recipients_by_user_ids, set_preferences, Recipient};
pub use teams::{
    add_team_member, create_team, find_membership, find_team_ids_by_user_id, find_teams_by_ids,
    remove_team_member, Team, TeamMembership,
};
pub use users::{
    create_user, find_missing_user_ids, find_user_by_id, find_user_by_id_or_err,
    get_all_registered_user_ids, set_user_enabled, CreateUserParams, User,
};
