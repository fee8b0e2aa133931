//! Event persistence and keyset-paginated retrieval.
//!
//! Events are totally ordered by `(starts_at, id)`. Every feed (a viewer's
//! invitations, team events, all-teams events, title search) goes through a
//! single query builder that combines an [`EventFilter`], an optional guest
//! join and an [`EventRange`]. The range carries the time bounds and the
//! keyset cursor, so paging behaves the same for every feed.
//!
//! # Keyset pagination
//!
//! A page request holds an optional cursor (an event id) and a limit. The
//! next page in direction `op` (`>` ascending, `<` descending) is selected
//! with:
//!
//! ```text
//! (id <op> cursor AND starts_at = starts_at_of(cursor)) OR starts_at <op> starts_at_of(cursor)
//! ```
//!
//! `starts_at` is not unique, so the id tie-break is what keeps rows sharing
//! a timestamp from being skipped or repeated while new rows are inserted
//! between page requests.
//!
//! # Errors
//!
//! Check constraint violations (inverted interval, individual event without
//! a team) surface as [`StoreError::Validation`]; every other SQLite error is
//! wrapped with the name of the failing operation.

mod error;
mod events;
mod guests;
mod query;
mod range;

pub use error::StoreError;
pub use events::{
    create_event, find_all, find_all_by_starts_at, find_all_by_team_ids, find_by_invited_user,
    find_event_by_id, get_all, search_by_title, update_event, update_event_as_admin, EventDraft,
    EventPatch,
};
pub use guests::{
    add_guests, find_guest, find_guest_user_ids, find_guests, find_pending_guests_by_event_ids,
    remove_guests, set_attendance,
};
pub use range::{EventFilter, EventRange, Page, TeamScope, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
