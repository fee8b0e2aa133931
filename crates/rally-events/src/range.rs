//! Declarative filter, range and page types shared by every feed.

use chrono::{DateTime, Utc};
use rally_types::SortOrder;
use serde::{Deserialize, Serialize};

/// Page size used when a request does not specify a limit.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Upper bound on the page size a caller may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Time bounds, ordering and keyset position of a feed query.
///
/// Bounds are inclusive. `include_ongoing` decides which end of the event
/// interval each bound is compared against:
///
/// | bound  | `include_ongoing = false` | `include_ongoing = true` |
/// |--------|---------------------------|--------------------------|
/// | `from` | `starts_at >= from`       | `ends_at >= from`        |
/// | `to`   | `ends_at <= to`           | `starts_at <= to`        |
///
/// So an event whose interval straddles a bound counts as "ongoing" at that
/// bound, whatever the wall clock says. Forward feeds pass `from = now`,
/// history passes `to = now`; the predicate is the same.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub include_ongoing: bool,
    pub order: SortOrder,
    /// Id of the last event of the previous page.
    pub cursor: Option<String>,
    /// Maximum number of events to return (default 20, clamped to 100).
    pub limit: Option<u32>,
}

impl EventRange {
    /// Events from `now` onwards, oldest first.
    pub fn upcoming(now: DateTime<Utc>, include_ongoing: bool) -> Self {
        Self {
            from: Some(now),
            include_ongoing,
            ..Self::default()
        }
    }

    /// Events that ended by `now`, most recent first.
    pub fn past(now: DateTime<Utc>) -> Self {
        Self {
            to: Some(now),
            order: SortOrder::Desc,
            ..Self::default()
        }
    }

    pub fn with_cursor(mut self, cursor: Option<String>) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn with_limit(mut self, limit: Option<u32>) -> Self {
        self.limit = limit;
        self
    }

    /// Effective page size after defaulting and clamping.
    pub fn page_size(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }
}

/// Which teams an event may belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeamScope {
    /// Only all-teams events (`team_id IS NULL`).
    AllTeams,
    /// Only events of the listed teams.
    Teams(Vec<String>),
    /// Events of the listed teams plus all-teams events.
    TeamsOrAllTeams(Vec<String>),
}

/// Row-level predicates that do not depend on time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    pub owner_id: Option<String>,
    pub team_scope: Option<TeamScope>,
    pub is_cancelled: Option<bool>,
    pub is_individual: Option<bool>,
}

/// One page of a keyset-paginated feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor for the following page, `None` once the feed is exhausted.
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
        }
    }
}
