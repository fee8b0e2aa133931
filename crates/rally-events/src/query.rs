//! The parametrised feed query builder.
//!
//! Clauses and bind parameters are collected separately so user input is
//! never interpolated into SQL. Placeholders are numbered, which lets the
//! keyset predicate reference the cursor more than once.

use chrono::{DateTime, Utc};
use rally_types::{Attendance, Event, SortOrder};
use rusqlite::types::ToSql;
use rusqlite::Connection;

use crate::error::storage;
use crate::events::{map_row_to_event, EVENT_COLUMNS_E};
use crate::range::{EventFilter, EventRange, Page, TeamScope};
use crate::StoreError;

pub(crate) struct EventQuery {
    join: Option<String>,
    clauses: Vec<String>,
    params: Vec<Box<dyn ToSql>>,
}

impl EventQuery {
    pub(crate) fn new() -> Self {
        Self {
            join: None,
            clauses: Vec::new(),
            params: Vec::new(),
        }
    }

    /// Registers a bind value and returns its placeholder.
    fn bind<T: ToSql + 'static>(&mut self, value: T) -> String {
        self.params.push(Box::new(value));
        format!("?{}", self.params.len())
    }

    fn bind_list(&mut self, values: &[String]) -> String {
        values
            .iter()
            .map(|v| self.bind(v.clone()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub(crate) fn filter(mut self, filter: &EventFilter) -> Self {
        if let Some(owner_id) = &filter.owner_id {
            let p = self.bind(owner_id.clone());
            self.clauses.push(format!("e.owner_id = {p}"));
        }
        if let Some(cancelled) = filter.is_cancelled {
            let p = self.bind(cancelled);
            self.clauses.push(format!("e.is_cancelled = {p}"));
        }
        if let Some(individual) = filter.is_individual {
            let p = self.bind(individual);
            self.clauses.push(format!("e.is_individual = {p}"));
        }
        match &filter.team_scope {
            None => {}
            Some(TeamScope::AllTeams) => self.clauses.push("e.team_id IS NULL".to_string()),
            Some(TeamScope::Teams(ids)) if ids.is_empty() => {
                self.clauses.push("0".to_string());
            }
            Some(TeamScope::Teams(ids)) => {
                let list = self.bind_list(ids);
                self.clauses.push(format!("e.team_id IN ({list})"));
            }
            Some(TeamScope::TeamsOrAllTeams(ids)) if ids.is_empty() => {
                self.clauses.push("e.team_id IS NULL".to_string());
            }
            Some(TeamScope::TeamsOrAllTeams(ids)) => {
                let list = self.bind_list(ids);
                self.clauses
                    .push(format!("(e.team_id IN ({list}) OR e.team_id IS NULL)"));
            }
        }
        self
    }

    /// Restricts to events the user is invited to, optionally by attendance.
    pub(crate) fn invited(mut self, user_id: &str, attendance: Option<Attendance>) -> Self {
        let p = self.bind(user_id.to_string());
        self.join = Some(format!(
            "JOIN event_users g ON g.event_id = e.id AND g.user_id = {p}"
        ));
        match attendance.map(Attendance::as_flag) {
            None => {}
            Some(None) => self.clauses.push("g.is_attending IS NULL".to_string()),
            Some(Some(flag)) => {
                let p = self.bind(flag);
                self.clauses.push(format!("g.is_attending = {p}"));
            }
        }
        self
    }

    /// Case-insensitive substring match on the title.
    pub(crate) fn title_contains(mut self, text: &str) -> Self {
        let p = self.bind(format!("%{}%", escape_like(text)));
        self.clauses.push(format!("e.title LIKE {p} ESCAPE '\\'"));
        self
    }

    /// Restricts to events starting within `[from, to]`.
    pub(crate) fn starts_within(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        let lo = self.bind(from.timestamp_millis());
        let hi = self.bind(to.timestamp_millis());
        self.clauses.push(format!("e.starts_at BETWEEN {lo} AND {hi}"));
        self
    }

    /// Applies the time bounds and the keyset cursor of `range`.
    pub(crate) fn range(mut self, range: &EventRange) -> Self {
        let (from_column, to_column) = if range.include_ongoing {
            ("e.ends_at", "e.starts_at")
        } else {
            ("e.starts_at", "e.ends_at")
        };
        if let Some(from) = range.from {
            let p = self.bind(from.timestamp_millis());
            self.clauses.push(format!("{from_column} >= {p}"));
        }
        if let Some(to) = range.to {
            let p = self.bind(to.timestamp_millis());
            self.clauses.push(format!("{to_column} <= {p}"));
        }
        if let Some(cursor) = &range.cursor {
            let op = range.order.operator();
            let c = self.bind(cursor.clone());
            let anchor = format!("(SELECT starts_at FROM events WHERE id = {c})");
            self.clauses.push(format!(
                "((e.id {op} {c} AND e.starts_at = {anchor}) OR e.starts_at {op} {anchor})"
            ));
        }
        self
    }

    fn sql(&self, order: SortOrder, limit: Option<u32>) -> String {
        let mut sql = format!("SELECT {EVENT_COLUMNS_E} FROM events e");
        if let Some(join) = &self.join {
            sql.push(' ');
            sql.push_str(join);
        }
        if !self.clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.clauses.join(" AND "));
        }
        let dir = order.keyword();
        sql.push_str(&format!(" ORDER BY e.starts_at {dir}, e.id {dir}"));
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        sql
    }

    /// Runs the query without a limit.
    pub(crate) fn fetch_all(
        self,
        conn: &Connection,
        op: &'static str,
        order: SortOrder,
    ) -> Result<Vec<Event>, StoreError> {
        let sql = self.sql(order, None);
        self.run(conn, op, &sql)
    }

    /// Runs the query as one page of `range`.
    ///
    /// One row past the page size is requested to learn whether another page
    /// follows. A cursor naming no stored event is a `Validation` error.
    pub(crate) fn fetch_page(
        self,
        conn: &Connection,
        op: &'static str,
        range: &EventRange,
    ) -> Result<Page<Event>, StoreError> {
        if let Some(cursor) = &range.cursor {
            require_cursor(conn, op, cursor)?;
        }

        let size = range.page_size() as usize;
        let sql = self.sql(range.order, Some(range.page_size() + 1));
        let mut items = self.run(conn, op, &sql)?;

        let next_cursor = if items.len() > size {
            items.truncate(size);
            items.last().map(|e| e.id.clone())
        } else {
            None
        };
        Ok(Page { items, next_cursor })
    }

    fn run(&self, conn: &Connection, op: &'static str, sql: &str) -> Result<Vec<Event>, StoreError> {
        tracing::trace!(op, sql, "running event query");
        let params: Vec<&dyn ToSql> = self.params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(sql).map_err(storage(op))?;
        let rows = stmt
            .query_map(params.as_slice(), map_row_to_event)
            .map_err(storage(op))?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row.map_err(storage(op))?);
        }
        Ok(events)
    }
}

fn require_cursor(conn: &Connection, op: &'static str, cursor: &str) -> Result<(), StoreError> {
    let known: bool = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM events WHERE id = ?1)",
            [cursor],
            |row| row.get(0),
        )
        .map_err(storage(op))?;
    if known {
        Ok(())
    } else {
        Err(StoreError::Validation(format!("unknown cursor {cursor}")))
    }
}

/// Escapes `%`, `_` and the escape character itself for a `LIKE` pattern.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
