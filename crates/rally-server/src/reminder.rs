//! Background task reminding guests of invitations they have not answered.

use crate::config::MAX_LOOKAHEAD_MINUTES;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rally_db::DbPool;
use rally_notify::{BatchReport, NotificationDispatcher};
use std::time::Duration;
use tokio::time::sleep;

/// Window of event start times covered by one reminder run.
///
/// Both bounds are inclusive at millisecond precision. Each window starts
/// one millisecond after the previous one ended, so an event is reminded
/// about once as it enters the lookahead horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl ReminderWindow {
    /// First window: everything starting between now and the horizon.
    pub fn first(now: DateTime<Utc>, lookahead_minutes: i64) -> Self {
        Self {
            from: now,
            to: horizon(now, lookahead_minutes),
        }
    }

    /// The window following `self`, ending at the horizon seen from `now`.
    ///
    /// If the clock went backwards the window collapses to a single instant.
    pub fn next(&self, now: DateTime<Utc>, lookahead_minutes: i64) -> Self {
        let from = self
            .to
            .checked_add_signed(ChronoDuration::milliseconds(1))
            .unwrap_or(self.to);
        Self {
            from,
            to: horizon(now, lookahead_minutes).max(from),
        }
    }
}

/// `now` plus the lookahead clamped to `0..=MAX_LOOKAHEAD_MINUTES`,
/// saturating at the latest representable instant.
fn horizon(now: DateTime<Utc>, lookahead_minutes: i64) -> DateTime<Utc> {
    let minutes = lookahead_minutes.clamp(0, MAX_LOOKAHEAD_MINUTES);
    now.checked_add_signed(ChronoDuration::minutes(minutes))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Runs one reminder batch over `window`.
pub async fn run_reminders(
    pool: &DbPool,
    dispatcher: &NotificationDispatcher,
    window: ReminderWindow,
) -> BatchReport {
    let report = dispatcher
        .send_notifications_on_awaiting_invitations(pool, window.from, window.to)
        .await;

    if report.failed.is_empty() {
        tracing::debug!(
            from = %window.from,
            to = %window.to,
            jobs = report.jobs(),
            "reminder run finished"
        );
    } else {
        tracing::warn!(
            from = %window.from,
            to = %window.to,
            jobs = report.jobs(),
            failed = report.failed.len(),
            "reminder run finished with failures"
        );
    }
    report
}

/// Starts a background task that periodically reminds pending guests.
///
/// This task runs indefinitely. An interval of `0` disables it.
///
/// # Arguments
///
/// * `pool` - Database connection pool.
/// * `dispatcher` - Dispatcher used for delivery.
/// * `interval_seconds` - Time in seconds to wait between runs.
/// * `lookahead_minutes` - How far ahead of now a start time is reminded about.
pub async fn start_reminder_task(
    pool: DbPool,
    dispatcher: NotificationDispatcher,
    interval_seconds: u64,
    lookahead_minutes: i64,
) {
    if interval_seconds == 0 {
        tracing::warn!("reminder interval is 0, awaiting invitation reminders disabled");
        return;
    }

    let interval = Duration::from_secs(interval_seconds);
    tracing::info!(
        interval_seconds,
        lookahead_minutes,
        "starting awaiting invitation reminder task"
    );

    let mut window = ReminderWindow::first(Utc::now(), lookahead_minutes);
    loop {
        run_reminders(&pool, &dispatcher, window).await;
        sleep(interval).await;
        window = window.next(Utc::now(), lookahead_minutes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 1, 9, minute, 0).unwrap()
    }

    #[test]
    fn windows_do_not_overlap() {
        let first = ReminderWindow::first(at(0), 60);
        assert_eq!(first.from, at(0));
        assert_eq!(first.to, at(0) + ChronoDuration::minutes(60));

        let second = first.next(at(5), 60);
        assert_eq!(second.from, first.to + ChronoDuration::milliseconds(1));
        assert_eq!(second.to, at(5) + ChronoDuration::minutes(60));
    }

    #[test]
    fn clock_going_backwards_collapses_the_window() {
        let first = ReminderWindow::first(at(30), 60);
        let next = first.next(at(10), 60);
        assert_eq!(next.from, first.to + ChronoDuration::milliseconds(1));
        assert_eq!(next.to, next.from);
    }

    #[test]
    fn lookahead_is_clamped_instead_of_overflowing() {
        let first = ReminderWindow::first(at(0), i64::MAX);
        assert_eq!(first.to, at(0) + ChronoDuration::minutes(MAX_LOOKAHEAD_MINUTES));

        let next = first.next(at(1), i64::MIN);
        assert_eq!(next.to, next.from);

        let edge = ReminderWindow {
            from: DateTime::<Utc>::MAX_UTC,
            to: DateTime::<Utc>::MAX_UTC,
        };
        let after = edge.next(DateTime::<Utc>::MAX_UTC, 60);
        assert_eq!(after.to, DateTime::<Utc>::MAX_UTC);
    }
}
