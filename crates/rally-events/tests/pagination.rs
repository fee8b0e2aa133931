use std::collections::HashSet;
use std::thread;

use chrono::{Duration, TimeZone, Utc};
use rally_db::{create_pool, run_migrations, DbPool, DbRuntimeSettings};
use rally_events::{create_event, get_all, EventDraft, EventRange};
use rally_types::SortOrder;

fn setup_pool() -> (tempfile::TempDir, DbPool) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = dir.path().join("rally.db");
    let pool = create_pool(path.to_str().unwrap(), DbRuntimeSettings::default())
        .expect("failed to create pool");
    run_migrations(&pool.get().unwrap()).expect("failed to run migrations");
    (dir, pool)
}

fn draft(minute: i64) -> EventDraft {
    let starts_at = Utc.with_ymd_and_hms(2031, 6, 1, 12, 0, 0).unwrap() + Duration::minutes(minute);
    EventDraft {
        owner_id: "owner".to_string(),
        team_id: None,
        title: format!("slot {minute}"),
        description: String::new(),
        starts_at,
        ends_at: starts_at + Duration::minutes(30),
        is_individual: false,
        address: None,
        image_url: None,
        location: None,
    }
}

#[test]
fn paging_while_another_connection_writes() {
    let (_dir, pool) = setup_pool();

    let mut existing = HashSet::new();
    {
        let conn = pool.get().unwrap();
        for i in 0..40 {
            // Four events per start time.
            existing.insert(create_event(&conn, &draft(i / 4)).unwrap().id);
        }
    }

    for order in [SortOrder::Asc, SortOrder::Desc] {
        let writer_pool = pool.clone();
        let writer = thread::spawn(move || {
            let conn = writer_pool.get().unwrap();
            for i in 0..20 {
                create_event(&conn, &draft(i % 10)).unwrap();
            }
        });

        let conn = pool.get().unwrap();
        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let range = EventRange {
                order,
                ..EventRange::default()
            }
            .with_cursor(cursor)
            .with_limit(Some(3));
            let page = get_all(&conn, &range).unwrap();
            seen.extend(page.items.iter().map(|e| (e.starts_at, e.id.clone())));
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        writer.join().unwrap();

        let ids: HashSet<_> = seen.iter().map(|(_, id)| id.clone()).collect();
        assert_eq!(ids.len(), seen.len(), "{order:?}: an event was returned twice");
        assert!(
            existing.is_subset(&ids),
            "{order:?}: an event present before paging was skipped"
        );

        let mut expected = seen.clone();
        expected.sort();
        if order == SortOrder::Desc {
            expected.reverse();
        }
        assert_eq!(seen, expected, "{order:?}: pages are not in keyset order");

        let everything = get_all(&conn, &EventRange::default().with_limit(Some(100))).unwrap();
        assert!(everything.next_cursor.is_none());
        existing = everything.items.into_iter().map(|e| e.id).collect();
    }
}
