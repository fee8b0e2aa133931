use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use rally_db::{create_pool, DbRuntimeSettings};
use rally_directory::{add_team_member, create_team, create_user, set_user_enabled, CreateUserParams};
use rally_notify::{NotificationDispatcher, TracingChannel};
use rally_server::{app, AppState};
use rally_service::EventService;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tower::ServiceExt; // for oneshot

struct TestApp {
    app: Router,
    _db: NamedTempFile,
}

fn setup() -> TestApp {
    // Using tempfile for shared DB across pool connections
    let temp_file = NamedTempFile::new().unwrap();
    let pool = create_pool(temp_file.path().to_str().unwrap(), DbRuntimeSettings::default())
        .unwrap();
    {
        let conn = pool.get().unwrap();
        rally_db::run_migrations(&conn).unwrap();
        for id in ["owner", "guest", "member", "stranger", "admin", "disabled"] {
            create_user(
                &conn,
                &CreateUserParams {
                    id: id.to_string(),
                    display_name: id.to_string(),
                    is_registered: true,
                },
            )
            .unwrap();
        }
        set_user_enabled(&conn, "disabled", false).unwrap();
        create_team(&conn, "T1", "Team one").unwrap();
        add_team_member(&conn, "T1", "owner").unwrap();
        add_team_member(&conn, "T1", "member").unwrap();
    }

    let state = AppState {
        pool,
        service: EventService::new(NotificationDispatcher::new(Arc::new(TracingChannel))),
        admin_user_ids: Arc::new(HashSet::from(["admin".to_string()])),
    };

    TestApp {
        app: app(state),
        _db: temp_file,
    }
}

async fn send(app: &Router, method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("X-Rally-User", user);
    }
    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn event_body(team_id: Option<&str>, title: &str, guests: &[&str]) -> Value {
    let starts_at = Utc::now() + Duration::hours(2);
    json!({
        "team_id": team_id,
        "title": title,
        "starts_at": starts_at.to_rfc3339(),
        "ends_at": (starts_at + Duration::hours(1)).to_rfc3339(),
        "guest_ids": guests,
    })
}

async fn create(app: &Router, title: &str, guests: &[&str]) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/events",
        Some("owner"),
        Some(event_body(Some("T1"), title, guests)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_is_public() {
    let t = setup();
    let (status, body) = send(&t.app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn requests_without_a_known_enabled_user_are_unauthorized() {
    let t = setup();
    for user in [None, Some("nobody"), Some("disabled")] {
        let (status, _) = send(&t.app, "GET", "/api/feeds/yours", user, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "user {user:?}");
    }

    let request = Request::builder()
        .uri("/api/feeds/yours")
        .header("Authorization", "Bearer owner")
        .body(Body::empty())
        .unwrap();
    let response = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn create_then_view_by_audience() {
    let t = setup();
    let id = create(&t.app, "Standup", &["guest"]).await;

    for user in ["owner", "guest", "member"] {
        let (status, body) = send(&t.app, "GET", &format!("/api/events/{id}"), Some(user), None).await;
        assert_eq!(status, StatusCode::OK, "user {user}");
        assert_eq!(body["title"], "Standup");
    }

    let (status, body) = send(&t.app, "GET", &format!("/api/events/{id}"), Some("stranger"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].is_string());

    let (status, _) = send(&t.app, "GET", "/api/events/missing", Some("owner"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_rejects_bad_input() {
    let t = setup();

    let starts_at = Utc::now() - Duration::hours(1);
    let past = json!({
        "team_id": "T1",
        "title": "Late",
        "starts_at": starts_at.to_rfc3339(),
        "ends_at": (starts_at + Duration::hours(2)).to_rfc3339(),
    });
    let (status, _) = send(&t.app, "POST", "/api/events", Some("owner"), Some(past)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &t.app,
        "POST",
        "/api/events",
        Some("owner"),
        Some(event_body(Some("T1"), "   ", &[])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &t.app,
        "POST",
        "/api/events",
        Some("owner"),
        Some(event_body(Some("NO_SUCH_TEAM"), "Orphan", &[])),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &t.app,
        "POST",
        "/api/events",
        Some("owner"),
        Some(event_body(Some("T1"), "Ghosts", &["ghost-user"])),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn all_teams_event_reports_its_announcement() {
    let t = setup();
    let (status, body) = send(
        &t.app,
        "POST",
        "/api/events",
        Some("owner"),
        Some(event_body(None, "Town hall", &[])),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["notifications"][0]["status"], "delivered");
    // Every registered enabled user except the owner.
    assert_eq!(body["notifications"][0]["recipients"], 4);

    let (status, body) = send(&t.app, "GET", "/api/feeds/all-teams", Some("stranger"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn patch_distinguishes_null_from_absent() {
    let t = setup();
    let id = create(&t.app, "Offsite", &["guest"]).await;
    let uri = format!("/api/events/{id}");

    let (status, body) = send(
        &t.app,
        "PATCH",
        &uri,
        Some("owner"),
        Some(json!({ "address": "1 Main St", "location": { "lat": 1.0, "lng": 2.0, "name": null } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["address"], "1 Main St");
    assert_eq!(body["notifications"].as_array().unwrap().len(), 1);
    assert_eq!(body["notifications"][0]["recipients"], 1);

    let (status, body) = send(&t.app, "PATCH", &uri, Some("owner"), Some(json!({ "title": "Offsite 2" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["address"], "1 Main St");
    assert!(body["notifications"].as_array().unwrap().is_empty());

    let (status, body) = send(&t.app, "PATCH", &uri, Some("owner"), Some(json!({ "address": null }))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["address"].is_null());
    assert_eq!(body["data"]["title"], "Offsite 2");

    let (status, _) = send(&t.app, "PATCH", &uri, Some("guest"), Some(json!({ "title": "Mine" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn cancel_restore_cycle() {
    let t = setup();
    let id = create(&t.app, "Review", &["guest"]).await;

    let (status, body) = send(&t.app, "POST", &format!("/api/events/{id}/cancel"), Some("owner"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_cancelled"], true);
    assert_eq!(body["notifications"][0]["status"], "delivered");

    let (status, _) = send(&t.app, "POST", &format!("/api/events/{id}/cancel"), Some("owner"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&t.app, "POST", &format!("/api/events/{id}/restore"), Some("guest"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&t.app, "POST", &format!("/api/events/{id}/restore"), Some("owner"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_cancelled"], false);
    assert!(body["notifications"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn guest_list_and_attendance_drive_feeds() {
    let t = setup();
    let id = create(&t.app, "Retro", &[]).await;

    let (status, body) = send(
        &t.app,
        "PUT",
        &format!("/api/events/{id}/guests"),
        Some("owner"),
        Some(json!({ "add": ["guest", "stranger"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 3);
    assert_eq!(body["notifications"][0]["recipients"], 2);
    assert_eq!(body["notifications"][1]["status"], "skipped");

    let (_, body) = send(&t.app, "GET", "/api/feeds/pending", Some("guest"), None).await;
    assert_eq!(body["items"][0]["id"], id.as_str());

    let (status, body) = send(
        &t.app,
        "PUT",
        &format!("/api/events/{id}/attendance"),
        Some("guest"),
        Some(json!({ "attending": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["attendance"], "Declined");

    let (_, body) = send(&t.app, "GET", "/api/feeds/pending", Some("guest"), None).await;
    assert!(body["items"].as_array().unwrap().is_empty());
    let (_, body) = send(&t.app, "GET", "/api/feeds/declined", Some("guest"), None).await;
    assert_eq!(body["items"][0]["id"], id.as_str());

    let (status, _) = send(
        &t.app,
        "PUT",
        &format!("/api/events/{id}/attendance"),
        Some("member"),
        Some(json!({ "attending": true })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &t.app,
        "PUT",
        &format!("/api/events/{id}/guests"),
        Some("owner"),
        Some(json!({ "remove": ["owner"] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn feeds_page_with_cursor() {
    let t = setup();
    for title in ["a", "b", "c"] {
        create(&t.app, title, &[]).await;
    }

    let (status, first) = send(&t.app, "GET", "/api/feeds/team?limit=2", Some("member"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["items"].as_array().unwrap().len(), 2);
    let cursor = first["next_cursor"].as_str().unwrap();

    let (_, second) = send(
        &t.app,
        "GET",
        &format!("/api/feeds/team?limit=2&cursor={cursor}"),
        Some("member"),
        None,
    )
    .await;
    assert_eq!(second["items"].as_array().unwrap().len(), 1);
    assert!(second["next_cursor"].is_null());

    let (status, _) = send(
        &t.app,
        "GET",
        "/api/feeds/team?limit=2&cursor=no-such-event",
        Some("member"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, yours) = send(&t.app, "GET", "/api/feeds/yours", Some("owner"), None).await;
    assert_eq!(yours["items"].as_array().unwrap().len(), 3);

    let (_, team) = send(&t.app, "GET", "/api/feeds/team", Some("stranger"), None).await;
    assert!(team["items"].as_array().unwrap().is_empty());

    let (status, _) = send(&t.app, "GET", "/api/feeds/unknown", Some("owner"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn search_is_scoped_to_teams() {
    let t = setup();
    create(&t.app, "Quarterly planning", &[]).await;

    let (status, body) = send(&t.app, "GET", "/api/search?q=PLAN", Some("member"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);

    let (_, body) = send(&t.app, "GET", "/api/search?q=plan", Some("stranger"), None).await;
    assert!(body["items"].as_array().unwrap().is_empty());

    let (status, _) = send(&t.app, "GET", "/api/search?q=%20", Some("member"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_update_requires_configured_admin() {
    let t = setup();
    let id = create(&t.app, "Board", &["guest"]).await;
    let uri = format!("/api/admin/events/{id}");

    let (status, _) = send(&t.app, "PATCH", &uri, Some("owner"), Some(json!({ "title": "Nope" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&t.app, "PATCH", &uri, Some("admin"), Some(json!({ "title": "Board meeting" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Board meeting");
    assert!(body["notifications"].as_array().unwrap().is_empty());

    let (status, _) = send(&t.app, "PATCH", "/api/admin/events/missing", Some("admin"), Some(json!({ "title": "x" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
