//! Event API handlers.

use crate::api::{with_service, ApiError};
use crate::middleware::CurrentUser;
use crate::AppState;
use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use rally_events::{EventDraft, EventPatch, Page};
use rally_notify::DispatchOutcome;
use rally_service::{Outcome, PageRequest};
use rally_types::{Event, Guest, Location};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;

/// Maximum length for an event title.
const MAX_TITLE_LEN: usize = 256;
/// Maximum length for an event description.
const MAX_DESCRIPTION_LEN: usize = 8 * 1024;

#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub team_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default)]
    pub is_individual: bool,
    pub address: Option<String>,
    pub image_url: Option<String>,
    pub location: Option<Location>,
    #[serde(default = "default_true")]
    pub is_owner_attending: bool,
    #[serde(default)]
    pub guest_ids: Vec<String>,
}

/// Partial update. For nullable fields an explicit `null` clears the value
/// and an absent key leaves it untouched.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "double_option")]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub image_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub location: Option<Option<Location>>,
}

#[derive(Debug, Deserialize)]
pub struct GuestListRequest {
    #[serde(default)]
    pub add: Vec<String>,
    #[serde(default)]
    pub remove: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AttendanceRequest {
    pub attending: bool,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

/// What happened to one notification triggered by a mutation.
#[derive(Debug, Serialize)]
pub struct NotificationSummary {
    pub status: &'static str,
    pub recipients: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl From<&DispatchOutcome> for NotificationSummary {
    fn from(outcome: &DispatchOutcome) -> Self {
        match outcome {
            DispatchOutcome::Delivered { recipients } => Self {
                status: "delivered",
                recipients: recipients.len(),
                detail: None,
            },
            DispatchOutcome::Skipped(reason) => Self {
                status: "skipped",
                recipients: 0,
                detail: Some(reason.clone()),
            },
            DispatchOutcome::Failed(_) => Self {
                status: "failed",
                recipients: 0,
                detail: None,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MutationResponse<T> {
    pub data: T,
    pub notifications: Vec<NotificationSummary>,
}

impl<T> From<Outcome<T>> for MutationResponse<T> {
    fn from(outcome: Outcome<T>) -> Self {
        Self {
            notifications: outcome.notifications.iter().map(Into::into).collect(),
            data: outcome.value,
        }
    }
}

fn default_true() -> bool {
    true
}

fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn validate_text(title: Option<&str>, description: Option<&str>) -> Result<(), ApiError> {
    if let Some(title) = title {
        if title.trim().is_empty() || title.len() > MAX_TITLE_LEN {
            return Err(ApiError::BadRequest(format!(
                "title must be 1..={} bytes",
                MAX_TITLE_LEN
            )));
        }
    }
    if description.is_some_and(|d| d.len() > MAX_DESCRIPTION_LEN) {
        return Err(ApiError::BadRequest(format!(
            "description must be at most {} bytes",
            MAX_DESCRIPTION_LEN
        )));
    }
    Ok(())
}

impl UpdateEventRequest {
    fn into_patch(self) -> Result<EventPatch, ApiError> {
        validate_text(self.title.as_deref(), self.description.as_deref())?;
        Ok(EventPatch {
            title: self.title,
            description: self.description,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            address: self.address,
            image_url: self.image_url,
            location: self.location,
            is_cancelled: None,
        })
    }
}

/// POST /api/events
pub async fn create_event_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<MutationResponse<Event>>), ApiError> {
    validate_text(Some(payload.title.as_str()), Some(payload.description.as_str()))?;

    let draft = EventDraft {
        owner_id: user.id,
        team_id: payload.team_id,
        title: payload.title,
        description: payload.description,
        starts_at: payload.starts_at,
        ends_at: payload.ends_at,
        is_individual: payload.is_individual,
        address: payload.address,
        image_url: payload.image_url,
        location: payload.location,
    };
    let is_owner_attending = payload.is_owner_attending;
    let guest_ids = payload.guest_ids;

    let outcome = with_service(state, move |service, conn, cache| {
        service.create(conn, cache, draft, is_owner_attending, &guest_ids)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(outcome.into())))
}

/// GET /api/events/{eventId}
pub async fn get_event_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(event_id): Path<String>,
) -> Result<Json<Event>, ApiError> {
    let event = with_service(state, move |service, conn, cache| {
        service.find_one(conn, cache, &event_id, &user.id)
    })
    .await?;
    Ok(Json(event))
}

/// PATCH /api/events/{eventId}
pub async fn update_event_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(event_id): Path<String>,
    Json(payload): Json<UpdateEventRequest>,
) -> Result<Json<MutationResponse<Event>>, ApiError> {
    let patch = payload.into_patch()?;
    let outcome = with_service(state, move |service, conn, cache| {
        service.update(conn, cache, &event_id, &user.id, patch)
    })
    .await?;
    Ok(Json(outcome.into()))
}

/// PATCH /api/admin/events/{eventId}
pub async fn admin_update_event_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(event_id): Path<String>,
    Json(payload): Json<UpdateEventRequest>,
) -> Result<Json<MutationResponse<Event>>, ApiError> {
    if !state.admin_user_ids.contains(&user.id) {
        return Err(ApiError::Forbidden(format!(
            "user {} is not an administrator",
            user.id
        )));
    }
    let patch = payload.into_patch()?;
    tracing::info!(admin_id = %user.id, event_id = %event_id, "admin event update");

    let outcome = with_service(state, move |service, conn, cache| {
        service.update_as_admin(conn, cache, &event_id, patch)
    })
    .await?;
    Ok(Json(outcome.into()))
}

/// POST /api/events/{eventId}/cancel
pub async fn cancel_event_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(event_id): Path<String>,
) -> Result<Json<MutationResponse<Event>>, ApiError> {
    let outcome = with_service(state, move |service, conn, cache| {
        service.cancel_one(conn, cache, &event_id, &user.id)
    })
    .await?;
    Ok(Json(outcome.into()))
}

/// POST /api/events/{eventId}/restore
pub async fn restore_event_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(event_id): Path<String>,
) -> Result<Json<MutationResponse<Event>>, ApiError> {
    let outcome = with_service(state, move |service, conn, cache| {
        service.restore_one(conn, cache, &event_id, &user.id)
    })
    .await?;
    Ok(Json(outcome.into()))
}

/// PUT /api/events/{eventId}/guests
pub async fn update_guest_list_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(event_id): Path<String>,
    Json(payload): Json<GuestListRequest>,
) -> Result<Json<MutationResponse<Vec<Guest>>>, ApiError> {
    let outcome = with_service(state, move |service, conn, cache| {
        service.update_guest_list(
            conn,
            cache,
            &event_id,
            &user.id,
            &payload.add,
            &payload.remove,
        )
    })
    .await?;
    Ok(Json(outcome.into()))
}

/// PUT /api/events/{eventId}/attendance
pub async fn respond_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(event_id): Path<String>,
    Json(payload): Json<AttendanceRequest>,
) -> Result<Json<Guest>, ApiError> {
    let outcome = with_service(state, move |service, conn, cache| {
        service.respond(conn, cache, &event_id, &user.id, payload.attending)
    })
    .await?;
    Ok(Json(outcome.value))
}

/// GET /api/feeds/{feed}
///
/// Feeds: `pending`, `declined`, `yours`, `past`, `team`, `all-teams`.
pub async fn feed_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(feed): Path<String>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<Event>>, ApiError> {
    let feed = match feed.as_str() {
        "pending" | "declined" | "yours" | "past" | "team" | "all-teams" => feed,
        other => return Err(ApiError::NotFound(format!("feed {}", other))),
    };

    let events = with_service(state, move |service, conn, cache| {
        let user_id = user.id.as_str();
        match feed.as_str() {
            "pending" => service.find_pending(conn, user_id, &page),
            "declined" => service.find_declined(conn, user_id, &page),
            "yours" => service.find_yours(conn, user_id, &page),
            "past" => service.find_past(conn, user_id, &page),
            "team" => service.find_team_events(conn, cache, user_id, &page),
            _ => service.find_all_teams(conn, &page),
        }
    })
    .await?;
    Ok(Json(events))
}

/// GET /api/search?q=
pub async fn search_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Page<Event>>, ApiError> {
    let page = PageRequest {
        cursor: params.cursor,
        limit: params.limit,
    };
    let events = with_service(state, move |service, conn, cache| {
        service.search(conn, cache, &user.id, &params.q, &page)
    })
    .await?;
    Ok(Json(events))
}
