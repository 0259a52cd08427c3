//! Query and replay API, plus `/metrics` and `/health`.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::domain::errors::StorageError;
use crate::domain::models::{Event, EventPage, EventQuery};
use crate::domain::ports::EventStore;
use crate::services::metrics;
use crate::services::replay::{ReplayError, ReplayRange, ReplayService};

/// Page size when a listing gives no limit.
const DEFAULT_PAGE_SIZE: u32 = 50;

pub struct ApiState {
    pub store: Arc<dyn EventStore>,
    pub replay: Arc<ReplayService>,
    pub registry: prometheus::Registry,
}

pub fn api_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/events", get(list_events))
        .route("/api/events/{id}", get(get_event))
        .route("/api/events/{id}/replay", post(replay_event))
        .route("/api/replay", post(replay_range))
        .route("/api/stats", get(get_stats))
        .route("/metrics", get(render_metrics))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Error body returned by every API endpoint.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "BAD_REQUEST",
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "NOT_FOUND",
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "INTERNAL_ERROR",
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.message,
            code: self.code.to_string(),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        if err.is_not_found() {
            return Self::not_found(err.to_string());
        }
        if let StorageError::InvalidEvent(_) = err {
            return Self::bad_request(err.to_string());
        }
        error!(error = %err, "storage failure in API request");
        Self::internal("Internal server error")
    }
}

impl From<ReplayError> for ApiError {
    fn from(err: ReplayError) -> Self {
        match err {
            ReplayError::NotFound(_) | ReplayError::NothingToReplay => Self::not_found(err.to_string()),
            ReplayError::InvalidLimit | ReplayError::InvalidRange => Self::bad_request(err.to_string()),
            ReplayError::Storage(e) => e.into(),
        }
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Default, Deserialize)]
struct ListParams {
    /// One type or a comma-separated list.
    #[serde(rename = "type")]
    event_type: Option<String>,
    repository: Option<String>,
    sender: Option<String>,
    since: Option<String>,
    until: Option<String>,
    pending: Option<bool>,
    limit: Option<u32>,
    offset: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct StatsParams {
    since: Option<String>,
}

#[derive(Debug, Serialize)]
struct ReplayResponse {
    replayed_count: usize,
    events: Vec<Event>,
}

fn parse_time(name: &str, value: Option<&str>) -> ApiResult<Option<DateTime<Utc>>> {
    value
        .filter(|v| !v.is_empty())
        .map(|v| {
            DateTime::parse_from_rfc3339(v)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|_| ApiError::bad_request(format!("Invalid {name} parameter")))
        })
        .transpose()
}

fn split_types(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

async fn list_events(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<EventPage>> {
    let mut query = EventQuery::new()
        .types(split_types(params.event_type.as_deref()))
        .limit(params.limit.unwrap_or(DEFAULT_PAGE_SIZE));
    query.repository = params.repository.filter(|r| !r.is_empty());
    query.sender = params.sender.filter(|s| !s.is_empty());
    query.since = parse_time("since", params.since.as_deref())?;
    query.until = parse_time("until", params.until.as_deref())?;
    query.only_pending = params.pending.unwrap_or(false);
    query.offset = params.offset;

    Ok(Json(state.store.list_events(&query).await?))
}

async fn get_event(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Event>> {
    state
        .store
        .get_event(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Event not found"))
}

async fn get_stats(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<StatsParams>,
) -> ApiResult<Json<BTreeMap<String, u64>>> {
    let since = parse_time("since", params.since.as_deref())?;
    Ok(Json(state.store.get_stats(since).await?))
}

async fn replay_event(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ReplayResponse>> {
    let replay = state.replay.replay_event(&id).await?;
    Ok(Json(ReplayResponse {
        replayed_count: 1,
        events: vec![replay],
    }))
}

async fn replay_range(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<ReplayResponse>> {
    let since = parse_time("since", params.since.as_deref())?
        .ok_or_else(|| ApiError::bad_request("Missing since parameter"))?;
    let until = parse_time("until", params.until.as_deref())?
        .ok_or_else(|| ApiError::bad_request("Missing until parameter"))?;

    let mut range = ReplayRange::new(since, until);
    range.types = split_types(params.event_type.as_deref());
    range.repository = params.repository.filter(|r| !r.is_empty());
    range.sender = params.sender.filter(|s| !s.is_empty());
    range.limit = params.limit;

    let events = state.replay.replay_range(&range).await?;
    Ok(Json(ReplayResponse {
        replayed_count: events.len(),
        events,
    }))
}

async fn render_metrics(State(state): State<Arc<ApiState>>) -> ApiResult<Response> {
    let text = metrics::render(&state.registry).map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], text).into_response())
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "service": "hubrelay" }))
}
