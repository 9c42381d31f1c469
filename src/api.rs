//! HTTP adapter over the event service.
//!
//! | Route                 | Service call    | Success |
//! |-----------------------|-----------------|---------|
//! | `POST /events`        | `create_sync`   | 201     |
//! | `POST /events/async`  | `create_async`  | 202     |
//! | `GET /events`         | `count`         | 200     |
//! | `GET /events/:id`     | `get_by_id`     | 200/404 |
//!
//! Malformed ids are 400; every service error, timeouts included, is 500.

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::engine::EventService;
use crate::error::Error;
use crate::model::{Event, EventId};

/// Build the axum router with all event endpoints.
pub fn build_router(service: EventService) -> Router {
    Router::new()
        .route("/events", post(create_sync).get(count))
        .route("/events/async", post(create_async))
        .route("/events/:id", get(get_event))
        .route("/health", get(health))
        .with_state(service)
}

/// Bind `addr` and serve until `shutdown` resolves.
pub async fn serve<F>(addr: &str, service: EventService, shutdown: F) -> crate::error::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    info!(addr, "HTTP API listening");
    axum::serve(listener, build_router(service))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Error response: a status code plus `{"error": message}`.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        error!("request failed: {err}");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

async fn create_sync(State(service): State<EventService>) -> ApiResult<(StatusCode, Json<Event>)> {
    let event = service.create_sync().await?;
    Ok((StatusCode::CREATED, Json(event)))
}

async fn create_async(
    State(service): State<EventService>,
) -> ApiResult<(StatusCode, Json<Event>)> {
    let event = service.create_async().await?;
    Ok((StatusCode::ACCEPTED, Json(event)))
}

async fn count(State(service): State<EventService>) -> ApiResult<Json<serde_json::Value>> {
    let count = service.count().await?;
    Ok(Json(json!({ "count": count })))
}

async fn get_event(
    State(service): State<EventService>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<Event>> {
    let id: EventId = raw_id
        .parse()
        .map_err(|_| ApiError::new(StatusCode::BAD_REQUEST, "invalid id"))?;

    match service.get_by_id(id).await? {
        Some(event) => Ok(Json(event)),
        None => Err(ApiError::new(StatusCode::NOT_FOUND, "event not found")),
    }
}

async fn health(State(service): State<EventService>) -> ApiResult<Json<serde_json::Value>> {
    service.health_check().await?;
    Ok(Json(json!({ "status": "ok" })))
}
