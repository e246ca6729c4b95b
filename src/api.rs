use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};

use crate::feeds::{FeedRegistry, FeedStatus};
use crate::model::{Content, ContentEvent};
use crate::scheduler::Scheduler;

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
    pub registry: FeedRegistry,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/events", post(submit_event))
        .route("/feeds", get(feed_status))
        .with_state(state)
}

#[derive(serde::Deserialize)]
struct EventReq {
    content: Content,
    transaction_id: String,
    #[serde(default)]
    publish_timestamp: Option<DateTime<Utc>>, // when absent, "now"
    #[serde(default)]
    marked_deleted: bool,
}

#[derive(serde::Serialize)]
struct EventResp {
    scheduled: usize,
}

async fn submit_event(
    State(state): State<AppState>,
    Json(body): Json<EventReq>,
) -> Result<Json<EventResp>, (StatusCode, String)> {
    if body.content.id.trim().is_empty() || body.transaction_id.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "content.id and transaction_id are required".to_string(),
        ));
    }
    let event = ContentEvent {
        content: body.content,
        transaction_id: body.transaction_id,
        publish_timestamp: body.publish_timestamp.unwrap_or_else(Utc::now),
        marked_deleted: body.marked_deleted,
    };
    let scheduled = state.scheduler.schedule(&event);
    Ok(Json(EventResp { scheduled }))
}

async fn feed_status(State(state): State<AppState>) -> Json<Vec<FeedStatus>> {
    Json(state.registry.snapshot())
}
