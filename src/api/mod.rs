use axum::Json;
use axum::extract::{DefaultBodyLimit, Path};
use axum::routing::post;
use axum::{Router, extract::State, http::StatusCode, routing::get};

use crate::error::AppError;
use crate::models::CourseDraft;
use crate::services::{SyncOutcome, SyncService};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let body_limit = state.max_body_bytes;
    Router::new()
        .route("/health", get(health))
        .route("/courses/sync", post(sync_course))
        .route("/courses/{id}", get(get_course))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

fn service(state: &AppState) -> SyncService {
    SyncService::new(
        state.db.clone(),
        state.orchestrator.clone(),
        state.locks.clone(),
    )
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

async fn sync_course(
    State(state): State<AppState>,
    Json(draft): Json<CourseDraft>,
) -> Result<Json<SyncOutcome>, AppError> {
    let outcome = service(&state).sync_course(draft).await?;
    Ok(Json(outcome))
}

async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CourseDraft>, AppError> {
    let course = service(&state).load_course(&id).await?;
    Ok(Json(course))
}
