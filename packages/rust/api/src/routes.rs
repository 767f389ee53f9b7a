use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use quizsmith_core::SilentProgress;
use quizsmith_shared::Quiz;
use serde::Deserialize;

use crate::error::{ApiError, Result};
use crate::state::AppState;

/// Quiz routes:
/// - `POST /generate`: generate or fetch the cached quiz for a URL
/// - `GET /history`: all stored quizzes
/// - `GET /quiz/{id}`: one stored quiz
pub fn setup_route() -> Router<AppState> {
    Router::new()
        .route("/generate", post(generate))
        .route("/history", get(history))
        .route("/quiz/{id}", get(quiz))
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub url: String,
    #[serde(default)]
    pub force_refresh: bool,
}

async fn generate(
    State(app): State<AppState>,
    payload: core::result::Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<Quiz>> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let quiz = app
        .coordinator()
        .generate(&req.url, req.force_refresh, &SilentProgress)
        .await?;
    Ok(Json(quiz))
}

async fn history(State(app): State<AppState>) -> Result<Json<Vec<Quiz>>> {
    Ok(Json(app.coordinator().history().await?))
}

async fn quiz(
    State(app): State<AppState>,
    id: core::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<Quiz>> {
    let Path(id) = id.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    app.coordinator()
        .quiz(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}
