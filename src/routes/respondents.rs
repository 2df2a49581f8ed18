//! Respondent routes
//!
//! The HTTP surface over the public façade (`services::engine`): `init`,
//! `navigate`, `saveAnswer`, `finalize`, `removeDeleted`, scoped to a single
//! respondent id in the path.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::{AnswerPatch, NavResponse, Respondent};
use crate::services::engine;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct InitRequest {
    pub initial_display_key: String,
}

#[derive(Debug, Deserialize)]
pub struct NavigateQuery {
    pub section_display_key: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveAnswerRequest {
    pub display_key: String,
    pub text_value: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub ok: bool,
}

async fn init(
    State(state): State<AppState>,
    Path(respondent_id): Path<i64>,
    Json(body): Json<InitRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    engine::init(&state, respondent_id, &body.initial_display_key).await?;
    Ok(Json(StatusResponse { ok: true }))
}

async fn navigate(
    State(state): State<AppState>,
    Path(respondent_id): Path<i64>,
    axum::extract::Query(query): axum::extract::Query<NavigateQuery>,
) -> Result<Json<NavResponse>, AppError> {
    let response = engine::navigate(&state, respondent_id, &query.section_display_key).await?;
    Ok(Json(response))
}

async fn save_answer(
    State(state): State<AppState>,
    Path(respondent_id): Path<i64>,
    Json(body): Json<SaveAnswerRequest>,
) -> Result<Json<NavResponse>, AppError> {
    let patch = AnswerPatch {
        respondent_id,
        display_key: body.display_key,
        text_value: body.text_value,
    };
    let response = engine::save_answer(&state, patch).await?;
    Ok(Json(response))
}

async fn finalize(
    State(state): State<AppState>,
    Path(respondent_id): Path<i64>,
) -> Result<Json<Respondent>, AppError> {
    let respondent = engine::finalize(&state, respondent_id).await?;
    Ok(Json(respondent))
}

async fn remove_deleted(
    State(state): State<AppState>,
    Path(respondent_id): Path<i64>,
) -> Result<Json<StatusResponse>, AppError> {
    engine::remove_deleted(&state, respondent_id).await?;
    Ok(Json(StatusResponse { ok: true }))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/:respondent_id/init", post(init))
        .route("/:respondent_id/navigate", get(navigate))
        .route("/:respondent_id/answers", post(save_answer))
        .route("/:respondent_id/finalize", post(finalize))
        .route("/:respondent_id/remove-deleted", post(remove_deleted))
}
