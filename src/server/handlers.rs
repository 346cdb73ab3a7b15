//! REST API handlers

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::analysis::compute;
use crate::models::{DistributionSnapshot, Form, FormPayload};
use crate::report::{generate_markdown_report, responses_to_csv, safe_name};
use crate::server::{ApiError, AppState};
use crate::store::FormStore;

type ApiResult<T> = Result<T, ApiError>;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Seconds since server started
    pub uptime_seconds: i64,
}

/// GET /api/health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
    })
}

fn parse_json<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|_| ApiError::BadRequest("invalid JSON".to_string()))
}

/// POST /api/forms
pub async fn create_form(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FormPayload>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Form>)> {
    let form = state.store.create_form(parse_json(payload)?).await?;
    Ok((StatusCode::CREATED, Json(form)))
}

/// GET /api/forms/:id
pub async fn get_form(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Form>> {
    Ok(Json(state.store.get_form(&id).await?))
}

/// PUT /api/forms/:id
pub async fn update_form(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<FormPayload>, JsonRejection>,
) -> ApiResult<Json<Form>> {
    Ok(Json(state.store.update_form(&id, parse_json(payload)?).await?))
}

#[derive(Debug, Deserialize)]
pub struct SubmitPayload {
    pub answers: Option<BTreeMap<String, Value>>,
}

/// POST /api/forms/:id/responses
pub async fn submit_response(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<SubmitPayload>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    // Unknown form wins over a bad body.
    state.store.get_form(&id).await?;
    let answers = parse_json(payload)?
        .answers
        .ok_or_else(|| ApiError::BadRequest("answers required".to_string()))?;

    let record = state.store.submit_response(&id, answers).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/forms/:id/responses
pub async fn list_responses(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<Value> {
    let items = state.store.list_responses(&id).await;
    Json(json!({ "items": items }))
}

/// GET /api/forms/:id/responses/export.csv
pub async fn export_csv(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let form = state.store.get_form(&id).await?;
    let records = state.store.get_records(&id).await?;
    let body = responses_to_csv(&form, &records)?;

    Ok(attachment(
        "text/csv; charset=utf-8",
        format!("{}_responses.csv", safe_name(&form.title)),
        body,
    ))
}

/// GET /api/forms/:id/responses/export.md
pub async fn export_markdown(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let form = state.store.get_form(&id).await?;
    let records = state.store.get_records(&id).await?;
    let body = generate_markdown_report(&form, &compute(&form, &records));

    Ok(attachment(
        "text/markdown; charset=utf-8",
        format!("{}_responses.md", safe_name(&form.title)),
        body,
    ))
}

fn attachment(content_type: &str, filename: String, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}

/// GET /api/forms/:id/analytics
pub async fn get_analytics(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<DistributionSnapshot>> {
    Ok(Json(state.coordinator.snapshot(&id).await?))
}

#[derive(Debug, Deserialize)]
pub struct LongPollQuery {
    pub since: Option<String>,
}

/// GET /api/forms/:id/analytics/longpoll?since=<ms>
///
/// A malformed `since` counts as 0. If the client disconnects, axum drops
/// this future and the wait ticket unregisters itself.
pub async fn longpoll_analytics(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<LongPollQuery>,
) -> ApiResult<Response> {
    let since = query
        .since
        .and_then(|s| s.trim().parse::<i64>().ok())
        .unwrap_or(0);
    let cancel = state.shutdown.child_token();

    let outcome = state
        .coordinator
        .resolve(&id, since, state.ceiling, &cancel)
        .await?;

    Ok(match outcome.into_response() {
        Some(body) => Json(body).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}
