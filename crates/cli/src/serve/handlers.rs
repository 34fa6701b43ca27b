//! Route handlers: books, experience lifecycle, bulk approval, progress.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use logbook_engine::{Actor, CountingMode, ExperienceEdit, LifecycleError, NewExperience};
use logbook_storage::{CatalogStore, ExperienceStatus, RecordFilter};
use serde::Deserialize;

use super::json_error;
use super::state::AppState;

/// Error response of a handler.
pub(crate) enum ApiError {
    Engine(LifecycleError),
    /// Malformed query parameter or missing input.
    Invalid(String),
    Body(JsonRejection),
}

impl From<LifecycleError> for ApiError {
    fn from(e: LifecycleError) -> Self {
        ApiError::Engine(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::Body(e)
    }
}

fn engine_status(e: &LifecycleError) -> StatusCode {
    match e {
        LifecycleError::InvalidState { .. } => StatusCode::CONFLICT,
        LifecycleError::Unauthorized => StatusCode::UNAUTHORIZED,
        LifecycleError::Forbidden { .. } => StatusCode::FORBIDDEN,
        LifecycleError::NotFound { .. } | LifecycleError::UnknownReference { .. } => {
            StatusCode::NOT_FOUND
        }
        LifecycleError::MixedApprover
        | LifecycleError::EmptyBatch
        | LifecycleError::StudentNotAdmitted { .. }
        | LifecycleError::InvalidSubject { .. }
        | LifecycleError::InvalidSubmission(_) => StatusCode::UNPROCESSABLE_ENTITY,
        LifecycleError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Engine(LifecycleError::Storage(e)) => {
                tracing::error!(error = %e, "storage failure");
                json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal storage error",
                    "storage",
                )
            }
            ApiError::Engine(e) => json_error(engine_status(&e), &e.to_string(), e.code()),
            ApiError::Invalid(msg) => {
                json_error(StatusCode::UNPROCESSABLE_ENTITY, &msg, "invalid_request")
            }
            ApiError::Body(rejection) => {
                json_error(rejection.status(), &rejection.body_text(), "invalid_body")
            }
        }
    }
}

fn parse_mode(mode: Option<&str>) -> Result<CountingMode, ApiError> {
    mode.map_or(Ok(CountingMode::Overall), |m| {
        m.parse().map_err(ApiError::Invalid)
    })
}

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> Response {
    json_error(StatusCode::NOT_FOUND, "not found", "not_found")
}

/// GET /health
pub(crate) async fn handle_health() -> impl IntoResponse {
    let response = serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(response))
}

/// GET /books
pub(crate) async fn handle_list_books(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let books = state
        .engine
        .catalog()
        .list_books()
        .await
        .map_err(LifecycleError::from)?;

    let list: Vec<serde_json::Value> = books
        .iter()
        .map(|b| {
            serde_json::json!({
                "id": b.id,
                "title": b.title,
                "course_count": b.courses.len(),
                "sub_course_count": b.courses.iter().map(|c| c.sub_courses.len()).sum::<usize>(),
            })
        })
        .collect();
    Ok(Json(serde_json::json!({ "books": list })))
}

// ── Experiences ───────────────────────────────────────────────────────────────

/// POST /experiences
pub(crate) async fn handle_submit(
    State(state): State<Arc<AppState>>,
    body: Result<Json<NewExperience>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(new) = body?;
    let record = state.engine.submit_experience(new).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListQuery {
    student_id: Option<String>,
    book_id: Option<String>,
    status: Option<String>,
    approver_name: Option<String>,
}

/// GET /experiences
pub(crate) async fn handle_list_experiences(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<ExperienceStatus>)
        .transpose()
        .map_err(ApiError::Invalid)?;
    let filter = RecordFilter {
        student_id: query.student_id,
        book_id: query.book_id,
        status,
        approver_name: query.approver_name,
    };
    let records = state.engine.list_experiences(&filter).await?;
    Ok(Json(serde_json::json!({ "experiences": records })))
}

/// GET /experiences/{id}
pub(crate) async fn handle_get_experience(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.engine.get_experience(&id).await?))
}

#[derive(Debug, Deserialize)]
pub(crate) struct EditRequest {
    student_id: String,
    #[serde(flatten)]
    edit: ExperienceEdit,
}

/// PUT /experiences/{id}
pub(crate) async fn handle_edit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<EditRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body?;
    let record = state.engine.edit_own(&id, &req.student_id, req.edit).await?;
    Ok(Json(record))
}

#[derive(Debug, Deserialize)]
pub(crate) struct PinRequest {
    pin: String,
}

/// POST /experiences/{id}/confirm
pub(crate) async fn handle_confirm(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<PinRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body?;
    Ok(Json(state.engine.confirm(&id, &req.pin).await?))
}

/// POST /experiences/{id}/reject
pub(crate) async fn handle_reject(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<PinRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body?;
    Ok(Json(state.engine.reject(&id, &req.pin).await?))
}

#[derive(Debug, Deserialize)]
pub(crate) struct OwnerRequest {
    student_id: String,
}

/// POST /experiences/{id}/cancel
pub(crate) async fn handle_cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<OwnerRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body?;
    Ok(Json(state.engine.cancel_own(&id, &req.student_id).await?))
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeleteQuery {
    student_id: Option<String>,
}

/// DELETE /experiences/{id}
///
/// With a valid `X-Admin-Key`: admin delete of a `CANCEL` record. Otherwise
/// the owner named by `student_id` deletes a `CANCEL` record or withdraws a
/// `PENDING` one.
pub(crate) async fn handle_delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<DeleteQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let admin_key = headers.get("x-admin-key").and_then(|v| v.to_str().ok());
    if state.is_admin(admin_key) {
        state.engine.delete_cancelled(&id, &Actor::Admin).await?;
        return Ok(StatusCode::NO_CONTENT);
    }

    let student_id = query
        .student_id
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::Invalid("student_id query parameter is required".to_string()))?;

    let record = state.engine.get_experience(&id).await?;
    if record.status == ExperienceStatus::Pending {
        state.engine.cancel_and_delete_own(&id, &student_id).await?;
    } else {
        let owner = Actor::StudentOwner { student_id };
        state.engine.delete_cancelled(&id, &owner).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

// ── Bulk ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct BulkRequest {
    ids: Vec<String>,
    approver_name: String,
    pin: String,
}

/// POST /experiences/bulk/confirm
pub(crate) async fn handle_bulk_confirm(
    State(state): State<Arc<AppState>>,
    body: Result<Json<BulkRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body?;
    let outcome = state
        .engine
        .bulk_confirm(&req.ids, &req.approver_name, &req.pin)
        .await?;
    Ok(Json(outcome))
}

/// POST /experiences/bulk/reject
pub(crate) async fn handle_bulk_reject(
    State(state): State<Arc<AppState>>,
    body: Result<Json<BulkRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body?;
    let outcome = state
        .engine
        .bulk_reject(&req.ids, &req.approver_name, &req.pin)
        .await?;
    Ok(Json(outcome))
}

// ── Progress ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct ModeQuery {
    mode: Option<String>,
}

/// GET /books/{id}/progress/{student_id}
pub(crate) async fn handle_progress(
    State(state): State<Arc<AppState>>,
    Path((book_id, student_id)): Path<(String, String)>,
    Query(query): Query<ModeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let mode = parse_mode(query.mode.as_deref())?;
    let progress = state
        .engine
        .compute_progress(&student_id, &book_id, mode)
        .await?;
    Ok(Json(progress))
}

#[derive(Debug, Deserialize)]
pub(crate) struct CohortQuery {
    mode: Option<String>,
    /// Comma-separated student IDs. Absent: every student with a record.
    student_id: Option<String>,
}

/// GET /books/{id}/cohort
pub(crate) async fn handle_cohort(
    State(state): State<Arc<AppState>>,
    Path(book_id): Path<String>,
    Query(query): Query<CohortQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let mode = parse_mode(query.mode.as_deref())?;
    let students: Vec<String> = query
        .student_id
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    let cohort = state
        .engine
        .compute_cohort_progress(&students, &book_id, mode)
        .await?;
    Ok(Json(cohort))
}
