//! Sample registration and tracking endpoints for lab staff.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthSession};
use crate::db::repository::{audit, request, sample};
use crate::models::{NewSample, Sample, SampleStatusUpdate};

#[derive(Serialize)]
pub struct PendingRequestsResponse {
    pub requests: Vec<request::RequestOverview>,
}

/// `GET /api/lab/requests/pending-sample` — requests still waiting on
/// sample registration.
pub async fn pending_requests(
    State(ctx): State<ApiContext>,
) -> Result<Json<PendingRequestsResponse>, ApiError> {
    let conn = ctx.open_db()?;
    let requests = request::pending_without_sample(&conn)?;
    Ok(Json(PendingRequestsResponse { requests }))
}

#[derive(Serialize)]
pub struct RegisteredSample {
    pub id: i64,
    pub sample_id: String,
}

/// `POST /api/lab/samples` — register a sample for a request. Moves
/// the request to Sample Collected; a second sample is rejected.
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<AuthSession>,
    Json(new): Json<NewSample>,
) -> Result<Json<RegisteredSample>, ApiError> {
    if new.sample_type.trim().is_empty() {
        return Err(ApiError::BadRequest("Sample type is required".into()));
    }

    let conn = ctx.open_db()?;
    let (id, sample_id) = sample::create_sample(&conn, session.user_id, &new)?;

    audit::log_action(
        &conn,
        &audit::AuditEntry {
            user_id: Some(session.user_id),
            action: "register_sample".into(),
            table_name: Some("samples".into()),
            record_id: Some(id.to_string()),
            new_values: Some(serde_json::json!({
                "sample_id": sample_id,
                "request_id": new.request_id,
            })),
            ..Default::default()
        },
    );

    Ok(Json(RegisteredSample { id, sample_id }))
}

#[derive(Deserialize)]
pub struct SampleListQuery {
    pub search: Option<String>,
}

#[derive(Serialize)]
pub struct SampleListResponse {
    pub samples: Vec<sample::SampleOverview>,
}

/// `GET /api/lab/samples` — all samples, optionally filtered by a
/// search over sample/request/patient codes and names.
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(query): Query<SampleListQuery>,
) -> Result<Json<SampleListResponse>, ApiError> {
    let conn = ctx.open_db()?;
    let samples = sample::list_samples(&conn, query.search.as_deref())?;
    Ok(Json(SampleListResponse { samples }))
}

/// `GET /api/lab/samples/:code` — one sample by code.
pub async fn get(
    State(ctx): State<ApiContext>,
    Path(code): Path<String>,
) -> Result<Json<Sample>, ApiError> {
    let conn = ctx.open_db()?;
    let found = sample::get_by_code(&conn, code.trim())?
        .ok_or_else(|| ApiError::NotFound(format!("Sample not found: {code}")))?;
    Ok(Json(found))
}

#[derive(Serialize)]
pub struct SampleUpdated {
    pub status: &'static str,
}

/// `PUT /api/lab/samples/:code/status` — move a sample through its
/// handling lifecycle, optionally relocating it.
pub async fn update_status(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<AuthSession>,
    Path(code): Path<String>,
    Json(update): Json<SampleStatusUpdate>,
) -> Result<Json<SampleUpdated>, ApiError> {
    let conn = ctx.open_db()?;
    sample::update_status(
        &conn,
        code.trim(),
        update.status,
        update.storage_location.as_deref(),
        update.storage_temperature.as_deref(),
        update.notes.as_deref(),
    )?;

    audit::log_action(
        &conn,
        &audit::AuditEntry {
            user_id: Some(session.user_id),
            action: "update_sample_status".into(),
            table_name: Some("samples".into()),
            record_id: Some(code.trim().to_string()),
            new_values: Some(serde_json::json!({ "status": update.status.as_str() })),
            ..Default::default()
        },
    );

    Ok(Json(SampleUpdated { status: "ok" }))
}
