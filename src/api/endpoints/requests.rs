//! Test-request endpoints for doctors, plus the lab work queue and
//! status transitions.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthSession};
use crate::db::repository::{audit, catalog, request, result};
use crate::models::enums::{RequestStatus, Urgency};
use crate::models::{NewTestRequest, TestCatalogEntry, TestRequest, TestRequestItem};
use crate::workflow;

/// `POST /api/doctor/requests` — submit a request with one or more
/// tests. All-or-nothing.
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<AuthSession>,
    Json(new): Json<NewTestRequest>,
) -> Result<Json<request::CreatedRequest>, ApiError> {
    let conn = ctx.open_db()?;
    let created = request::create_request(&conn, session.user_id, &new)?;

    audit::log_action(
        &conn,
        &audit::AuditEntry {
            user_id: Some(session.user_id),
            action: "create_test_request".into(),
            table_name: Some("test_requests".into()),
            record_id: Some(created.id.to_string()),
            new_values: Some(serde_json::json!({
                "request_id": created.request_id,
                "tests": created.item_count,
            })),
            ..Default::default()
        },
    );

    Ok(Json(created))
}

#[derive(Serialize)]
pub struct RequestListResponse {
    pub requests: Vec<request::RequestOverview>,
}

/// `GET /api/doctor/requests` — the doctor's own requests.
pub async fn list_mine(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<AuthSession>,
) -> Result<Json<RequestListResponse>, ApiError> {
    let conn = ctx.open_db()?;
    let requests = request::list_by_doctor(&conn, session.user_id, 50)?;
    Ok(Json(RequestListResponse { requests }))
}

#[derive(Serialize)]
pub struct RequestDetail {
    pub request: TestRequest,
    pub items: Vec<TestRequestItem>,
    pub results: Vec<result::ResultView>,
}

/// `GET /api/doctor/requests/:id` — a request with its items and any
/// entered results.
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<i64>,
) -> Result<Json<RequestDetail>, ApiError> {
    let conn = ctx.open_db()?;
    let found = request::get_request(&conn, id)?;
    let items = request::items_for_request(&conn, id)?;
    let results = result::results_for_request(&conn, id)?;
    Ok(Json(RequestDetail {
        request: found,
        items,
        results,
    }))
}

#[derive(Serialize)]
pub struct CatalogResponse {
    pub tests: Vec<TestCatalogEntry>,
}

/// `GET /api/doctor/tests` — active catalog for the request form.
pub async fn orderable_tests(
    State(ctx): State<ApiContext>,
) -> Result<Json<CatalogResponse>, ApiError> {
    let conn = ctx.open_db()?;
    let tests = catalog::list_tests(&conn, true)?;
    Ok(Json(CatalogResponse { tests }))
}

#[derive(Deserialize)]
pub struct QueueQuery {
    #[serde(default = "default_status")]
    pub status: RequestStatus,
    pub urgency: Option<Urgency>,
    pub date: Option<NaiveDate>,
}

fn default_status() -> RequestStatus {
    RequestStatus::Pending
}

/// `GET /api/lab/requests` — work queue filtered by status, urgency
/// and request date.
pub async fn queue(
    State(ctx): State<ApiContext>,
    Query(query): Query<QueueQuery>,
) -> Result<Json<RequestListResponse>, ApiError> {
    let conn = ctx.open_db()?;
    let requests = request::list_filtered(&conn, query.status, query.urgency, query.date)?;
    Ok(Json(RequestListResponse { requests }))
}

#[derive(Deserialize)]
pub struct StatusUpdate {
    pub status: RequestStatus,
}

#[derive(Serialize)]
pub struct StatusUpdated {
    pub previous: RequestStatus,
    pub status: RequestStatus,
}

/// `PUT /api/lab/requests/:id/status` — move a request through its
/// lifecycle. Invalid transitions are rejected.
pub async fn update_status(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<AuthSession>,
    Path(id): Path<i64>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<StatusUpdated>, ApiError> {
    let conn = ctx.open_db()?;
    let previous = workflow::transition_request(&conn, id, update.status)?;

    audit::log_action(
        &conn,
        &audit::AuditEntry {
            user_id: Some(session.user_id),
            action: "update_request_status".into(),
            table_name: Some("test_requests".into()),
            record_id: Some(id.to_string()),
            old_values: Some(serde_json::json!({ "status": previous.as_str() })),
            new_values: Some(serde_json::json!({ "status": update.status.as_str() })),
            ..Default::default()
        },
    );

    Ok(Json(StatusUpdated {
        previous,
        status: update.status,
    }))
}
