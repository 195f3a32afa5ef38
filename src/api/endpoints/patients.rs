//! Patient registry endpoints.
//!
//! Doctors register and look up patients; admins manage the full list,
//! edit demographics, and delete records without requests.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthSession};
use crate::db::repository::{audit, patient};
use crate::models::{NewPatient, Patient, PatientUpdate};

#[derive(Serialize)]
pub struct RegisteredPatient {
    pub id: i64,
    pub patient_id: String,
}

/// `POST /api/doctor/patients` — register a patient and assign a code.
pub async fn register(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<AuthSession>,
    Json(new): Json<NewPatient>,
) -> Result<Json<RegisteredPatient>, ApiError> {
    if new.first_name.trim().is_empty() || new.last_name.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "First and last name are required".into(),
        ));
    }

    let conn = ctx.open_db()?;
    let (id, patient_id) = patient::insert_patient(&conn, &new, session.user_id)?;

    audit::log_action(
        &conn,
        &audit::AuditEntry {
            user_id: Some(session.user_id),
            action: "register_patient".into(),
            table_name: Some("patients".into()),
            record_id: Some(id.to_string()),
            new_values: Some(serde_json::json!({ "patient_id": patient_id })),
            ..Default::default()
        },
    );

    Ok(Json(RegisteredPatient { id, patient_id }))
}

#[derive(Deserialize)]
pub struct PatientListQuery {
    pub search: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    1
}
fn default_per_page() -> u32 {
    20
}

#[derive(Serialize)]
pub struct PatientListResponse {
    pub patients: Vec<Patient>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

/// `GET /api/doctor/patients` and `GET /api/admin/patients` — paginated
/// list with optional name/code search.
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(query): Query<PatientListQuery>,
) -> Result<Json<PatientListResponse>, ApiError> {
    let conn = ctx.open_db()?;
    let per_page = query.per_page.clamp(1, 100);
    let (patients, total) = patient::list_patients(
        &conn,
        query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()),
        query.page.max(1),
        per_page,
    )?;

    Ok(Json(PatientListResponse {
        patients,
        total,
        page: query.page.max(1),
        per_page,
    }))
}

/// `GET /api/doctor/patients/:code` — lookup by patient code, as typed
/// on the request form.
pub async fn lookup(
    State(ctx): State<ApiContext>,
    Path(code): Path<String>,
) -> Result<Json<Patient>, ApiError> {
    let conn = ctx.open_db()?;
    let found = patient::get_by_code(&conn, code.trim())?
        .ok_or_else(|| ApiError::NotFound(format!("Patient not found with ID: {code}")))?;
    Ok(Json(found))
}

#[derive(Serialize)]
pub struct RecentPatientsResponse {
    pub patients: Vec<Patient>,
}

/// `GET /api/doctor/patients/recent` — the doctor's latest registrations.
pub async fn recent(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<AuthSession>,
) -> Result<Json<RecentPatientsResponse>, ApiError> {
    let conn = ctx.open_db()?;
    let patients = patient::recent_by_doctor(&conn, session.user_id, 10)?;
    Ok(Json(RecentPatientsResponse { patients }))
}

#[derive(Serialize)]
pub struct UpdatedResponse {
    pub status: &'static str,
}

/// `PUT /api/admin/patients/:id` — edit demographics.
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<AuthSession>,
    Path(id): Path<i64>,
    Json(update): Json<PatientUpdate>,
) -> Result<Json<UpdatedResponse>, ApiError> {
    let conn = ctx.open_db()?;
    patient::update_patient(&conn, id, &update)?;

    audit::log_action(
        &conn,
        &audit::AuditEntry {
            user_id: Some(session.user_id),
            action: "update_patient".into(),
            table_name: Some("patients".into()),
            record_id: Some(id.to_string()),
            ..Default::default()
        },
    );

    Ok(Json(UpdatedResponse { status: "ok" }))
}

/// `DELETE /api/admin/patients/:id` — hard delete, rejected when the
/// patient has test requests.
pub async fn delete(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<AuthSession>,
    Path(id): Path<i64>,
) -> Result<Json<UpdatedResponse>, ApiError> {
    let conn = ctx.open_db()?;
    let old = patient::delete_patient(&conn, id)?;

    audit::log_action(
        &conn,
        &audit::AuditEntry {
            user_id: Some(session.user_id),
            action: "delete_patient".into(),
            table_name: Some("patients".into()),
            record_id: Some(id.to_string()),
            old_values: serde_json::to_value(&old).ok(),
            ..Default::default()
        },
    );

    Ok(Json(UpdatedResponse { status: "ok" }))
}
