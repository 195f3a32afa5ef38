//! Dashboards, system reports, and the audit trail view.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::repository::{audit, report};

/// `GET /api/admin/dashboard`
pub async fn admin_dashboard(
    State(ctx): State<ApiContext>,
) -> Result<Json<report::AdminDashboard>, ApiError> {
    let conn = ctx.open_db()?;
    Ok(Json(report::admin_dashboard(&conn)?))
}

/// `GET /api/lab/dashboard`
pub async fn lab_dashboard(
    State(ctx): State<ApiContext>,
) -> Result<Json<report::LabDashboard>, ApiError> {
    let conn = ctx.open_db()?;
    Ok(Json(report::lab_dashboard(&conn)?))
}

#[derive(Serialize)]
pub struct SystemReport {
    pub categories: Vec<report::CategoryStat>,
    pub doctor_workload: Vec<report::DoctorWorkload>,
    pub top_tests: Vec<report::TopTest>,
    pub demographics: Vec<report::DemographicBucket>,
    pub sample_storage: Vec<report::StorageStat>,
}

/// `GET /api/admin/reports/system` — the combined analytics view.
pub async fn system_report(
    State(ctx): State<ApiContext>,
) -> Result<Json<SystemReport>, ApiError> {
    let conn = ctx.open_db()?;
    Ok(Json(SystemReport {
        categories: report::category_stats(&conn)?,
        doctor_workload: report::doctor_workload(&conn)?,
        top_tests: report::top_tests(&conn, 10)?,
        demographics: report::demographics(&conn)?,
        sample_storage: report::sample_storage_stats(&conn)?,
    }))
}

#[derive(Deserialize)]
pub struct AuditQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    pub user_id: Option<i64>,
    pub table: Option<String>,
}

fn default_limit() -> u32 {
    50
}

#[derive(Serialize)]
pub struct AuditResponse {
    pub entries: Vec<audit::AuditView>,
}

/// `GET /api/admin/audit` — activity trail, optionally narrowed to one
/// user or one table.
pub async fn audit_trail(
    State(ctx): State<ApiContext>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<AuditResponse>, ApiError> {
    let conn = ctx.open_db()?;
    let entries = audit::filtered_activity(
        &conn,
        query.user_id,
        query.table.as_deref(),
        query.limit.clamp(1, 500),
    )?;
    Ok(Json(AuditResponse { entries }))
}
