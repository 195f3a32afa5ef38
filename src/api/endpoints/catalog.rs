//! Test catalog administration.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthSession};
use crate::db::repository::{audit, catalog};
use crate::models::{NewCatalogEntry, TestCatalogEntry};

#[derive(Deserialize)]
pub struct CatalogQuery {
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Serialize)]
pub struct CatalogListResponse {
    pub tests: Vec<TestCatalogEntry>,
}

/// `GET /api/admin/tests` — full catalog, optionally active only.
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<CatalogListResponse>, ApiError> {
    let conn = ctx.open_db()?;
    let tests = catalog::list_tests(&conn, query.active_only)?;
    Ok(Json(CatalogListResponse { tests }))
}

#[derive(Serialize)]
pub struct CreatedTest {
    pub id: i64,
}

/// `POST /api/admin/tests` — add a catalog entry. Duplicate test codes
/// are rejected.
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<AuthSession>,
    Json(entry): Json<NewCatalogEntry>,
) -> Result<Json<CreatedTest>, ApiError> {
    if entry.test_code.trim().is_empty() || entry.test_name.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Test code and name are required".into(),
        ));
    }

    let conn = ctx.open_db()?;
    let id = catalog::insert_test(&conn, &entry)?;

    audit::log_action(
        &conn,
        &audit::AuditEntry {
            user_id: Some(session.user_id),
            action: "create_catalog_test".into(),
            table_name: Some("test_catalog".into()),
            record_id: Some(id.to_string()),
            new_values: Some(serde_json::json!({ "test_code": entry.test_code })),
            ..Default::default()
        },
    );

    Ok(Json(CreatedTest { id }))
}

#[derive(Serialize)]
pub struct OkResponse {
    pub status: &'static str,
}

/// `PUT /api/admin/tests/:id` — edit a catalog entry.
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<AuthSession>,
    Path(id): Path<i64>,
    Json(entry): Json<NewCatalogEntry>,
) -> Result<Json<OkResponse>, ApiError> {
    let conn = ctx.open_db()?;
    catalog::update_test(&conn, id, &entry)?;

    audit::log_action(
        &conn,
        &audit::AuditEntry {
            user_id: Some(session.user_id),
            action: "update_catalog_test".into(),
            table_name: Some("test_catalog".into()),
            record_id: Some(id.to_string()),
            ..Default::default()
        },
    );

    Ok(Json(OkResponse { status: "ok" }))
}

#[derive(Serialize)]
pub struct ToggledTest {
    pub is_active: bool,
}

/// `POST /api/admin/tests/:id/toggle` — flip a test's availability on
/// the request form.
pub async fn toggle(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<AuthSession>,
    Path(id): Path<i64>,
) -> Result<Json<ToggledTest>, ApiError> {
    let conn = ctx.open_db()?;
    let is_active = catalog::toggle_active(&conn, id)?;

    audit::log_action(
        &conn,
        &audit::AuditEntry {
            user_id: Some(session.user_id),
            action: "toggle_catalog_test".into(),
            table_name: Some("test_catalog".into()),
            record_id: Some(id.to_string()),
            new_values: Some(serde_json::json!({ "is_active": is_active })),
            ..Default::default()
        },
    );

    Ok(Json(ToggledTest { is_active }))
}

/// `DELETE /api/admin/tests/:id` — hard delete, rejected for tests
/// referenced by request items.
pub async fn delete(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<AuthSession>,
    Path(id): Path<i64>,
) -> Result<Json<OkResponse>, ApiError> {
    let conn = ctx.open_db()?;
    let old = catalog::delete_test(&conn, id)?;

    audit::log_action(
        &conn,
        &audit::AuditEntry {
            user_id: Some(session.user_id),
            action: "delete_catalog_test".into(),
            table_name: Some("test_catalog".into()),
            record_id: Some(id.to_string()),
            old_values: serde_json::to_value(&old).ok(),
            ..Default::default()
        },
    );

    Ok(Json(OkResponse { status: "ok" }))
}
