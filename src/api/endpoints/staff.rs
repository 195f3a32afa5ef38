//! Staff account administration.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthSession};
use crate::auth::hash_password;
use crate::db::repository::{audit, user};
use crate::models::enums::Role;
use crate::models::{NewUser, StaffOverview};

#[derive(Serialize)]
pub struct CreatedStaff {
    pub id: i64,
    pub username: String,
}

/// `POST /api/admin/staff` — create a doctor or lab account.
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<AuthSession>,
    Json(new): Json<NewUser>,
) -> Result<Json<CreatedStaff>, ApiError> {
    if new.role == Role::Admin {
        return Err(ApiError::BadRequest(
            "Staff accounts must be doctor or lab".into(),
        ));
    }
    if new.username.trim().is_empty() || new.full_name.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Username and full name are required".into(),
        ));
    }
    let password_hash =
        hash_password(&new.password).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let conn = ctx.open_db()?;
    let id = user::insert_user(&conn, &new, &password_hash)?;

    audit::log_action(
        &conn,
        &audit::AuditEntry {
            user_id: Some(session.user_id),
            action: "create_staff".into(),
            table_name: Some("users".into()),
            record_id: Some(id.to_string()),
            new_values: Some(serde_json::json!({
                "username": new.username,
                "role": new.role.as_str(),
            })),
            ..Default::default()
        },
    );

    Ok(Json(CreatedStaff {
        id,
        username: new.username,
    }))
}

#[derive(Serialize)]
pub struct StaffListResponse {
    pub staff: Vec<StaffOverview>,
}

/// `GET /api/admin/staff` — doctor/lab accounts with workload counts.
pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<StaffListResponse>, ApiError> {
    let conn = ctx.open_db()?;
    let staff = user::list_staff(&conn)?;
    Ok(Json(StaffListResponse { staff }))
}

#[derive(Deserialize)]
pub struct StaffUpdate {
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
}

#[derive(Serialize)]
pub struct OkResponse {
    pub status: &'static str,
}

/// `PUT /api/admin/staff/:id` — edit contact details.
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<AuthSession>,
    Path(id): Path<i64>,
    Json(update): Json<StaffUpdate>,
) -> Result<Json<OkResponse>, ApiError> {
    let conn = ctx.open_db()?;
    user::update_staff(
        &conn,
        id,
        &update.full_name,
        update.email.as_deref(),
        update.phone.as_deref(),
        update.department.as_deref(),
    )?;

    audit::log_action(
        &conn,
        &audit::AuditEntry {
            user_id: Some(session.user_id),
            action: "update_staff".into(),
            table_name: Some("users".into()),
            record_id: Some(id.to_string()),
            ..Default::default()
        },
    );

    Ok(Json(OkResponse { status: "ok" }))
}

#[derive(Deserialize)]
pub struct ActiveUpdate {
    pub is_active: bool,
}

/// `PUT /api/admin/staff/:id/active` — activate or deactivate an
/// account. Deactivating yourself is rejected.
pub async fn set_active(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<AuthSession>,
    Path(id): Path<i64>,
    Json(update): Json<ActiveUpdate>,
) -> Result<Json<OkResponse>, ApiError> {
    if id == session.user_id && !update.is_active {
        return Err(ApiError::Conflict(
            "You cannot deactivate your own account.".into(),
        ));
    }

    let conn = ctx.open_db()?;
    user::set_active(&conn, id, update.is_active)?;

    audit::log_action(
        &conn,
        &audit::AuditEntry {
            user_id: Some(session.user_id),
            action: if update.is_active {
                "activate_staff".into()
            } else {
                "deactivate_staff".into()
            },
            table_name: Some("users".into()),
            record_id: Some(id.to_string()),
            ..Default::default()
        },
    );

    Ok(Json(OkResponse { status: "ok" }))
}

/// `DELETE /api/admin/staff/:id` — hard delete, rejected for your own
/// account and for staff with requests attached.
pub async fn delete(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<AuthSession>,
    Path(id): Path<i64>,
) -> Result<Json<OkResponse>, ApiError> {
    if id == session.user_id {
        return Err(ApiError::Conflict(
            "You cannot delete your own account.".into(),
        ));
    }

    let conn = ctx.open_db()?;
    let old = user::delete_staff(&conn, id)?;

    audit::log_action(
        &conn,
        &audit::AuditEntry {
            user_id: Some(session.user_id),
            action: "delete_staff".into(),
            table_name: Some("users".into()),
            record_id: Some(id.to_string()),
            old_values: serde_json::to_value(&old).ok(),
            ..Default::default()
        },
    );

    Ok(Json(OkResponse { status: "ok" }))
}
