//! Result entry endpoints for lab staff.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthSession};
use crate::db::repository::{audit, request, result};
use crate::models::NewResult;

#[derive(Serialize)]
pub struct PendingItemsResponse {
    pub items: Vec<request::PendingItemView>,
}

/// `GET /api/lab/items/pending` — items awaiting a result, most urgent
/// first.
pub async fn pending_items(
    State(ctx): State<ApiContext>,
) -> Result<Json<PendingItemsResponse>, ApiError> {
    let conn = ctx.open_db()?;
    let items = request::pending_items(&conn)?;
    Ok(Json(PendingItemsResponse { items }))
}

/// `GET /api/lab/items/:id` — the result-entry form detail for one
/// item. Items that already have a result are not served.
pub async fn item_detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<i64>,
) -> Result<Json<request::ItemDetailView>, ApiError> {
    let conn = ctx.open_db()?;
    let detail = request::get_item_detail(&conn, id)?
        .ok_or_else(|| ApiError::NotFound(format!("No pending test item with id {id}")))?;
    Ok(Json(detail))
}

/// `POST /api/lab/results` — record a result. Marks the item Completed
/// and rolls the request status up. Resubmission is rejected.
pub async fn enter(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<AuthSession>,
    Json(new): Json<NewResult>,
) -> Result<Json<result::EnteredResult>, ApiError> {
    let conn = ctx.open_db()?;
    let entered = result::enter_result(&conn, session.user_id, &new)?;

    audit::log_action(
        &conn,
        &audit::AuditEntry {
            user_id: Some(session.user_id),
            action: "enter_result".into(),
            table_name: Some("test_results".into()),
            record_id: Some(entered.result_id.to_string()),
            new_values: Some(serde_json::json!({
                "test_item_id": new.test_item_id,
                "result_status": new.result_status.as_str(),
            })),
            ..Default::default()
        },
    );

    Ok(Json(entered))
}
