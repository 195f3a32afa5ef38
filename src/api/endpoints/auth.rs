//! Login and logout.

use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::error::ApiError;
use crate::api::middleware::auth::SESSION_COOKIE;
use crate::api::types::{ApiContext, AuthSession};
use crate::auth::{generate_token, verify_password};
use crate::config::session_timeout_secs;
use crate::db::repository::{audit, user};
use crate::models::enums::Role;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: i64,
    pub username: String,
    pub full_name: String,
    pub role: Role,
    pub expires_in: u64,
}

/// `POST /api/auth/login` — verify credentials and issue a session
/// token. Failed attempts count toward the per-username lockout; a
/// success clears it. The response sets the token both in the body and
/// as an HttpOnly cookie.
pub async fn login(
    State(ctx): State<ApiContext>,
    Json(req): Json<LoginRequest>,
) -> Result<(HeaderMap, Json<LoginResponse>), ApiError> {
    let username = req.username.trim().to_string();
    if username.is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Username and password are required".into(),
        ));
    }

    {
        let lockout = ctx
            .lockout
            .lock()
            .map_err(|_| ApiError::Internal("lockout lock".into()))?;
        if lockout.is_locked(&username) {
            return Err(ApiError::LoginLocked);
        }
    }

    let conn = ctx.open_db()?;
    let verified = user::find_active_by_username(&conn, &username)
        .map_err(ApiError::from)?
        .filter(|(_, hash)| verify_password(&req.password, hash));

    let Some((account, _)) = verified else {
        if let Ok(mut lockout) = ctx.lockout.lock() {
            lockout.record_failure(&username);
        }
        audit::log_action(
            &conn,
            &audit::AuditEntry {
                action: "failed_login".into(),
                new_values: Some(serde_json::json!({ "username": username })),
                ..Default::default()
            },
        );
        // Same response for unknown user and wrong password
        return Err(ApiError::Unauthorized);
    };

    if let Ok(mut lockout) = ctx.lockout.lock() {
        lockout.clear(&username);
    }

    let token = generate_token();
    {
        let mut sessions = ctx
            .sessions
            .lock()
            .map_err(|_| ApiError::Internal("session lock".into()))?;
        sessions.insert(
            &token,
            AuthSession {
                user_id: account.id,
                username: account.username.clone(),
                full_name: account.full_name.clone(),
                role: account.role,
            },
        );
    }

    audit::log_action(
        &conn,
        &audit::AuditEntry {
            user_id: Some(account.id),
            action: "login".into(),
            ..Default::default()
        },
    );
    info!(username = %account.username, role = %account.role.as_str(), "user logged in");

    let expires_in = session_timeout_secs();
    let cookie = format!(
        "{SESSION_COOKIE}={token}; HttpOnly; SameSite=Strict; Path=/; Max-Age={expires_in}"
    );
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        headers.insert(SET_COOKIE, value);
    }

    Ok((
        headers,
        Json(LoginResponse {
            token,
            user_id: account.id,
            username: account.username,
            full_name: account.full_name,
            role: account.role,
            expires_in,
        }),
    ))
}

#[derive(Serialize)]
pub struct LogoutResponse {
    pub status: &'static str,
}

/// `POST /api/auth/logout` — drop the current session.
pub async fn logout(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<AuthSession>,
    headers: HeaderMap,
) -> Result<Json<LogoutResponse>, ApiError> {
    let token = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
        .or_else(|| {
            headers
                .get("Cookie")
                .and_then(|v| v.to_str().ok())
                .and_then(|cookies| {
                    cookies.split(';').find_map(|pair| {
                        let (name, value) = pair.trim().split_once('=')?;
                        (name == SESSION_COOKIE).then(|| value.to_string())
                    })
                })
        })
        .ok_or(ApiError::Unauthorized)?;

    {
        let mut sessions = ctx
            .sessions
            .lock()
            .map_err(|_| ApiError::Internal("session lock".into()))?;
        sessions.remove(&token);
    }

    if let Ok(conn) = ctx.open_db() {
        audit::log_action(
            &conn,
            &audit::AuditEntry {
                user_id: Some(session.user_id),
                action: "logout".into(),
                ..Default::default()
            },
        );
    }

    Ok(Json(LogoutResponse { status: "ok" }))
}
