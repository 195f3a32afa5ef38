//! Session token authentication middleware.
//!
//! Extracts the session token from `Authorization: Bearer <token>` or
//! the `lims_session` cookie, validates it against the session store,
//! and injects [`AuthSession`] into request extensions. Role guards
//! run after it and check the injected session.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthSession, SessionCheck};
use crate::models::enums::Role;

pub const SESSION_COOKIE: &str = "lims_session";

/// Require a valid session on any role.
pub async fn require_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_auth_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_auth_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let token = extract_token(&req).ok_or(ApiError::Unauthorized)?;

    let session = {
        let mut sessions = ctx
            .sessions
            .lock()
            .map_err(|_| ApiError::Internal("session lock".into()))?;
        match sessions.validate(&token) {
            SessionCheck::Valid(session) => session,
            SessionCheck::Expired => return Err(ApiError::SessionExpired),
            SessionCheck::Missing => return Err(ApiError::Unauthorized),
        }
    }; // MutexGuard dropped before any .await

    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}

/// Require the session injected by [`require_auth`] to be an admin.
pub async fn require_admin(req: Request<axum::body::Body>, next: Next) -> Response {
    require_role(req, next, Role::Admin).await
}

pub async fn require_doctor(req: Request<axum::body::Body>, next: Next) -> Response {
    require_role(req, next, Role::Doctor).await
}

pub async fn require_lab(req: Request<axum::body::Body>, next: Next) -> Response {
    require_role(req, next, Role::Lab).await
}

async fn require_role(req: Request<axum::body::Body>, next: Next, role: Role) -> Response {
    match req.extensions().get::<AuthSession>() {
        Some(session) if session.role == role => next.run(req).await,
        Some(_) => ApiError::Forbidden.into_response(),
        None => ApiError::Unauthorized.into_response(),
    }
}

/// Bearer header takes precedence over the session cookie.
fn extract_token(req: &Request<axum::body::Body>) -> Option<String> {
    if let Some(bearer) = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(bearer.to_string());
    }

    let cookies = req.headers().get("Cookie").and_then(|v| v.to_str().ok())?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with_headers(headers: &[(&str, &str)]) -> Request<Body> {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn bearer_token_extracted() {
        let req = request_with_headers(&[("Authorization", "Bearer abc123")]);
        assert_eq!(extract_token(&req).as_deref(), Some("abc123"));
    }

    #[test]
    fn cookie_token_extracted() {
        let req = request_with_headers(&[("Cookie", "theme=dark; lims_session=xyz789")]);
        assert_eq!(extract_token(&req).as_deref(), Some("xyz789"));
    }

    #[test]
    fn bearer_wins_over_cookie() {
        let req = request_with_headers(&[
            ("Authorization", "Bearer from-header"),
            ("Cookie", "lims_session=from-cookie"),
        ]);
        assert_eq!(extract_token(&req).as_deref(), Some("from-header"));
    }

    #[test]
    fn no_credentials_yields_none() {
        let req = request_with_headers(&[("Cookie", "theme=dark")]);
        assert!(extract_token(&req).is_none());
    }
}
