//! Access logging middleware.
//!
//! Logs every API request with method, path, response status and, when
//! the auth middleware has run, the acting username. Runs innermost.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use tracing::info;

use crate::api::types::AuthSession;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let username = req
        .extensions()
        .get::<AuthSession>()
        .map(|s| s.username.clone());

    let response = next.run(req).await;

    info!(
        %method,
        %path,
        status = response.status().as_u16(),
        user = username.as_deref().unwrap_or("-"),
        "api access"
    );
    response
}
