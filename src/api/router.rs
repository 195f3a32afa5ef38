//! HTTP API router.
//!
//! Routes are nested under `/api/` and grouped by role: `/auth` and
//! `/health` are public, `/doctor`, `/lab` and `/admin` each sit
//! behind the session middleware plus a role guard.
//!
//! Middleware uses `Extension<ApiContext>` (injected as the outermost
//! layer). Endpoint handlers use `State<ApiContext>`.

use axum::routing::{get, post, put};
use axum::Router;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;

pub fn api_router(ctx: ApiContext) -> Router {
    // Public routes: liveness and login
    let public = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/auth/login", post(endpoints::auth::login))
        .with_state(ctx.clone());

    // Any authenticated role
    let authed = Router::new()
        .route("/auth/logout", post(endpoints::auth::logout))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth));

    let doctor = Router::new()
        .route(
            "/patients",
            post(endpoints::patients::register).get(endpoints::patients::list),
        )
        .route("/patients/recent", get(endpoints::patients::recent))
        .route("/patients/:code", get(endpoints::patients::lookup))
        .route(
            "/requests",
            post(endpoints::requests::create).get(endpoints::requests::list_mine),
        )
        .route("/requests/:id", get(endpoints::requests::detail))
        .route("/tests", get(endpoints::requests::orderable_tests))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_doctor))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth));

    let lab = Router::new()
        .route("/dashboard", get(endpoints::reports::lab_dashboard))
        .route("/requests", get(endpoints::requests::queue))
        .route(
            "/requests/pending-sample",
            get(endpoints::samples::pending_requests),
        )
        .route(
            "/requests/:id/status",
            put(endpoints::requests::update_status),
        )
        .route(
            "/samples",
            post(endpoints::samples::create).get(endpoints::samples::list),
        )
        .route("/samples/:code", get(endpoints::samples::get))
        .route(
            "/samples/:code/status",
            put(endpoints::samples::update_status),
        )
        .route("/items/pending", get(endpoints::results::pending_items))
        .route("/items/:id", get(endpoints::results::item_detail))
        .route("/results", post(endpoints::results::enter))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_lab))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth));

    let admin = Router::new()
        .route("/dashboard", get(endpoints::reports::admin_dashboard))
        .route(
            "/staff",
            post(endpoints::staff::create).get(endpoints::staff::list),
        )
        .route(
            "/staff/:id",
            put(endpoints::staff::update).delete(endpoints::staff::delete),
        )
        .route("/staff/:id/active", put(endpoints::staff::set_active))
        .route("/patients", get(endpoints::patients::list))
        .route(
            "/patients/:id",
            put(endpoints::patients::update).delete(endpoints::patients::delete),
        )
        .route(
            "/tests",
            post(endpoints::catalog::create).get(endpoints::catalog::list),
        )
        .route(
            "/tests/:id",
            put(endpoints::catalog::update).delete(endpoints::catalog::delete),
        )
        .route("/tests/:id/toggle", post(endpoints::catalog::toggle))
        .route("/reports/system", get(endpoints::reports::system_report))
        .route("/audit", get(endpoints::reports::audit_trail))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_admin))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth));

    // Extension must be outermost so middleware can extract ApiContext
    Router::new()
        .nest("/api", public)
        .nest("/api", authed)
        .nest("/api/doctor", doctor)
        .nest("/api/lab", lab)
        .nest("/api/admin", admin)
        .layer(axum::Extension(ctx))
}
