//! HTTP API layer.
//!
//! Exposes the registry, workflow, and administration operations as
//! JSON endpoints. Routes are nested under `/api/` and grouped by
//! role; session auth and role guards run as middleware.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod types;

pub use router::api_router;
pub use types::ApiContext;
