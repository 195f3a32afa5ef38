use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use limsd::api::{api_router, ApiContext};
use limsd::config;
use limsd::db::{open_database, repository::user};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let db_path = config::database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    info!(path = %db_path.display(), "opening database");
    let conn = open_database(&db_path)?;
    bootstrap_admin(&conn)?;
    drop(conn);

    let ctx = ApiContext::new(
        db_path,
        Duration::from_secs(config::session_timeout_secs()),
    );
    let app = api_router(ctx);

    let addr = config::bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, version = config::APP_VERSION, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Create the initial admin account on an empty user table, taking the
/// password from `LIMS_ADMIN_PASSWORD` or generating one.
fn bootstrap_admin(conn: &rusqlite::Connection) -> Result<(), Box<dyn std::error::Error>> {
    let configured = std::env::var("LIMS_ADMIN_PASSWORD").ok();
    let Some(created) = user::bootstrap_admin(conn, configured.as_deref())? else {
        return Ok(());
    };

    match created.generated_password {
        Some(password) => warn!(
            username = %created.username,
            %password,
            "LIMS_ADMIN_PASSWORD unset; generated an initial admin password, change it after first login"
        ),
        None => info!(username = %created.username, "bootstrapped initial admin account"),
    }
    Ok(())
}
