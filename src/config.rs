use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "limsd";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Idle sessions expire after this many seconds.
pub const SESSION_TIMEOUT_SECS: u64 = 3600;

/// Failed logins per username before the account is locked out.
pub const MAX_LOGIN_ATTEMPTS: u32 = 5;

/// Minimum accepted password length for new accounts.
pub const PASSWORD_MIN_LENGTH: usize = 6;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8081";

/// Get the application data directory: `LIMS_DATA_DIR` if set,
/// otherwise `~/.local/share/limsd` (or the platform equivalent).
pub fn app_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("LIMS_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Database file path: `LIMS_DB_PATH` if set, otherwise `lims.db`
/// inside the data directory.
pub fn database_path() -> PathBuf {
    if let Ok(path) = std::env::var("LIMS_DB_PATH") {
        return PathBuf::from(path);
    }
    app_data_dir().join("lims.db")
}

/// Listen address: `LIMS_BIND_ADDR` if set, otherwise loopback :8081.
pub fn bind_addr() -> String {
    std::env::var("LIMS_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
}

/// Session idle timeout, overridable via `LIMS_SESSION_TIMEOUT_SECS`.
pub fn session_timeout_secs() -> u64 {
    std::env::var("LIMS_SESSION_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(SESSION_TIMEOUT_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_path_under_data_dir_by_default() {
        if std::env::var("LIMS_DB_PATH").is_err() {
            let path = database_path();
            assert!(path.ends_with("lims.db"));
        }
    }

    #[test]
    fn default_bind_addr_is_loopback() {
        if std::env::var("LIMS_BIND_ADDR").is_err() {
            assert_eq!(bind_addr(), "127.0.0.1:8081");
        }
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.3.0");
    }
}
