//! Shared types for the HTTP API layer.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rusqlite::Connection;

use crate::api::error::ApiError;
use crate::auth::hash_token;
use crate::config::MAX_LOGIN_ATTEMPTS;
use crate::db::open_database;
use crate::models::enums::Role;

/// Failed-login lockout window (15 minutes).
const LOCKOUT_WINDOW_SECS: u64 = 900;

// ═══════════════════════════════════════════════════════════
// API context — shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub db_path: Arc<PathBuf>,
    pub sessions: Arc<Mutex<SessionStore>>,
    pub lockout: Arc<Mutex<LoginLockout>>,
}

impl ApiContext {
    pub fn new(db_path: PathBuf, session_timeout: Duration) -> Self {
        Self {
            db_path: Arc::new(db_path),
            sessions: Arc::new(Mutex::new(SessionStore::new(session_timeout))),
            lockout: Arc::new(Mutex::new(LoginLockout::new())),
        }
    }

    /// Open a fresh database connection for this request.
    pub fn open_db(&self) -> Result<Connection, ApiError> {
        open_database(self.db_path.as_ref()).map_err(ApiError::from)
    }
}

// ═══════════════════════════════════════════════════════════
// Authenticated session — injected by auth middleware
// ═══════════════════════════════════════════════════════════

/// Authenticated user context, injected into request extensions by the
/// auth middleware after token validation.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: i64,
    pub username: String,
    pub full_name: String,
    pub role: Role,
}

// ═══════════════════════════════════════════════════════════
// Session store — hashed tokens with idle timeout
// ═══════════════════════════════════════════════════════════

/// Outcome of a session lookup.
pub enum SessionCheck {
    Valid(AuthSession),
    Expired,
    Missing,
}

struct SessionEntry {
    session: AuthSession,
    last_activity: Instant,
}

/// In-memory session store keyed by SHA-256 token hash. Sessions idle
/// past the timeout expire; activity refreshes the clock.
pub struct SessionStore {
    entries: HashMap<[u8; 32], SessionEntry>,
    timeout: Duration,
}

impl SessionStore {
    pub fn new(timeout: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            timeout,
        }
    }

    pub fn insert(&mut self, token: &str, session: AuthSession) {
        self.entries.insert(
            hash_token(token),
            SessionEntry {
                session,
                last_activity: Instant::now(),
            },
        );
    }

    /// Validate a raw token. A hit refreshes the idle clock; an expired
    /// entry is removed and reported distinctly from an unknown token.
    pub fn validate(&mut self, token: &str) -> SessionCheck {
        let hash = hash_token(token);
        let Some(entry) = self.entries.get_mut(&hash) else {
            return SessionCheck::Missing;
        };
        if entry.last_activity.elapsed() > self.timeout {
            self.entries.remove(&hash);
            return SessionCheck::Expired;
        }
        entry.last_activity = Instant::now();
        SessionCheck::Valid(entry.session.clone())
    }

    pub fn remove(&mut self, token: &str) -> bool {
        self.entries.remove(&hash_token(token)).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════
// Login lockout — per-username failure counting
// ═══════════════════════════════════════════════════════════

/// Tracks consecutive failed logins per username. After
/// [`MAX_LOGIN_ATTEMPTS`] failures the name is locked for the window.
pub struct LoginLockout {
    failures: HashMap<String, (u32, Instant)>,
}

impl LoginLockout {
    pub fn new() -> Self {
        Self {
            failures: HashMap::new(),
        }
    }

    pub fn is_locked(&self, username: &str) -> bool {
        match self.failures.get(username) {
            Some((count, since)) => {
                *count >= MAX_LOGIN_ATTEMPTS
                    && since.elapsed() < Duration::from_secs(LOCKOUT_WINDOW_SECS)
            }
            None => false,
        }
    }

    pub fn record_failure(&mut self, username: &str) {
        let entry = self
            .failures
            .entry(username.to_string())
            .or_insert((0, Instant::now()));
        // Stale windows restart the count
        if entry.1.elapsed() >= Duration::from_secs(LOCKOUT_WINDOW_SECS) {
            *entry = (0, Instant::now());
        }
        entry.0 += 1;
        entry.1 = Instant::now();
    }

    pub fn clear(&mut self, username: &str) {
        self.failures.remove(username);
    }
}

impl Default for LoginLockout {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> AuthSession {
        AuthSession {
            user_id: 1,
            username: "drjones".into(),
            full_name: "Dr Jones".into(),
            role: Role::Doctor,
        }
    }

    #[test]
    fn session_round_trip() {
        let mut store = SessionStore::new(Duration::from_secs(60));
        store.insert("tok-1", session());
        match store.validate("tok-1") {
            SessionCheck::Valid(s) => assert_eq!(s.username, "drjones"),
            _ => panic!("expected valid session"),
        }
    }

    #[test]
    fn unknown_token_is_missing() {
        let mut store = SessionStore::new(Duration::from_secs(60));
        assert!(matches!(store.validate("nope"), SessionCheck::Missing));
    }

    #[test]
    fn idle_session_expires_once() {
        let mut store = SessionStore::new(Duration::from_secs(0));
        store.insert("tok-1", session());
        std::thread::sleep(Duration::from_millis(5));
        assert!(matches!(store.validate("tok-1"), SessionCheck::Expired));
        // Entry was removed, so a second check reports it as unknown
        assert!(matches!(store.validate("tok-1"), SessionCheck::Missing));
    }

    #[test]
    fn logout_removes_session() {
        let mut store = SessionStore::new(Duration::from_secs(60));
        store.insert("tok-1", session());
        assert!(store.remove("tok-1"));
        assert!(!store.remove("tok-1"));
        assert!(store.is_empty());
    }

    #[test]
    fn lockout_after_max_failures() {
        let mut lockout = LoginLockout::new();
        assert!(!lockout.is_locked("drjones"));
        for _ in 0..MAX_LOGIN_ATTEMPTS {
            lockout.record_failure("drjones");
        }
        assert!(lockout.is_locked("drjones"));
        // Other usernames unaffected
        assert!(!lockout.is_locked("tech1"));
    }

    #[test]
    fn successful_login_clears_failures() {
        let mut lockout = LoginLockout::new();
        for _ in 0..MAX_LOGIN_ATTEMPTS {
            lockout.record_failure("drjones");
        }
        lockout.clear("drjones");
        assert!(!lockout.is_locked("drjones"));
    }
}
