pub mod repository;
pub mod sqlite;

pub use repository::*;
pub use sqlite::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("{0}")]
    BusinessRule(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Could not generate a unique {0} id")]
    IdExhausted(&'static str),
}

impl DatabaseError {
    /// Fold a UNIQUE constraint failure into a business-rule conflict
    /// so a writer racing past the pre-check reports the same error as
    /// the pre-checked path. Other failures stay storage errors.
    pub fn unique_conflict(err: rusqlite::Error, message: &str) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                DatabaseError::BusinessRule(message.into())
            }
            _ => DatabaseError::Sqlite(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_maps_to_business_rule() {
        let conn = open_memory_database().unwrap();
        conn.execute(
            "INSERT INTO users (username, password_hash, full_name, role)
             VALUES ('doc', 'x', 'Dr Demo', 'doctor')",
            [],
        )
        .unwrap();
        let err = conn
            .execute(
                "INSERT INTO users (username, password_hash, full_name, role)
                 VALUES ('doc', 'x', 'Dr Other', 'doctor')",
                [],
            )
            .unwrap_err();

        let mapped = DatabaseError::unique_conflict(err, "Username already exists.");
        assert!(matches!(mapped, DatabaseError::BusinessRule(m) if m == "Username already exists."));
    }

    #[test]
    fn other_failures_stay_storage_errors() {
        let conn = open_memory_database().unwrap();
        // Foreign key violation, not a UNIQUE conflict
        let err = conn
            .execute(
                "INSERT INTO samples (sample_id, request_id, sample_type, collection_date)
                 VALUES ('S202501010001', 999, 'Whole Blood', '2025-01-01')",
                [],
            )
            .unwrap_err();

        let mapped = DatabaseError::unique_conflict(err, "unused");
        assert!(matches!(mapped, DatabaseError::Sqlite(_)));
    }
}
