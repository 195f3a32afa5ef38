//! Test-request lifecycle state machine.
//!
//! A request moves Pending → Sample Collected → In Progress → Completed,
//! with Cancelled reachable from any non-terminal state. All status
//! writes go through [`transition_request`] so no caller can set an
//! arbitrary status string, and completion is derived from child item
//! counts by [`recompute_request_status`], which is idempotent and keyed
//! by request id.

use std::str::FromStr;

use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::enums::RequestStatus;

/// Whether a request may move from `from` to `to`.
pub fn can_transition(from: RequestStatus, to: RequestStatus) -> bool {
    use RequestStatus::*;
    match (from, to) {
        (Pending, SampleCollected) | (Pending, InProgress) => true,
        (SampleCollected, InProgress) => true,
        (InProgress, Completed) => true,
        // Cancellation from any non-terminal state
        (Pending | SampleCollected | InProgress, Cancelled) => true,
        _ => false,
    }
}

/// Move a request to `new_status`, enforcing the transition table.
///
/// Returns the previous status on success so callers can audit the
/// change. Setting the current status again is a no-op, not an error.
pub fn transition_request(
    conn: &Connection,
    request_db_id: i64,
    new_status: RequestStatus,
) -> Result<RequestStatus, DatabaseError> {
    let current = current_status(conn, request_db_id)?;

    if current == new_status {
        return Ok(current);
    }
    if !can_transition(current, new_status) {
        return Err(DatabaseError::BusinessRule(format!(
            "Cannot move request from '{}' to '{}'",
            current.as_str(),
            new_status.as_str()
        )));
    }

    conn.execute(
        "UPDATE test_requests SET status = ?1, updated_at = datetime('now') WHERE id = ?2",
        params![new_status.as_str(), request_db_id],
    )?;
    Ok(current)
}

/// Recompute a request's status from its child item counts.
///
/// All items completed (and at least one item) ⇒ Completed; any item
/// completed ⇒ In Progress; otherwise the stored status stands.
/// Cancelled and already-Completed requests are never touched, so the
/// rollup is safe to call any number of times.
pub fn recompute_request_status(
    conn: &Connection,
    request_db_id: i64,
) -> Result<RequestStatus, DatabaseError> {
    let current = current_status(conn, request_db_id)?;
    if matches!(current, RequestStatus::Cancelled | RequestStatus::Completed) {
        return Ok(current);
    }

    let (total, completed): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(CASE WHEN status = 'Completed' THEN 1 ELSE 0 END), 0)
         FROM test_request_items WHERE request_id = ?1",
        params![request_db_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let derived = if total > 0 && completed == total {
        RequestStatus::Completed
    } else if completed > 0 {
        RequestStatus::InProgress
    } else {
        return Ok(current);
    };

    if derived != current {
        conn.execute(
            "UPDATE test_requests SET status = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![derived.as_str(), request_db_id],
        )?;
    }
    Ok(derived)
}

fn current_status(conn: &Connection, request_db_id: i64) -> Result<RequestStatus, DatabaseError> {
    let raw: String = conn
        .query_row(
            "SELECT status FROM test_requests WHERE id = ?1",
            params![request_db_id],
            |row| row.get(0),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => DatabaseError::NotFound {
                entity_type: "test_request".into(),
                id: request_db_id.to_string(),
            },
            other => DatabaseError::Sqlite(other),
        })?;
    RequestStatus::from_str(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;

    fn seed_request(conn: &Connection, items: usize) -> i64 {
        conn.execute(
            "INSERT INTO users (username, password_hash, full_name, role)
             VALUES ('doc', 'x', 'Dr Demo', 'doctor')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO patients (patient_id, first_name, last_name, date_of_birth, gender, created_by)
             VALUES ('PT2025000123', 'Jane', 'Doe', '1985-03-04', 'Female', 1)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO test_catalog (test_code, test_name, category, price)
             VALUES ('CBC', 'Complete Blood Count', 'Hematology', 10.0)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO test_requests (request_id, patient_id, doctor_id)
             VALUES ('R202501230042', 1, 1)",
            [],
        )
        .unwrap();
        let request_id = conn.last_insert_rowid();
        for _ in 0..items {
            conn.execute(
                "INSERT INTO test_request_items (request_id, test_id) VALUES (?1, 1)",
                params![request_id],
            )
            .unwrap();
        }
        request_id
    }

    fn complete_item(conn: &Connection, item_id: i64) {
        conn.execute(
            "UPDATE test_request_items SET status = 'Completed' WHERE id = ?1",
            params![item_id],
        )
        .unwrap();
    }

    #[test]
    fn transition_table() {
        use RequestStatus::*;
        assert!(can_transition(Pending, SampleCollected));
        assert!(can_transition(SampleCollected, InProgress));
        assert!(can_transition(InProgress, Completed));
        assert!(can_transition(Pending, Cancelled));
        assert!(can_transition(InProgress, Cancelled));
        assert!(!can_transition(Completed, Cancelled));
        assert!(!can_transition(Cancelled, Pending));
        assert!(!can_transition(Completed, Pending));
        assert!(!can_transition(SampleCollected, Pending));
    }

    #[test]
    fn invalid_transition_rejected() {
        let conn = open_memory_database().unwrap();
        let id = seed_request(&conn, 1);
        let err = transition_request(&conn, id, RequestStatus::Completed).unwrap_err();
        assert!(matches!(err, DatabaseError::BusinessRule(_)));
    }

    #[test]
    fn valid_transition_returns_previous_status() {
        let conn = open_memory_database().unwrap();
        let id = seed_request(&conn, 1);
        let prev = transition_request(&conn, id, RequestStatus::SampleCollected).unwrap();
        assert_eq!(prev, RequestStatus::Pending);
    }

    #[test]
    fn same_status_is_noop() {
        let conn = open_memory_database().unwrap();
        let id = seed_request(&conn, 1);
        let prev = transition_request(&conn, id, RequestStatus::Pending).unwrap();
        assert_eq!(prev, RequestStatus::Pending);
    }

    #[test]
    fn rollup_partial_sets_in_progress() {
        let conn = open_memory_database().unwrap();
        let id = seed_request(&conn, 2);
        complete_item(&conn, 1);
        let status = recompute_request_status(&conn, id).unwrap();
        assert_eq!(status, RequestStatus::InProgress);
    }

    #[test]
    fn rollup_all_items_sets_completed() {
        let conn = open_memory_database().unwrap();
        let id = seed_request(&conn, 2);
        complete_item(&conn, 1);
        complete_item(&conn, 2);
        let status = recompute_request_status(&conn, id).unwrap();
        assert_eq!(status, RequestStatus::Completed);
    }

    #[test]
    fn rollup_is_idempotent() {
        let conn = open_memory_database().unwrap();
        let id = seed_request(&conn, 1);
        complete_item(&conn, 1);
        assert_eq!(recompute_request_status(&conn, id).unwrap(), RequestStatus::Completed);
        assert_eq!(recompute_request_status(&conn, id).unwrap(), RequestStatus::Completed);
    }

    #[test]
    fn rollup_never_resurrects_cancelled_request() {
        let conn = open_memory_database().unwrap();
        let id = seed_request(&conn, 1);
        transition_request(&conn, id, RequestStatus::Cancelled).unwrap();
        complete_item(&conn, 1);
        assert_eq!(recompute_request_status(&conn, id).unwrap(), RequestStatus::Cancelled);
    }

    #[test]
    fn rollup_with_no_items_keeps_pending() {
        let conn = open_memory_database().unwrap();
        let id = seed_request(&conn, 0);
        assert_eq!(recompute_request_status(&conn, id).unwrap(), RequestStatus::Pending);
    }

    #[test]
    fn missing_request_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = recompute_request_status(&conn, 999).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }
}
