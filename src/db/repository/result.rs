use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::db::DatabaseError;
use crate::models::enums::{ItemStatus, RequestStatus, ResultStatus};
use crate::models::{NewResult, TestResult};
use crate::workflow;

/// Outcome of a result entry: the stored row id plus where the item's
/// request landed after the rollup.
#[derive(Debug, Clone, Serialize)]
pub struct EnteredResult {
    pub result_id: i64,
    pub request_status: RequestStatus,
}

/// Result row joined with its test for report views.
#[derive(Debug, Clone, Serialize)]
pub struct ResultView {
    pub id: i64,
    pub test_name: String,
    pub test_code: String,
    pub result_value: String,
    pub result_status: ResultStatus,
    pub reference_range: Option<String>,
    pub units: Option<String>,
    pub method: Option<String>,
    pub comments: Option<String>,
    pub performer_name: String,
    pub performed_date: String,
}

/// Record a result for a request item, mark the item Completed, and
/// roll the request status up, all in one transaction.
///
/// An item that already has a result is rejected; results are
/// immutable once entered.
pub fn enter_result(
    conn: &Connection,
    performed_by: i64,
    new: &NewResult,
) -> Result<EnteredResult, DatabaseError> {
    if new.result_value.trim().is_empty() {
        return Err(DatabaseError::Validation("Result value is required".into()));
    }

    let item: Option<(i64, String)> = conn
        .query_row(
            "SELECT request_id, status FROM test_request_items WHERE id = ?1",
            params![new.test_item_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let Some((request_db_id, item_status)) = item else {
        return Err(DatabaseError::NotFound {
            entity_type: "test_request_item".into(),
            id: new.test_item_id.to_string(),
        });
    };
    if ItemStatus::from_str(&item_status)? == ItemStatus::Completed {
        return Err(DatabaseError::BusinessRule(
            "A result has already been entered for this test.".into(),
        ));
    }

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO test_results (test_item_id, result_value, result_status,
            reference_range, units, method, comments, performed_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            new.test_item_id,
            new.result_value,
            new.result_status.as_str(),
            new.reference_range,
            new.units,
            new.method,
            new.comments,
            performed_by,
        ],
    )
    .map_err(|e| {
        DatabaseError::unique_conflict(e, "A result has already been entered for this test.")
    })?;
    let result_id = tx.last_insert_rowid();

    tx.execute(
        "UPDATE test_request_items SET status = 'Completed' WHERE id = ?1",
        params![new.test_item_id],
    )?;
    let request_status = workflow::recompute_request_status(&tx, request_db_id)?;
    tx.commit()?;

    Ok(EnteredResult { result_id, request_status })
}

pub fn get_result(conn: &Connection, id: i64) -> Result<TestResult, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, test_item_id, result_value, result_status, reference_range, units,
                    method, comments, performed_by, performed_date, verified_by, verified_date
             FROM test_results WHERE id = ?1",
            params![id],
            |row| Ok(result_row(row)),
        )
        .optional()?
        .ok_or_else(|| DatabaseError::NotFound {
            entity_type: "test_result".into(),
            id: id.to_string(),
        })?;
    result_from_row(row?)
}

/// All results on a request, for the report/detail views.
pub fn results_for_request(
    conn: &Connection,
    request_db_id: i64,
) -> Result<Vec<ResultView>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT res.id, tc.test_name, tc.test_code, res.result_value, res.result_status,
                res.reference_range, res.units, res.method, res.comments,
                u.full_name, res.performed_date
         FROM test_results res
         JOIN test_request_items tri ON res.test_item_id = tri.id
         JOIN test_catalog tc ON tri.test_id = tc.id
         JOIN users u ON res.performed_by = u.id
         WHERE tri.request_id = ?1
         ORDER BY res.performed_date",
    )?;

    let rows = stmt.query_map(params![request_db_id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, Option<String>>(5)?,
            row.get::<_, Option<String>>(6)?,
            row.get::<_, Option<String>>(7)?,
            row.get::<_, Option<String>>(8)?,
            row.get::<_, String>(9)?,
            row.get::<_, String>(10)?,
        ))
    })?;

    let mut results = Vec::new();
    for row in rows {
        let (
            id,
            test_name,
            test_code,
            result_value,
            result_status,
            reference_range,
            units,
            method,
            comments,
            performer_name,
            performed_date,
        ) = row?;
        results.push(ResultView {
            id,
            test_name,
            test_code,
            result_value,
            result_status: ResultStatus::from_str(&result_status)?,
            reference_range,
            units,
            method,
            comments,
            performer_name,
            performed_date,
        });
    }
    Ok(results)
}

// Internal row type for TestResult mapping
struct ResultRow {
    id: i64,
    test_item_id: i64,
    result_value: String,
    result_status: String,
    reference_range: Option<String>,
    units: Option<String>,
    method: Option<String>,
    comments: Option<String>,
    performed_by: i64,
    performed_date: String,
    verified_by: Option<i64>,
    verified_date: Option<String>,
}

fn result_row(row: &rusqlite::Row<'_>) -> Result<ResultRow, rusqlite::Error> {
    Ok(ResultRow {
        id: row.get(0)?,
        test_item_id: row.get(1)?,
        result_value: row.get(2)?,
        result_status: row.get(3)?,
        reference_range: row.get(4)?,
        units: row.get(5)?,
        method: row.get(6)?,
        comments: row.get(7)?,
        performed_by: row.get(8)?,
        performed_date: row.get(9)?,
        verified_by: row.get(10)?,
        verified_date: row.get(11)?,
    })
}

fn result_from_row(row: ResultRow) -> Result<TestResult, DatabaseError> {
    Ok(TestResult {
        id: row.id,
        test_item_id: row.test_item_id,
        result_value: row.result_value,
        result_status: ResultStatus::from_str(&row.result_status)?,
        reference_range: row.reference_range,
        units: row.units,
        method: row.method,
        comments: row.comments,
        performed_by: row.performed_by,
        performed_date: row.performed_date,
        verified_by: row.verified_by,
        verified_date: row.verified_date,
    })
}
