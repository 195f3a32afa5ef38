use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::db::DatabaseError;
use crate::idgen;
use crate::models::enums::{RequestStatus, SampleStatus, Urgency};
use crate::models::{NewSample, Sample};
use crate::workflow;

/// Sample list row joined with its request and patient.
#[derive(Debug, Clone, Serialize)]
pub struct SampleOverview {
    pub id: i64,
    pub sample_id: String,
    pub sample_type: String,
    pub status: SampleStatus,
    pub condition_on_receipt: String,
    pub storage_location: Option<String>,
    pub storage_temperature: String,
    pub collection_date: String,
    pub request_code: String,
    pub urgency: Urgency,
    pub patient_code: String,
    pub patient_name: String,
    pub receiver_name: Option<String>,
}

/// Register a sample against a request and move the request to
/// Sample Collected, atomically. A request carries at most one sample;
/// a second registration is rejected.
pub fn create_sample(
    conn: &Connection,
    received_by: i64,
    new: &NewSample,
) -> Result<(i64, String), DatabaseError> {
    let exists: i64 = conn.query_row(
        "SELECT COUNT(*) FROM test_requests WHERE id = ?1",
        params![new.request_id],
        |row| row.get(0),
    )?;
    if exists == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "test_request".into(),
            id: new.request_id.to_string(),
        });
    }

    let existing: i64 = conn.query_row(
        "SELECT COUNT(*) FROM samples WHERE request_id = ?1",
        params![new.request_id],
        |row| row.get(0),
    )?;
    if existing > 0 {
        return Err(DatabaseError::BusinessRule(
            "A sample has already been registered for this request.".into(),
        ));
    }

    let sample_code = idgen::generate_sample_code(conn)?;

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO samples (sample_id, request_id, sample_type, volume, collection_date,
            collected_by, condition_on_receipt, storage_location, storage_temperature,
            notes, received_by, received_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, datetime('now'))",
        params![
            sample_code,
            new.request_id,
            new.sample_type,
            new.volume,
            new.collection_date.to_string(),
            new.collected_by,
            new.condition_on_receipt,
            new.storage_location,
            new.storage_temperature,
            new.notes,
            received_by,
        ],
    )
    .map_err(|e| {
        DatabaseError::unique_conflict(e, "A sample has already been registered for this request.")
    })?;
    let sample_db_id = tx.last_insert_rowid();

    workflow::transition_request(&tx, new.request_id, RequestStatus::SampleCollected)?;
    tx.commit()?;

    Ok((sample_db_id, sample_code))
}

const SAMPLE_COLUMNS: &str = "id, sample_id, request_id, sample_type, volume, collection_date,
    collected_by, condition_on_receipt, status, storage_location, storage_temperature,
    notes, received_by, received_date";

pub fn get_by_code(conn: &Connection, sample_code: &str) -> Result<Option<Sample>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {SAMPLE_COLUMNS} FROM samples WHERE sample_id = ?1"),
            params![sample_code],
            |row| Ok(sample_row(row)),
        )
        .optional()?;
    match row {
        Some(raw) => Ok(Some(sample_from_row(raw?)?)),
        None => Ok(None),
    }
}

/// Move a sample through its handling lifecycle, optionally relocating
/// it in storage.
pub fn update_status(
    conn: &Connection,
    sample_code: &str,
    status: SampleStatus,
    storage_location: Option<&str>,
    storage_temperature: Option<&str>,
    notes: Option<&str>,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE samples SET status = ?1,
                storage_location = COALESCE(?2, storage_location),
                storage_temperature = COALESCE(?3, storage_temperature),
                notes = COALESCE(?4, notes),
                updated_at = datetime('now')
         WHERE sample_id = ?5",
        params![status.as_str(), storage_location, storage_temperature, notes, sample_code],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "sample".into(),
            id: sample_code.to_string(),
        });
    }
    Ok(())
}

/// All samples with request/patient context, newest first. An optional
/// search matches sample, request, or patient codes and patient names.
pub fn list_samples(
    conn: &Connection,
    search: Option<&str>,
) -> Result<Vec<SampleOverview>, DatabaseError> {
    let base = "SELECT s.id, s.sample_id, s.sample_type, s.status, s.condition_on_receipt,
                       s.storage_location, s.storage_temperature, s.collection_date,
                       tr.request_id, tr.urgency,
                       p.patient_id, p.first_name || ' ' || p.last_name,
                       u.full_name
                FROM samples s
                JOIN test_requests tr ON s.request_id = tr.id
                JOIN patients p ON tr.patient_id = p.id
                LEFT JOIN users u ON s.received_by = u.id";

    let mut stmt;
    let rows = match search.map(str::trim).filter(|s| !s.is_empty()) {
        Some(term) => {
            let pattern = format!("%{term}%");
            stmt = conn.prepare(&format!(
                "{base} WHERE s.sample_id LIKE ?1 OR tr.request_id LIKE ?1
                    OR p.patient_id LIKE ?1 OR p.first_name LIKE ?1 OR p.last_name LIKE ?1
                 ORDER BY s.created_at DESC"
            ))?;
            stmt.query_map(params![pattern], overview_row)?
        }
        None => {
            stmt = conn.prepare(&format!("{base} ORDER BY s.created_at DESC"))?;
            stmt.query_map([], overview_row)?
        }
    };

    let mut samples = Vec::new();
    for row in rows {
        let (
            id,
            sample_id,
            sample_type,
            status,
            condition_on_receipt,
            storage_location,
            storage_temperature,
            collection_date,
            request_code,
            urgency,
            patient_code,
            patient_name,
            receiver_name,
        ) = row?;
        samples.push(SampleOverview {
            id,
            sample_id,
            sample_type,
            status: SampleStatus::from_str(&status)?,
            condition_on_receipt,
            storage_location,
            storage_temperature,
            collection_date,
            request_code,
            urgency: Urgency::from_str(&urgency)?,
            patient_code,
            patient_name,
            receiver_name,
        });
    }
    Ok(samples)
}

type OverviewRow = (
    i64,
    String,
    String,
    String,
    String,
    Option<String>,
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
);

fn overview_row(row: &rusqlite::Row<'_>) -> Result<OverviewRow, rusqlite::Error> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
        row.get(12)?,
    ))
}

// Internal row type for Sample mapping
struct SampleRow {
    id: i64,
    sample_id: String,
    request_id: i64,
    sample_type: String,
    volume: Option<String>,
    collection_date: String,
    collected_by: Option<String>,
    condition_on_receipt: String,
    status: String,
    storage_location: Option<String>,
    storage_temperature: String,
    notes: Option<String>,
    received_by: Option<i64>,
    received_date: Option<String>,
}

fn sample_row(row: &rusqlite::Row<'_>) -> Result<SampleRow, rusqlite::Error> {
    Ok(SampleRow {
        id: row.get(0)?,
        sample_id: row.get(1)?,
        request_id: row.get(2)?,
        sample_type: row.get(3)?,
        volume: row.get(4)?,
        collection_date: row.get(5)?,
        collected_by: row.get(6)?,
        condition_on_receipt: row.get(7)?,
        status: row.get(8)?,
        storage_location: row.get(9)?,
        storage_temperature: row.get(10)?,
        notes: row.get(11)?,
        received_by: row.get(12)?,
        received_date: row.get(13)?,
    })
}

fn sample_from_row(row: SampleRow) -> Result<Sample, DatabaseError> {
    Ok(Sample {
        id: row.id,
        sample_id: row.sample_id,
        request_id: row.request_id,
        sample_type: row.sample_type,
        volume: row.volume,
        collection_date: NaiveDate::parse_from_str(&row.collection_date, "%Y-%m-%d")
            .map_err(|_| DatabaseError::Validation("invalid collection_date".into()))?,
        collected_by: row.collected_by,
        condition_on_receipt: row.condition_on_receipt,
        status: SampleStatus::from_str(&row.status)?,
        storage_location: row.storage_location,
        storage_temperature: row.storage_temperature,
        notes: row.notes,
        received_by: row.received_by,
        received_date: row.received_date,
    })
}
