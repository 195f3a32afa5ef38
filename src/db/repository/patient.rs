use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;
use crate::idgen;
use crate::models::{NewPatient, Patient, PatientUpdate};

const PATIENT_COLUMNS: &str = "id, patient_id, first_name, last_name, date_of_birth, gender,
    phone, email, address, emergency_contact, emergency_phone, medical_history, allergies,
    created_by, created_at";

/// Register a patient. Returns the database id and the generated
/// human-readable patient code.
pub fn insert_patient(
    conn: &Connection,
    patient: &NewPatient,
    created_by: i64,
) -> Result<(i64, String), DatabaseError> {
    let code = idgen::generate_patient_code(conn)?;
    conn.execute(
        "INSERT INTO patients (patient_id, first_name, last_name, date_of_birth, gender,
            phone, email, address, emergency_contact, emergency_phone,
            medical_history, allergies, created_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            code,
            patient.first_name,
            patient.last_name,
            patient.date_of_birth.to_string(),
            patient.gender,
            patient.phone,
            patient.email,
            patient.address,
            patient.emergency_contact,
            patient.emergency_phone,
            patient.medical_history,
            patient.allergies,
            created_by,
        ],
    )?;
    Ok((conn.last_insert_rowid(), code))
}

/// Look up by the human-readable code (the doctor-facing identifier).
pub fn get_by_code(conn: &Connection, code: &str) -> Result<Option<Patient>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE patient_id = ?1"),
            params![code],
            |row| Ok(patient_row(row)),
        )
        .optional()?;
    row.map(|r| patient_from_row(r?)).transpose()
}

pub fn get_by_id(conn: &Connection, id: i64) -> Result<Patient, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1"),
            params![id],
            |row| Ok(patient_row(row)),
        )
        .optional()?
        .ok_or_else(|| DatabaseError::NotFound {
            entity_type: "patient".into(),
            id: id.to_string(),
        })?;
    patient_from_row(row?)
}

/// Paginated list for the admin management view, with an optional
/// name/code search term. Returns (page rows, total match count).
pub fn list_patients(
    conn: &Connection,
    search: Option<&str>,
    page: u32,
    per_page: u32,
) -> Result<(Vec<Patient>, i64), DatabaseError> {
    let pattern = search.map(|s| format!("%{s}%"));
    let (where_clause, total): (&str, i64) = match &pattern {
        Some(p) => (
            "WHERE first_name LIKE ?1 OR last_name LIKE ?1 OR patient_id LIKE ?1",
            conn.query_row(
                "SELECT COUNT(*) FROM patients
                 WHERE first_name LIKE ?1 OR last_name LIKE ?1 OR patient_id LIKE ?1",
                params![p],
                |row| row.get(0),
            )?,
        ),
        None => (
            "",
            conn.query_row("SELECT COUNT(*) FROM patients", [], |row| row.get(0))?,
        ),
    };

    let offset = i64::from(page.saturating_sub(1)) * i64::from(per_page);
    let sql = format!(
        "SELECT {PATIENT_COLUMNS} FROM patients {where_clause}
         ORDER BY created_at DESC LIMIT {per_page} OFFSET {offset}"
    );

    let mut stmt = conn.prepare(&sql)?;
    let mut patients = Vec::new();
    match &pattern {
        Some(p) => {
            let rows = stmt.query_map(params![p], |row| Ok(patient_row(row)))?;
            for row in rows {
                patients.push(patient_from_row(row??)?);
            }
        }
        None => {
            let rows = stmt.query_map([], |row| Ok(patient_row(row)))?;
            for row in rows {
                patients.push(patient_from_row(row??)?);
            }
        }
    }
    Ok((patients, total))
}

/// Recent patients registered by a doctor, newest first.
pub fn recent_by_doctor(
    conn: &Connection,
    doctor_id: i64,
    limit: u32,
) -> Result<Vec<Patient>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PATIENT_COLUMNS} FROM patients WHERE created_by = ?1
         ORDER BY created_at DESC LIMIT ?2"
    ))?;
    let rows = stmt.query_map(params![doctor_id, limit], |row| Ok(patient_row(row)))?;

    let mut patients = Vec::new();
    for row in rows {
        patients.push(patient_from_row(row??)?);
    }
    Ok(patients)
}

pub fn update_patient(
    conn: &Connection,
    id: i64,
    update: &PatientUpdate,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE patients SET first_name = ?1, last_name = ?2, date_of_birth = ?3, gender = ?4,
                email = ?5, phone = ?6, address = ?7, updated_at = datetime('now')
         WHERE id = ?8",
        params![
            update.first_name,
            update.last_name,
            update.date_of_birth.to_string(),
            update.gender,
            update.email,
            update.phone,
            update.address,
            id,
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "patient".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Delete a patient. Rejected while any test request references them.
/// Returns the deleted row for the audit trail.
pub fn delete_patient(conn: &Connection, id: i64) -> Result<Patient, DatabaseError> {
    let referenced: i64 = conn.query_row(
        "SELECT COUNT(*) FROM test_requests WHERE patient_id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    if referenced > 0 {
        return Err(DatabaseError::BusinessRule(
            "Cannot delete patient with existing test requests.".into(),
        ));
    }

    let old = get_by_id(conn, id)?;
    conn.execute("DELETE FROM patients WHERE id = ?1", params![id])?;
    Ok(old)
}

// Internal row type for Patient mapping
struct PatientRow {
    id: i64,
    patient_id: String,
    first_name: String,
    last_name: String,
    date_of_birth: String,
    gender: String,
    phone: Option<String>,
    email: Option<String>,
    address: Option<String>,
    emergency_contact: Option<String>,
    emergency_phone: Option<String>,
    medical_history: Option<String>,
    allergies: Option<String>,
    created_by: i64,
    created_at: String,
}

fn patient_row(row: &rusqlite::Row<'_>) -> Result<PatientRow, rusqlite::Error> {
    Ok(PatientRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        date_of_birth: row.get(4)?,
        gender: row.get(5)?,
        phone: row.get(6)?,
        email: row.get(7)?,
        address: row.get(8)?,
        emergency_contact: row.get(9)?,
        emergency_phone: row.get(10)?,
        medical_history: row.get(11)?,
        allergies: row.get(12)?,
        created_by: row.get(13)?,
        created_at: row.get(14)?,
    })
}

fn patient_from_row(row: PatientRow) -> Result<Patient, DatabaseError> {
    Ok(Patient {
        id: row.id,
        patient_id: row.patient_id,
        first_name: row.first_name,
        last_name: row.last_name,
        date_of_birth: NaiveDate::parse_from_str(&row.date_of_birth, "%Y-%m-%d")
            .map_err(|_| DatabaseError::Validation("invalid date_of_birth".into()))?,
        gender: row.gender,
        phone: row.phone,
        email: row.email,
        address: row.address,
        emergency_contact: row.emergency_contact,
        emergency_phone: row.emergency_phone,
        medical_history: row.medical_history,
        allergies: row.allergies,
        created_by: row.created_by,
        created_at: row.created_at,
    })
}
