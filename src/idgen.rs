//! Human-readable id generation for patients, requests and samples.
//!
//! Formats follow the registration forms: `PT<year><6 digits>`,
//! `R<yyyymmdd><4 digits>`, `S<yyyymmdd><4 digits>`. The suffix is
//! random, so each generator probes the table and retries on collision
//! instead of handing out a duplicate.

use chrono::Local;
use rand::Rng;
use rusqlite::{params, Connection};

use crate::db::DatabaseError;

const MAX_ATTEMPTS: u32 = 16;

/// `PT2025000123`
pub fn generate_patient_code(conn: &Connection) -> Result<String, DatabaseError> {
    let year = Local::now().format("%Y");
    generate(conn, "patient", move |rng| {
        format!("PT{year}{:06}", rng.gen_range(1..=999_999))
    }, "SELECT COUNT(*) FROM patients WHERE patient_id = ?1")
}

/// `R202501230042`
pub fn generate_request_code(conn: &Connection) -> Result<String, DatabaseError> {
    let day = Local::now().format("%Y%m%d");
    generate(conn, "request", move |rng| {
        format!("R{day}{:04}", rng.gen_range(1..=9_999))
    }, "SELECT COUNT(*) FROM test_requests WHERE request_id = ?1")
}

/// `S202501230007`
pub fn generate_sample_code(conn: &Connection) -> Result<String, DatabaseError> {
    let day = Local::now().format("%Y%m%d");
    generate(conn, "sample", move |rng| {
        format!("S{day}{:04}", rng.gen_range(1..=9_999))
    }, "SELECT COUNT(*) FROM samples WHERE sample_id = ?1")
}

fn generate(
    conn: &Connection,
    kind: &'static str,
    mut candidate: impl FnMut(&mut rand::rngs::ThreadRng) -> String,
    probe_sql: &str,
) -> Result<String, DatabaseError> {
    let mut rng = rand::thread_rng();
    for _ in 0..MAX_ATTEMPTS {
        let code = candidate(&mut rng);
        let taken: i64 = conn.query_row(probe_sql, params![code], |row| row.get(0))?;
        if taken == 0 {
            return Ok(code);
        }
    }
    Err(DatabaseError::IdExhausted(kind))
}
