use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::db::DatabaseError;
use crate::idgen;
use crate::models::enums::{ItemPriority, ItemStatus, RequestStatus, Urgency};
use crate::models::{NewTestRequest, TestRequest, TestRequestItem};

use super::patient;

/// Outcome of a successful request creation.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedRequest {
    pub id: i64,
    pub request_id: String,
    pub item_count: usize,
}

/// Request list row joined with patient identity and item counts.
#[derive(Debug, Clone, Serialize)]
pub struct RequestOverview {
    pub id: i64,
    pub request_id: String,
    pub patient_code: String,
    pub patient_name: String,
    pub doctor_name: String,
    pub urgency: Urgency,
    pub status: RequestStatus,
    pub total_tests: i64,
    pub completed_tests: i64,
    pub created_at: String,
}

/// Pending work item for the lab result-entry list.
#[derive(Debug, Clone, Serialize)]
pub struct PendingItemView {
    pub item_id: i64,
    pub status: ItemStatus,
    pub priority: ItemPriority,
    pub test_name: String,
    pub test_code: String,
    pub category: String,
    pub sample_type: Option<String>,
    pub request_code: String,
    pub urgency: Urgency,
    pub patient_code: String,
    pub patient_name: String,
    pub sample_code: Option<String>,
    pub sample_collection_date: Option<String>,
}

/// Everything the result-entry form shows for one item.
#[derive(Debug, Clone, Serialize)]
pub struct ItemDetailView {
    pub item_id: i64,
    pub status: ItemStatus,
    pub priority: ItemPriority,
    pub test_name: String,
    pub test_code: String,
    pub reference_range: Option<String>,
    pub units: Option<String>,
    pub sample_type: Option<String>,
    pub request_code: String,
    pub clinical_info: Option<String>,
    pub provisional_diagnosis: Option<String>,
    pub urgency: Urgency,
    pub patient_code: String,
    pub patient_name: String,
    pub gender: String,
    pub date_of_birth: NaiveDate,
    pub sample_code: Option<String>,
}

/// Create a test request with one item per selected test, atomically.
///
/// The patient is resolved by human-readable code; at least one test is
/// required. Either the request row and every item land, or nothing does.
pub fn create_request(
    conn: &Connection,
    doctor_id: i64,
    req: &NewTestRequest,
) -> Result<CreatedRequest, DatabaseError> {
    if req.patient_code.trim().is_empty() {
        return Err(DatabaseError::Validation("Patient ID is required".into()));
    }
    if req.tests.is_empty() {
        return Err(DatabaseError::Validation(
            "At least one test must be selected".into(),
        ));
    }

    let patient = patient::get_by_code(conn, req.patient_code.trim())?.ok_or_else(|| {
        DatabaseError::BusinessRule(format!("Patient not found with ID: {}", req.patient_code))
    })?;

    let request_code = idgen::generate_request_code(conn)?;

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO test_requests (request_id, patient_id, doctor_id, clinical_info,
            provisional_diagnosis, urgency, collection_date, collection_time, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            request_code,
            patient.id,
            doctor_id,
            req.clinical_info,
            req.provisional_diagnosis,
            req.urgency.as_str(),
            req.collection_date.map(|d| d.to_string()),
            req.collection_time,
            req.notes,
        ],
    )?;
    let request_db_id = tx.last_insert_rowid();

    for test in &req.tests {
        tx.execute(
            "INSERT INTO test_request_items (request_id, test_id, priority)
             VALUES (?1, ?2, ?3)",
            params![request_db_id, test.test_id, test.priority.as_str()],
        )?;
    }
    tx.commit()?;

    Ok(CreatedRequest {
        id: request_db_id,
        request_id: request_code,
        item_count: req.tests.len(),
    })
}

pub fn get_request(conn: &Connection, id: i64) -> Result<TestRequest, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, request_id, patient_id, doctor_id, clinical_info, provisional_diagnosis,
                    urgency, status, collection_date, collection_time, notes, created_at
             FROM test_requests WHERE id = ?1",
            params![id],
            |row| Ok(request_row(row)),
        )
        .optional()?
        .ok_or_else(|| DatabaseError::NotFound {
            entity_type: "test_request".into(),
            id: id.to_string(),
        })?;
    request_from_row(row?)
}

pub fn items_for_request(
    conn: &Connection,
    request_db_id: i64,
) -> Result<Vec<TestRequestItem>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, request_id, test_id, priority, status
         FROM test_request_items WHERE request_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![request_db_id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
        ))
    })?;

    let mut items = Vec::new();
    for row in rows {
        let (id, request_id, test_id, priority, status) = row?;
        items.push(TestRequestItem {
            id,
            request_id,
            test_id,
            priority: ItemPriority::from_str(&priority)?,
            status: ItemStatus::from_str(&status)?,
        });
    }
    Ok(items)
}

const OVERVIEW_SQL: &str = "SELECT tr.id, tr.request_id, p.patient_id,
        p.first_name || ' ' || p.last_name,
        u.full_name, tr.urgency, tr.status,
        COUNT(tri.id),
        COALESCE(SUM(CASE WHEN tri.status = 'Completed' THEN 1 ELSE 0 END), 0),
        tr.created_at
    FROM test_requests tr
    JOIN patients p ON tr.patient_id = p.id
    JOIN users u ON tr.doctor_id = u.id
    LEFT JOIN test_request_items tri ON tri.request_id = tr.id";

/// A doctor's own requests, newest first.
pub fn list_by_doctor(
    conn: &Connection,
    doctor_id: i64,
    limit: u32,
) -> Result<Vec<RequestOverview>, DatabaseError> {
    let sql = format!(
        "{OVERVIEW_SQL} WHERE tr.doctor_id = ?1
         GROUP BY tr.id ORDER BY tr.created_at DESC LIMIT ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![doctor_id, limit], |row| Ok(overview_row(row)))?;
    collect_overviews(rows)
}

/// Lab work queue: filter by status, optionally urgency and request date.
pub fn list_filtered(
    conn: &Connection,
    status: RequestStatus,
    urgency: Option<Urgency>,
    date: Option<NaiveDate>,
) -> Result<Vec<RequestOverview>, DatabaseError> {
    let mut clauses = vec!["tr.status = ?1".to_string()];
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(status.as_str().to_string())];

    if let Some(u) = urgency {
        args.push(Box::new(u.as_str().to_string()));
        clauses.push(format!("tr.urgency = ?{}", args.len()));
    }
    if let Some(d) = date {
        args.push(Box::new(d.to_string()));
        clauses.push(format!("DATE(tr.created_at) = ?{}", args.len()));
    }

    let sql = format!(
        "{OVERVIEW_SQL} WHERE {} GROUP BY tr.id ORDER BY tr.created_at DESC",
        clauses.join(" AND ")
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
        |row| Ok(overview_row(row)),
    )?;
    collect_overviews(rows)
}

/// Requests waiting on sample registration (no sample row yet).
pub fn pending_without_sample(conn: &Connection) -> Result<Vec<RequestOverview>, DatabaseError> {
    let sql = format!(
        "{OVERVIEW_SQL} LEFT JOIN samples s ON s.request_id = tr.id
         WHERE s.id IS NULL AND tr.status = 'Pending'
         GROUP BY tr.id ORDER BY tr.created_at DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| Ok(overview_row(row)))?;
    collect_overviews(rows)
}

/// Items still awaiting a result, most urgent first.
pub fn pending_items(conn: &Connection) -> Result<Vec<PendingItemView>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT tri.id, tri.status, tri.priority,
                tc.test_name, tc.test_code, tc.category, tc.sample_type,
                tr.request_id, tr.urgency,
                p.patient_id, p.first_name || ' ' || p.last_name,
                s.sample_id, s.collection_date
         FROM test_request_items tri
         JOIN test_catalog tc ON tri.test_id = tc.id
         JOIN test_requests tr ON tri.request_id = tr.id
         JOIN patients p ON tr.patient_id = p.id
         LEFT JOIN samples s ON tr.id = s.request_id
         WHERE tri.status IN ('Pending', 'In Progress') AND tr.status != 'Cancelled'
         ORDER BY CASE tri.priority
                      WHEN 'Critical' THEN 0
                      WHEN 'High' THEN 1
                      ELSE 2
                  END,
                  tr.created_at",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, Option<String>>(6)?,
            row.get::<_, String>(7)?,
            row.get::<_, String>(8)?,
            row.get::<_, String>(9)?,
            row.get::<_, String>(10)?,
            row.get::<_, Option<String>>(11)?,
            row.get::<_, Option<String>>(12)?,
        ))
    })?;

    let mut items = Vec::new();
    for row in rows {
        let (
            item_id,
            status,
            priority,
            test_name,
            test_code,
            category,
            sample_type,
            request_code,
            urgency,
            patient_code,
            patient_name,
            sample_code,
            sample_collection_date,
        ) = row?;
        items.push(PendingItemView {
            item_id,
            status: ItemStatus::from_str(&status)?,
            priority: ItemPriority::from_str(&priority)?,
            test_name,
            test_code,
            category,
            sample_type,
            request_code,
            urgency: Urgency::from_str(&urgency)?,
            patient_code,
            patient_name,
            sample_code,
            sample_collection_date,
        });
    }
    Ok(items)
}

/// Result-entry form detail. Only items still awaiting a result
/// resolve; a Completed item returns `None`.
pub fn get_item_detail(
    conn: &Connection,
    item_id: i64,
) -> Result<Option<ItemDetailView>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT tri.id, tri.status, tri.priority,
                    tc.test_name, tc.test_code, tc.reference_range, tc.units, tc.sample_type,
                    tr.request_id, tr.clinical_info, tr.provisional_diagnosis, tr.urgency,
                    p.patient_id, p.first_name || ' ' || p.last_name, p.gender, p.date_of_birth,
                    s.sample_id
             FROM test_request_items tri
             JOIN test_catalog tc ON tri.test_id = tc.id
             JOIN test_requests tr ON tri.request_id = tr.id
             JOIN patients p ON tr.patient_id = p.id
             LEFT JOIN samples s ON tr.id = s.request_id
             WHERE tri.id = ?1 AND tri.status IN ('Pending', 'In Progress')",
            params![item_id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, Option<String>>(7)?,
                    row.get::<_, String>(8)?,
                    row.get::<_, Option<String>>(9)?,
                    row.get::<_, Option<String>>(10)?,
                    row.get::<_, String>(11)?,
                    row.get::<_, String>(12)?,
                    row.get::<_, String>(13)?,
                    row.get::<_, String>(14)?,
                    row.get::<_, String>(15)?,
                    row.get::<_, Option<String>>(16)?,
                ))
            },
        )
        .optional()?;

    let Some((
        item_id,
        status,
        priority,
        test_name,
        test_code,
        reference_range,
        units,
        sample_type,
        request_code,
        clinical_info,
        provisional_diagnosis,
        urgency,
        patient_code,
        patient_name,
        gender,
        date_of_birth,
        sample_code,
    )) = row
    else {
        return Ok(None);
    };

    Ok(Some(ItemDetailView {
        item_id,
        status: ItemStatus::from_str(&status)?,
        priority: ItemPriority::from_str(&priority)?,
        test_name,
        test_code,
        reference_range,
        units,
        sample_type,
        request_code,
        clinical_info,
        provisional_diagnosis,
        urgency: Urgency::from_str(&urgency)?,
        patient_code,
        patient_name,
        gender,
        date_of_birth: NaiveDate::parse_from_str(&date_of_birth, "%Y-%m-%d")
            .map_err(|_| DatabaseError::Validation("invalid date_of_birth".into()))?,
        sample_code,
    }))
}

// Internal row type for TestRequest mapping
struct RequestRow {
    id: i64,
    request_id: String,
    patient_id: i64,
    doctor_id: i64,
    clinical_info: Option<String>,
    provisional_diagnosis: Option<String>,
    urgency: String,
    status: String,
    collection_date: Option<String>,
    collection_time: Option<String>,
    notes: Option<String>,
    created_at: String,
}

fn request_row(row: &rusqlite::Row<'_>) -> Result<RequestRow, rusqlite::Error> {
    Ok(RequestRow {
        id: row.get(0)?,
        request_id: row.get(1)?,
        patient_id: row.get(2)?,
        doctor_id: row.get(3)?,
        clinical_info: row.get(4)?,
        provisional_diagnosis: row.get(5)?,
        urgency: row.get(6)?,
        status: row.get(7)?,
        collection_date: row.get(8)?,
        collection_time: row.get(9)?,
        notes: row.get(10)?,
        created_at: row.get(11)?,
    })
}

fn request_from_row(row: RequestRow) -> Result<TestRequest, DatabaseError> {
    Ok(TestRequest {
        id: row.id,
        request_id: row.request_id,
        patient_id: row.patient_id,
        doctor_id: row.doctor_id,
        clinical_info: row.clinical_info,
        provisional_diagnosis: row.provisional_diagnosis,
        urgency: Urgency::from_str(&row.urgency)?,
        status: RequestStatus::from_str(&row.status)?,
        collection_date: row
            .collection_date
            .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
        collection_time: row.collection_time,
        notes: row.notes,
        created_at: row.created_at,
    })
}

type OverviewRow = (
    i64,
    String,
    String,
    String,
    String,
    String,
    String,
    i64,
    i64,
    String,
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
    ))
}

fn collect_overviews(
    rows: impl Iterator<Item = Result<Result<OverviewRow, rusqlite::Error>, rusqlite::Error>>,
) -> Result<Vec<RequestOverview>, DatabaseError> {
    let mut overviews = Vec::new();
    for row in rows {
        let (
            id,
            request_id,
            patient_code,
            patient_name,
            doctor_name,
            urgency,
            status,
            total_tests,
            completed_tests,
            created_at,
        ) = row??;
        overviews.push(RequestOverview {
            id,
            request_id,
            patient_code,
            patient_name,
            doctor_name,
            urgency: Urgency::from_str(&urgency)?,
            status: RequestStatus::from_str(&status)?,
            total_tests,
            completed_tests,
            created_at,
        });
    }
    Ok(overviews)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::models::RequestedTest;

    pub(crate) fn seed_base(conn: &Connection) -> (i64, String) {
        conn.execute(
            "INSERT INTO users (username, password_hash, full_name, role)
             VALUES ('doc', 'x', 'Dr Demo', 'doctor')",
            [],
        )
        .unwrap();
        let doctor = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO patients (patient_id, first_name, last_name, date_of_birth, gender, created_by)
             VALUES ('PT2025000123', 'Jane', 'Doe', '1985-03-04', 'Female', ?1)",
            params![doctor],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO test_catalog (test_code, test_name, category, sample_type, price)
             VALUES ('CBC', 'Complete Blood Count', 'Hematology', 'Whole Blood', 12.5)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO test_catalog (test_code, test_name, category, sample_type, price)
             VALUES ('GLU', 'Glucose', 'Chemistry', 'Serum', 5.0)",
            [],
        )
        .unwrap();
        (doctor, "PT2025000123".into())
    }

    fn new_request(patient_code: &str, tests: Vec<RequestedTest>) -> NewTestRequest {
        NewTestRequest {
            patient_code: patient_code.into(),
            clinical_info: Some("Fatigue, pallor".into()),
            provisional_diagnosis: None,
            urgency: Urgency::Routine,
            collection_date: None,
            collection_time: None,
            notes: None,
            tests,
        }
    }

    #[test]
    fn create_request_with_two_tests() {
        let conn = open_memory_database().unwrap();
        let (doctor, code) = seed_base(&conn);

        let created = create_request(
            &conn,
            doctor,
            &new_request(
                &code,
                vec![
                    RequestedTest { test_id: 1, priority: ItemPriority::Normal },
                    RequestedTest { test_id: 2, priority: ItemPriority::High },
                ],
            ),
        )
        .unwrap();

        assert!(created.request_id.starts_with('R'));
        assert_eq!(created.item_count, 2);

        let request = get_request(&conn, created.id).unwrap();
        assert_eq!(request.status, RequestStatus::Pending);

        let items = items_for_request(&conn, created.id).unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.status == ItemStatus::Pending));
        assert_eq!(items[1].priority, ItemPriority::High);
    }

    #[test]
    fn zero_tests_rejected_without_orphan_row() {
        let conn = open_memory_database().unwrap();
        let (doctor, code) = seed_base(&conn);

        let err = create_request(&conn, doctor, &new_request(&code, vec![])).unwrap_err();
        assert!(matches!(err, DatabaseError::Validation(_)));

        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM test_requests", [], |row| row.get(0))
            .unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn unknown_patient_rejected() {
        let conn = open_memory_database().unwrap();
        let (doctor, _) = seed_base(&conn);
        let err = create_request(
            &conn,
            doctor,
            &new_request(
                "PT2025999999",
                vec![RequestedTest { test_id: 1, priority: ItemPriority::Normal }],
            ),
        )
        .unwrap_err();
        assert!(matches!(err, DatabaseError::BusinessRule(_)));
    }

    #[test]
    fn bad_test_id_rolls_back_whole_request() {
        let conn = open_memory_database().unwrap();
        let (doctor, code) = seed_base(&conn);

        let result = create_request(
            &conn,
            doctor,
            &new_request(
                &code,
                vec![
                    RequestedTest { test_id: 1, priority: ItemPriority::Normal },
                    RequestedTest { test_id: 999, priority: ItemPriority::Normal },
                ],
            ),
        );
        assert!(result.is_err()); // FK violation on the second item

        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM test_requests", [], |row| row.get(0))
            .unwrap();
        assert_eq!(n, 0, "failed creation must not leave an orphan request");
    }

    #[test]
    fn doctor_list_and_pending_queue() {
        let conn = open_memory_database().unwrap();
        let (doctor, code) = seed_base(&conn);
        create_request(
            &conn,
            doctor,
            &new_request(&code, vec![RequestedTest { test_id: 1, priority: ItemPriority::Normal }]),
        )
        .unwrap();

        let mine = list_by_doctor(&conn, doctor, 10).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].patient_name, "Jane Doe");
        assert_eq!(mine[0].total_tests, 1);
        assert_eq!(mine[0].completed_tests, 0);

        let waiting = pending_without_sample(&conn).unwrap();
        assert_eq!(waiting.len(), 1);

        let items = pending_items(&conn).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].test_code, "CBC");
        assert!(items[0].sample_code.is_none());
    }

    #[test]
    fn pending_items_orders_critical_first() {
        let conn = open_memory_database().unwrap();
        let (doctor, code) = seed_base(&conn);
        create_request(
            &conn,
            doctor,
            &new_request(
                &code,
                vec![
                    RequestedTest { test_id: 1, priority: ItemPriority::Normal },
                    RequestedTest { test_id: 2, priority: ItemPriority::Critical },
                ],
            ),
        )
        .unwrap();

        let items = pending_items(&conn).unwrap();
        assert_eq!(items[0].priority, ItemPriority::Critical);
    }

    #[test]
    fn item_detail_excludes_completed_items() {
        let conn = open_memory_database().unwrap();
        let (doctor, code) = seed_base(&conn);
        create_request(
            &conn,
            doctor,
            &new_request(&code, vec![RequestedTest { test_id: 1, priority: ItemPriority::Normal }]),
        )
        .unwrap();

        let detail = get_item_detail(&conn, 1).unwrap().unwrap();
        assert_eq!(detail.test_code, "CBC");
        assert_eq!(detail.patient_code, code);

        conn.execute("UPDATE test_request_items SET status = 'Completed' WHERE id = 1", [])
            .unwrap();
        assert!(get_item_detail(&conn, 1).unwrap().is_none());
    }

    #[test]
    fn item_detail_rejects_malformed_date_of_birth() {
        let conn = open_memory_database().unwrap();
        let (doctor, code) = seed_base(&conn);
        create_request(
            &conn,
            doctor,
            &new_request(&code, vec![RequestedTest { test_id: 1, priority: ItemPriority::Normal }]),
        )
        .unwrap();
        conn.execute("UPDATE patients SET date_of_birth = 'not-a-date' WHERE id = 1", [])
            .unwrap();

        let err = get_item_detail(&conn, 1).unwrap_err();
        assert!(matches!(err, DatabaseError::Validation(_)));
    }

    #[test]
    fn filtered_list_by_status_and_urgency() {
        let conn = open_memory_database().unwrap();
        let (doctor, code) = seed_base(&conn);
        let mut stat = new_request(&code, vec![RequestedTest { test_id: 1, priority: ItemPriority::Normal }]);
        stat.urgency = Urgency::Stat;
        create_request(&conn, doctor, &stat).unwrap();

        let pending = list_filtered(&conn, RequestStatus::Pending, None, None).unwrap();
        assert_eq!(pending.len(), 1);

        let stat_only =
            list_filtered(&conn, RequestStatus::Pending, Some(Urgency::Stat), None).unwrap();
        assert_eq!(stat_only.len(), 1);

        let urgent_only =
            list_filtered(&conn, RequestStatus::Pending, Some(Urgency::Urgent), None).unwrap();
        assert!(urgent_only.is_empty());
    }
}
