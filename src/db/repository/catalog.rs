use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;
use crate::models::{NewCatalogEntry, TestCatalogEntry};

const CATALOG_COLUMNS: &str = "id, test_code, test_name, category, description, sample_type,
    reference_range, units, turnaround_time, price, is_active";

pub fn insert_test(conn: &Connection, entry: &NewCatalogEntry) -> Result<i64, DatabaseError> {
    let taken: i64 = conn.query_row(
        "SELECT COUNT(*) FROM test_catalog WHERE test_code = ?1",
        params![entry.test_code],
        |row| row.get(0),
    )?;
    if taken > 0 {
        return Err(DatabaseError::BusinessRule(format!(
            "Test code '{}' already exists",
            entry.test_code
        )));
    }

    conn.execute(
        "INSERT INTO test_catalog (test_code, test_name, category, description, sample_type,
            reference_range, units, turnaround_time, price)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            entry.test_code,
            entry.test_name,
            entry.category,
            entry.description,
            entry.sample_type,
            entry.reference_range,
            entry.units,
            entry.turnaround_time,
            entry.price,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_test(conn: &Connection, id: i64) -> Result<TestCatalogEntry, DatabaseError> {
    conn.query_row(
        &format!("SELECT {CATALOG_COLUMNS} FROM test_catalog WHERE id = ?1"),
        params![id],
        entry_from_row,
    )
    .optional()?
    .ok_or_else(|| DatabaseError::NotFound {
        entity_type: "catalog test".into(),
        id: id.to_string(),
    })
}

/// Catalog ordered by category then name — the order the request form
/// groups tests in. `active_only` filters to orderable tests.
pub fn list_tests(
    conn: &Connection,
    active_only: bool,
) -> Result<Vec<TestCatalogEntry>, DatabaseError> {
    let where_clause = if active_only { "WHERE is_active = 1" } else { "" };
    let mut stmt = conn.prepare(&format!(
        "SELECT {CATALOG_COLUMNS} FROM test_catalog {where_clause}
         ORDER BY category, test_name"
    ))?;
    let rows = stmt.query_map([], entry_from_row)?;
    let mut tests = Vec::new();
    for row in rows {
        tests.push(row?);
    }
    Ok(tests)
}

pub fn update_test(
    conn: &Connection,
    id: i64,
    entry: &NewCatalogEntry,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE test_catalog SET test_code = ?1, test_name = ?2, category = ?3,
                description = ?4, sample_type = ?5, reference_range = ?6, units = ?7,
                turnaround_time = ?8, price = ?9
         WHERE id = ?10",
        params![
            entry.test_code,
            entry.test_name,
            entry.category,
            entry.description,
            entry.sample_type,
            entry.reference_range,
            entry.units,
            entry.turnaround_time,
            entry.price,
            id,
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "catalog test".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Flip is_active. Retiring a test hides it from the request form
/// without touching historical request items.
pub fn toggle_active(conn: &Connection, id: i64) -> Result<bool, DatabaseError> {
    let updated = conn.execute(
        "UPDATE test_catalog SET is_active = NOT is_active WHERE id = ?1",
        params![id],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "catalog test".into(),
            id: id.to_string(),
        });
    }
    let active: bool = conn.query_row(
        "SELECT is_active FROM test_catalog WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    Ok(active)
}

/// Hard-delete a catalog entry. Rejected when request items reference
/// it — toggle it inactive instead.
pub fn delete_test(conn: &Connection, id: i64) -> Result<TestCatalogEntry, DatabaseError> {
    let referenced: i64 = conn.query_row(
        "SELECT COUNT(*) FROM test_request_items WHERE test_id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    if referenced > 0 {
        return Err(DatabaseError::BusinessRule(
            "Cannot delete a test that appears on existing requests. Deactivate it instead."
                .into(),
        ));
    }

    let old = get_test(conn, id)?;
    conn.execute("DELETE FROM test_catalog WHERE id = ?1", params![id])?;
    Ok(old)
}

fn entry_from_row(row: &rusqlite::Row<'_>) -> Result<TestCatalogEntry, rusqlite::Error> {
    Ok(TestCatalogEntry {
        id: row.get(0)?,
        test_code: row.get(1)?,
        test_name: row.get(2)?,
        category: row.get(3)?,
        description: row.get(4)?,
        sample_type: row.get(5)?,
        reference_range: row.get(6)?,
        units: row.get(7)?,
        turnaround_time: row.get(8)?,
        price: row.get(9)?,
        is_active: row.get(10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;

    fn cbc() -> NewCatalogEntry {
        NewCatalogEntry {
            test_code: "CBC".into(),
            test_name: "Complete Blood Count".into(),
            category: "Hematology".into(),
            description: None,
            sample_type: Some("Whole Blood".into()),
            reference_range: Some("4.5-11.0".into()),
            units: Some("10^9/L".into()),
            turnaround_time: Some(4),
            price: 12.5,
        }
    }

    #[test]
    fn insert_and_list() {
        let conn = open_memory_database().unwrap();
        insert_test(&conn, &cbc()).unwrap();
        let tests = list_tests(&conn, true).unwrap();
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].test_code, "CBC");
    }

    #[test]
    fn duplicate_code_rejected() {
        let conn = open_memory_database().unwrap();
        insert_test(&conn, &cbc()).unwrap();
        let err = insert_test(&conn, &cbc()).unwrap_err();
        assert!(matches!(err, DatabaseError::BusinessRule(_)));
    }

    #[test]
    fn toggle_hides_from_active_list() {
        let conn = open_memory_database().unwrap();
        let id = insert_test(&conn, &cbc()).unwrap();
        let active = toggle_active(&conn, id).unwrap();
        assert!(!active);
        assert!(list_tests(&conn, true).unwrap().is_empty());
        assert_eq!(list_tests(&conn, false).unwrap().len(), 1);
    }

    #[test]
    fn delete_referenced_test_rejected() {
        let conn = open_memory_database().unwrap();
        let id = insert_test(&conn, &cbc()).unwrap();
        conn.execute(
            "INSERT INTO users (username, password_hash, full_name, role)
             VALUES ('doc', 'x', 'Dr Demo', 'doctor')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO patients (patient_id, first_name, last_name, date_of_birth, gender, created_by)
             VALUES ('PT2025000001', 'A', 'B', '1990-01-01', 'Male', 1)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO test_requests (request_id, patient_id, doctor_id)
             VALUES ('R202501010001', 1, 1)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO test_request_items (request_id, test_id) VALUES (1, ?1)",
            params![id],
        )
        .unwrap();

        let err = delete_test(&conn, id).unwrap_err();
        assert!(matches!(err, DatabaseError::BusinessRule(_)));
    }

    #[test]
    fn delete_unreferenced_test_succeeds() {
        let conn = open_memory_database().unwrap();
        let id = insert_test(&conn, &cbc()).unwrap();
        delete_test(&conn, id).unwrap();
        assert!(get_test(&conn, id).is_err());
    }

    #[test]
    fn list_orders_by_category_then_name() {
        let conn = open_memory_database().unwrap();
        let mut glucose = cbc();
        glucose.test_code = "GLU".into();
        glucose.test_name = "Glucose".into();
        glucose.category = "Chemistry".into();
        insert_test(&conn, &cbc()).unwrap();
        insert_test(&conn, &glucose).unwrap();

        let tests = list_tests(&conn, true).unwrap();
        assert_eq!(tests[0].category, "Chemistry");
        assert_eq!(tests[1].category, "Hematology");
    }
}
