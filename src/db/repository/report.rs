use rusqlite::{params, Connection};
use serde::Serialize;

use crate::db::DatabaseError;

/// Admin landing-page counters.
#[derive(Debug, Clone, Serialize)]
pub struct AdminDashboard {
    pub total_staff: i64,
    pub total_patients: i64,
    pub today_requests: i64,
    pub pending_requests: i64,
}

/// Lab landing-page counters.
#[derive(Debug, Clone, Serialize)]
pub struct LabDashboard {
    pub pending_requests: i64,
    pub in_progress_requests: i64,
    pub urgent_requests: i64,
    pub stat_requests: i64,
    pub pending_items: i64,
    pub samples_in_storage: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryStat {
    pub category: String,
    pub test_count: i64,
    pub avg_price: f64,
    pub avg_turnaround_hours: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorWorkload {
    pub doctor_name: String,
    pub department: Option<String>,
    pub total_requests: i64,
    pub completed_requests: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopTest {
    pub test_name: String,
    pub test_code: String,
    pub category: String,
    pub times_ordered: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DemographicBucket {
    pub gender: String,
    pub age_group: String,
    pub patient_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StorageStat {
    pub status: String,
    pub sample_count: i64,
}

pub fn admin_dashboard(conn: &Connection) -> Result<AdminDashboard, DatabaseError> {
    let total_staff = scalar(
        conn,
        "SELECT COUNT(*) FROM users WHERE role IN ('doctor', 'lab') AND is_active = 1",
    )?;
    let total_patients = scalar(conn, "SELECT COUNT(*) FROM patients")?;
    let today_requests = scalar(
        conn,
        "SELECT COUNT(*) FROM test_requests WHERE DATE(created_at) = DATE('now')",
    )?;
    let pending_requests = scalar(
        conn,
        "SELECT COUNT(*) FROM test_requests WHERE status = 'Pending'",
    )?;
    Ok(AdminDashboard {
        total_staff,
        total_patients,
        today_requests,
        pending_requests,
    })
}

pub fn lab_dashboard(conn: &Connection) -> Result<LabDashboard, DatabaseError> {
    let pending_requests = scalar(
        conn,
        "SELECT COUNT(*) FROM test_requests WHERE status = 'Pending'",
    )?;
    let in_progress_requests = scalar(
        conn,
        "SELECT COUNT(*) FROM test_requests WHERE status = 'In Progress'",
    )?;
    let urgent_requests = scalar(
        conn,
        "SELECT COUNT(*) FROM test_requests
         WHERE urgency = 'Urgent' AND status NOT IN ('Completed', 'Cancelled')",
    )?;
    let stat_requests = scalar(
        conn,
        "SELECT COUNT(*) FROM test_requests
         WHERE urgency = 'STAT' AND status NOT IN ('Completed', 'Cancelled')",
    )?;
    let pending_items = scalar(
        conn,
        "SELECT COUNT(*) FROM test_request_items tri
         JOIN test_requests tr ON tri.request_id = tr.id
         WHERE tri.status IN ('Pending', 'In Progress') AND tr.status != 'Cancelled'",
    )?;
    let samples_in_storage = scalar(
        conn,
        "SELECT COUNT(*) FROM samples WHERE status = 'Stored'",
    )?;
    Ok(LabDashboard {
        pending_requests,
        in_progress_requests,
        urgent_requests,
        stat_requests,
        pending_items,
        samples_in_storage,
    })
}

/// Catalog breakdown per category: active test count, average price
/// and average promised turnaround.
pub fn category_stats(conn: &Connection) -> Result<Vec<CategoryStat>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT category, COUNT(*), AVG(price), AVG(turnaround_time)
         FROM test_catalog WHERE is_active = 1
         GROUP BY category ORDER BY category",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(CategoryStat {
            category: row.get(0)?,
            test_count: row.get(1)?,
            avg_price: row.get(2)?,
            avg_turnaround_hours: row.get(3)?,
        })
    })?;
    collect(rows)
}

pub fn doctor_workload(conn: &Connection) -> Result<Vec<DoctorWorkload>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT u.full_name, u.department,
                COUNT(tr.id),
                COALESCE(SUM(CASE WHEN tr.status = 'Completed' THEN 1 ELSE 0 END), 0)
         FROM users u
         LEFT JOIN test_requests tr ON tr.doctor_id = u.id
         WHERE u.role = 'doctor' AND u.is_active = 1
         GROUP BY u.id ORDER BY COUNT(tr.id) DESC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(DoctorWorkload {
            doctor_name: row.get(0)?,
            department: row.get(1)?,
            total_requests: row.get(2)?,
            completed_requests: row.get(3)?,
        })
    })?;
    collect(rows)
}

/// Most-ordered tests across all requests.
pub fn top_tests(conn: &Connection, limit: u32) -> Result<Vec<TopTest>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT tc.test_name, tc.test_code, tc.category, COUNT(tri.id) AS ordered
         FROM test_catalog tc
         JOIN test_request_items tri ON tri.test_id = tc.id
         GROUP BY tc.id ORDER BY ordered DESC, tc.test_name LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], |row| {
        Ok(TopTest {
            test_name: row.get(0)?,
            test_code: row.get(1)?,
            category: row.get(2)?,
            times_ordered: row.get(3)?,
        })
    })?;
    collect(rows)
}

/// Patient counts by gender and decade-wide age band.
pub fn demographics(conn: &Connection) -> Result<Vec<DemographicBucket>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT gender,
                CASE
                    WHEN (strftime('%Y', 'now') - strftime('%Y', date_of_birth)) < 18 THEN 'Under 18'
                    WHEN (strftime('%Y', 'now') - strftime('%Y', date_of_birth)) < 40 THEN '18-39'
                    WHEN (strftime('%Y', 'now') - strftime('%Y', date_of_birth)) < 65 THEN '40-64'
                    ELSE '65+'
                END AS age_group,
                COUNT(*)
         FROM patients
         GROUP BY gender, age_group
         ORDER BY gender, age_group",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(DemographicBucket {
            gender: row.get(0)?,
            age_group: row.get(1)?,
            patient_count: row.get(2)?,
        })
    })?;
    collect(rows)
}

pub fn sample_storage_stats(conn: &Connection) -> Result<Vec<StorageStat>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT status, COUNT(*) FROM samples GROUP BY status ORDER BY COUNT(*) DESC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(StorageStat {
            status: row.get(0)?,
            sample_count: row.get(1)?,
        })
    })?;
    collect(rows)
}

fn scalar(conn: &Connection, sql: &str) -> Result<i64, DatabaseError> {
    let n = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(n)
}

fn collect<T>(
    rows: impl Iterator<Item = Result<T, rusqlite::Error>>,
) -> Result<Vec<T>, DatabaseError> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;

    fn seed(conn: &Connection) {
        conn.execute_batch(
            "INSERT INTO users (username, password_hash, full_name, role, department)
             VALUES ('doc', 'x', 'Dr Demo', 'doctor', 'Internal Medicine');
             INSERT INTO users (username, password_hash, full_name, role)
             VALUES ('tech', 'x', 'Tech Demo', 'lab');
             INSERT INTO users (username, password_hash, full_name, role)
             VALUES ('boss', 'x', 'Admin One', 'admin');
             INSERT INTO patients (patient_id, first_name, last_name, date_of_birth, gender, created_by)
             VALUES ('PT2025000001', 'Jane', 'Doe', '1985-03-04', 'Female', 1);
             INSERT INTO patients (patient_id, first_name, last_name, date_of_birth, gender, created_by)
             VALUES ('PT2025000002', 'John', 'Roe', '2015-07-20', 'Male', 1);
             INSERT INTO test_catalog (test_code, test_name, category, price, turnaround_time)
             VALUES ('CBC', 'Complete Blood Count', 'Hematology', 10.0, 4);
             INSERT INTO test_catalog (test_code, test_name, category, price, turnaround_time)
             VALUES ('GLU', 'Glucose', 'Chemistry', 5.0, 2);
             INSERT INTO test_requests (request_id, patient_id, doctor_id, urgency)
             VALUES ('R202501010001', 1, 1, 'STAT');
             INSERT INTO test_request_items (request_id, test_id) VALUES (1, 1);
             INSERT INTO test_request_items (request_id, test_id) VALUES (1, 1);
             INSERT INTO test_request_items (request_id, test_id) VALUES (1, 2);
             INSERT INTO samples (sample_id, request_id, sample_type, collection_date, status)
             VALUES ('S202501010001', 1, 'Whole Blood', '2025-01-01', 'Stored');",
        )
        .unwrap();
    }

    #[test]
    fn admin_counters() {
        let conn = open_memory_database().unwrap();
        seed(&conn);
        let dash = admin_dashboard(&conn).unwrap();
        assert_eq!(dash.total_staff, 2); // admin excluded
        assert_eq!(dash.total_patients, 2);
        assert_eq!(dash.today_requests, 1);
        assert_eq!(dash.pending_requests, 1);
    }

    #[test]
    fn lab_counters() {
        let conn = open_memory_database().unwrap();
        seed(&conn);
        let dash = lab_dashboard(&conn).unwrap();
        assert_eq!(dash.pending_requests, 1);
        assert_eq!(dash.stat_requests, 1);
        assert_eq!(dash.urgent_requests, 0);
        assert_eq!(dash.pending_items, 3);
        assert_eq!(dash.samples_in_storage, 1);
    }

    #[test]
    fn categories_and_top_tests() {
        let conn = open_memory_database().unwrap();
        seed(&conn);

        let cats = category_stats(&conn).unwrap();
        assert_eq!(cats.len(), 2);
        assert_eq!(cats[0].category, "Chemistry");
        assert_eq!(cats[1].test_count, 1);

        let top = top_tests(&conn, 5).unwrap();
        assert_eq!(top[0].test_code, "CBC");
        assert_eq!(top[0].times_ordered, 2);
    }

    #[test]
    fn workload_counts_per_doctor() {
        let conn = open_memory_database().unwrap();
        seed(&conn);
        let load = doctor_workload(&conn).unwrap();
        assert_eq!(load.len(), 1);
        assert_eq!(load[0].doctor_name, "Dr Demo");
        assert_eq!(load[0].total_requests, 1);
        assert_eq!(load[0].completed_requests, 0);
    }

    #[test]
    fn demographics_buckets_by_age() {
        let conn = open_memory_database().unwrap();
        seed(&conn);
        let buckets = demographics(&conn).unwrap();
        assert_eq!(buckets.len(), 2);
        assert!(buckets.iter().any(|b| b.gender == "Male" && b.age_group == "Under 18"));
    }

    #[test]
    fn storage_stats_group_by_status() {
        let conn = open_memory_database().unwrap();
        seed(&conn);
        let stats = sample_storage_stats(&conn).unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].status, "Stored");
        assert_eq!(stats[0].sample_count, 1);
    }
}
