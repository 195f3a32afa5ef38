use rusqlite::{params, Connection};
use serde::Serialize;
use tracing::warn;

use crate::db::DatabaseError;

/// One audit trail entry. Old/new values are stored as JSON text.
#[derive(Debug, Clone, Default)]
pub struct AuditEntry {
    pub user_id: Option<i64>,
    pub action: String,
    pub table_name: Option<String>,
    pub record_id: Option<String>,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Audit row joined with the acting user's name, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct AuditView {
    pub id: i64,
    pub user_name: Option<String>,
    pub action: String,
    pub table_name: Option<String>,
    pub record_id: Option<String>,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub created_at: String,
}

pub fn insert_entry(conn: &Connection, entry: &AuditEntry) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO audit_log (user_id, action, table_name, record_id, old_values,
            new_values, ip_address, user_agent)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            entry.user_id,
            entry.action,
            entry.table_name,
            entry.record_id,
            entry.old_values.as_ref().map(|v| v.to_string()),
            entry.new_values.as_ref().map(|v| v.to_string()),
            entry.ip_address,
            entry.user_agent,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Best-effort audit write. A failed insert is logged and swallowed so
/// the primary action is never rolled back over its trail entry.
pub fn log_action(conn: &Connection, entry: &AuditEntry) {
    if let Err(e) = insert_entry(conn, entry) {
        warn!(action = %entry.action, error = %e, "audit log insert failed");
    }
}

/// Most recent activity for the admin audit view.
pub fn recent_activity(conn: &Connection, limit: u32) -> Result<Vec<AuditView>, DatabaseError> {
    filtered_activity(conn, None, None, limit)
}

/// Audit trail narrowed to a user and/or a table, newest first.
pub fn filtered_activity(
    conn: &Connection,
    user_id: Option<i64>,
    table_name: Option<&str>,
    limit: u32,
) -> Result<Vec<AuditView>, DatabaseError> {
    let mut clauses: Vec<String> = Vec::new();
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
    if let Some(id) = user_id {
        args.push(Box::new(id));
        clauses.push(format!("a.user_id = ?{}", args.len()));
    }
    if let Some(table) = table_name {
        args.push(Box::new(table.to_string()));
        clauses.push(format!("a.table_name = ?{}", args.len()));
    }
    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    args.push(Box::new(limit));

    let sql = format!(
        "SELECT a.id, u.full_name, a.action, a.table_name, a.record_id,
                a.old_values, a.new_values, a.ip_address, a.created_at
         FROM audit_log a
         LEFT JOIN users u ON a.user_id = u.id
         {where_clause}
         ORDER BY a.created_at DESC, a.id DESC
         LIMIT ?{}",
        args.len()
    );
    let mut stmt = conn.prepare(&sql)?;

    let rows = stmt.query_map(rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())), |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, Option<String>>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, Option<String>>(4)?,
            row.get::<_, Option<String>>(5)?,
            row.get::<_, Option<String>>(6)?,
            row.get::<_, Option<String>>(7)?,
            row.get::<_, String>(8)?,
        ))
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let (id, user_name, action, table_name, record_id, old_values, new_values, ip, created_at) =
            row?;
        entries.push(AuditView {
            id,
            user_name,
            action,
            table_name,
            record_id,
            old_values: old_values.and_then(|s| serde_json::from_str(&s).ok()),
            new_values: new_values.and_then(|s| serde_json::from_str(&s).ok()),
            ip_address: ip,
            created_at,
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use serde_json::json;

    #[test]
    fn insert_and_read_back() {
        let conn = open_memory_database().unwrap();
        conn.execute(
            "INSERT INTO users (username, password_hash, full_name, role)
             VALUES ('boss', 'x', 'Admin One', 'admin')",
            [],
        )
        .unwrap();

        insert_entry(
            &conn,
            &AuditEntry {
                user_id: Some(1),
                action: "delete_staff".into(),
                table_name: Some("users".into()),
                record_id: Some("4".into()),
                old_values: Some(json!({"username": "tech1"})),
                new_values: None,
                ip_address: Some("127.0.0.1".into()),
                user_agent: None,
            },
        )
        .unwrap();

        let entries = recent_activity(&conn, 10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "delete_staff");
        assert_eq!(entries[0].user_name.as_deref(), Some("Admin One"));
        assert_eq!(entries[0].old_values, Some(json!({"username": "tech1"})));
    }

    #[test]
    fn anonymous_entry_allowed() {
        let conn = open_memory_database().unwrap();
        insert_entry(
            &conn,
            &AuditEntry {
                action: "failed_login".into(),
                ip_address: Some("10.0.0.9".into()),
                ..Default::default()
            },
        )
        .unwrap();

        let entries = recent_activity(&conn, 10).unwrap();
        assert_eq!(entries[0].user_name, None);
    }

    #[test]
    fn log_action_swallows_failure() {
        let conn = open_memory_database().unwrap();
        conn.execute("DROP TABLE audit_log", []).unwrap();
        // Must not panic or error out
        log_action(
            &conn,
            &AuditEntry {
                action: "login".into(),
                ..Default::default()
            },
        );
    }

    #[test]
    fn filters_narrow_by_user_and_table() {
        let conn = open_memory_database().unwrap();
        conn.execute(
            "INSERT INTO users (username, password_hash, full_name, role)
             VALUES ('boss', 'x', 'Admin One', 'admin')",
            [],
        )
        .unwrap();

        insert_entry(
            &conn,
            &AuditEntry {
                user_id: Some(1),
                action: "update_patient".into(),
                table_name: Some("patients".into()),
                ..Default::default()
            },
        )
        .unwrap();
        insert_entry(
            &conn,
            &AuditEntry {
                action: "failed_login".into(),
                ..Default::default()
            },
        )
        .unwrap();

        let by_user = filtered_activity(&conn, Some(1), None, 10).unwrap();
        assert_eq!(by_user.len(), 1);
        assert_eq!(by_user[0].action, "update_patient");

        let by_table = filtered_activity(&conn, None, Some("patients"), 10).unwrap();
        assert_eq!(by_table.len(), 1);

        let both = filtered_activity(&conn, Some(1), Some("users"), 10).unwrap();
        assert!(both.is_empty());
    }

    #[test]
    fn limit_caps_results() {
        let conn = open_memory_database().unwrap();
        for i in 0..5 {
            insert_entry(
                &conn,
                &AuditEntry {
                    action: format!("action_{i}"),
                    ..Default::default()
                },
            )
            .unwrap();
        }
        assert_eq!(recent_activity(&conn, 3).unwrap().len(), 3);
    }
}
