use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;
use crate::models::enums::Role;
use crate::models::{NewUser, StaffOverview, User};

/// Insert a staff or admin account. The caller hashes the password.
pub fn insert_user(
    conn: &Connection,
    user: &NewUser,
    password_hash: &str,
) -> Result<i64, DatabaseError> {
    let taken: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE username = ?1",
        params![user.username],
        |row| row.get(0),
    )?;
    if taken > 0 {
        return Err(DatabaseError::BusinessRule(
            "Username already exists. Please choose a different username.".into(),
        ));
    }

    conn.execute(
        "INSERT INTO users (username, password_hash, full_name, email, phone, role, department)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            user.username,
            password_hash,
            user.full_name,
            user.email,
            user.phone,
            user.role.as_str(),
            user.department,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_user_by_id(conn: &Connection, id: i64) -> Result<User, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, username, full_name, email, phone, role, department, is_active, created_at
             FROM users WHERE id = ?1",
            params![id],
            |row| Ok(user_row(row)),
        )
        .optional()?
        .ok_or_else(|| DatabaseError::NotFound {
            entity_type: "user".into(),
            id: id.to_string(),
        })?;
    user_from_row(row?)
}

/// Look up an active account for login. Returns the user plus the
/// stored password hash, or `None` when the username is unknown or
/// the account is deactivated.
pub fn find_active_by_username(
    conn: &Connection,
    username: &str,
) -> Result<Option<(User, String)>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, username, full_name, email, phone, role, department, is_active, created_at,
                    password_hash
             FROM users WHERE username = ?1 AND is_active = 1",
            params![username],
            |row| {
                let hash: String = row.get(9)?;
                Ok((user_row(row), hash))
            },
        )
        .optional()?;

    match row {
        Some((raw, hash)) => Ok(Some((user_from_row(raw?)?, hash))),
        None => Ok(None),
    }
}

/// Staff list (doctor/lab) with per-user request and result counts.
pub fn list_staff(conn: &Connection) -> Result<Vec<StaffOverview>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.username, u.full_name, u.email, u.phone, u.role, u.department, u.is_active,
                (SELECT COUNT(*) FROM test_requests tr WHERE tr.doctor_id = u.id) AS total_requests,
                (SELECT COUNT(*) FROM test_results res WHERE res.performed_by = u.id) AS total_results
         FROM users u
         WHERE u.role IN ('doctor', 'lab')
         ORDER BY u.full_name",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, Option<String>>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, Option<String>>(6)?,
            row.get::<_, bool>(7)?,
            row.get::<_, i64>(8)?,
            row.get::<_, i64>(9)?,
        ))
    })?;

    let mut staff = Vec::new();
    for row in rows {
        let (id, username, full_name, email, phone, role, department, is_active, reqs, results) =
            row?;
        staff.push(StaffOverview {
            id,
            username,
            full_name,
            email,
            phone,
            role: Role::from_str(&role)?,
            department,
            is_active,
            total_requests: reqs,
            total_results: results,
        });
    }
    Ok(staff)
}

pub fn update_staff(
    conn: &Connection,
    id: i64,
    full_name: &str,
    email: Option<&str>,
    phone: Option<&str>,
    department: Option<&str>,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE users SET full_name = ?1, email = ?2, phone = ?3, department = ?4,
                updated_at = datetime('now')
         WHERE id = ?5 AND role IN ('doctor', 'lab')",
        params![full_name, email, phone, department, id],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "staff".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

pub fn set_active(conn: &Connection, id: i64, active: bool) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE users SET is_active = ?1, updated_at = datetime('now') WHERE id = ?2",
        params![active, id],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "user".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Hard-delete a doctor/lab account. Rejected when the account still
/// has test requests attached (deactivate instead).
pub fn delete_staff(conn: &Connection, id: i64) -> Result<User, DatabaseError> {
    let referenced: i64 = conn.query_row(
        "SELECT COUNT(*) FROM test_requests WHERE doctor_id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    if referenced > 0 {
        return Err(DatabaseError::BusinessRule(
            "Cannot delete staff member with associated test requests. Please deactivate instead."
                .into(),
        ));
    }

    let old = get_user_by_id(conn, id)?;
    conn.execute(
        "DELETE FROM users WHERE id = ?1 AND role IN ('doctor', 'lab')",
        params![id],
    )?;
    Ok(old)
}

pub fn count_users(conn: &Connection) -> Result<i64, DatabaseError> {
    let n = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    Ok(n)
}

/// Outcome of initial admin provisioning. The password is present only
/// when it had to be generated rather than configured.
pub struct BootstrappedAdmin {
    pub username: String,
    pub generated_password: Option<String>,
}

/// Create the initial admin account on an empty user table. With no
/// configured password a random one is generated and returned so the
/// caller can surface it once at startup. Returns `None` when accounts
/// already exist.
pub fn bootstrap_admin(
    conn: &Connection,
    configured_password: Option<&str>,
) -> Result<Option<BootstrappedAdmin>, DatabaseError> {
    if count_users(conn)? > 0 {
        return Ok(None);
    }

    let (password, generated) = match configured_password {
        Some(p) => (p.to_string(), false),
        None => (crate::auth::generate_token(), true),
    };
    let hash = crate::auth::hash_password(&password)
        .map_err(|e| DatabaseError::Validation(e.to_string()))?;

    let admin = NewUser {
        username: "admin".into(),
        password: String::new(),
        full_name: "System Administrator".into(),
        email: None,
        phone: None,
        role: Role::Admin,
        department: None,
    };
    insert_user(conn, &admin, &hash)?;

    Ok(Some(BootstrappedAdmin {
        username: admin.username,
        generated_password: generated.then_some(password),
    }))
}

// Internal row type for User mapping
struct UserRow {
    id: i64,
    username: String,
    full_name: String,
    email: Option<String>,
    phone: Option<String>,
    role: String,
    department: Option<String>,
    is_active: bool,
    created_at: String,
}

fn user_row(row: &rusqlite::Row<'_>) -> Result<UserRow, rusqlite::Error> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        full_name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        role: row.get(5)?,
        department: row.get(6)?,
        is_active: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn user_from_row(row: UserRow) -> Result<User, DatabaseError> {
    Ok(User {
        id: row.id,
        username: row.username,
        full_name: row.full_name,
        email: row.email,
        phone: row.phone,
        role: Role::from_str(&row.role)?,
        department: row.department,
        is_active: row.is_active,
        created_at: row.created_at,
    })
}
