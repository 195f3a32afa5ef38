use serde::{Deserialize, Serialize};

use super::enums::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub department: Option<String>,
    pub is_active: bool,
    pub created_at: String,
}

/// Staff registration input. The plaintext password is hashed before
/// it reaches the repository.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub department: Option<String>,
}

/// Staff list row with per-user workload counts for the admin view.
#[derive(Debug, Clone, Serialize)]
pub struct StaffOverview {
    pub id: i64,
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub department: Option<String>,
    pub is_active: bool,
    pub total_requests: i64,
    pub total_results: i64,
}
