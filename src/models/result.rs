use serde::{Deserialize, Serialize};

use super::enums::ResultStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub id: i64,
    pub test_item_id: i64,
    pub result_value: String,
    pub result_status: ResultStatus,
    pub reference_range: Option<String>,
    pub units: Option<String>,
    pub method: Option<String>,
    pub comments: Option<String>,
    pub performed_by: i64,
    pub performed_date: String,
    pub verified_by: Option<i64>,
    pub verified_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewResult {
    pub test_item_id: i64,
    pub result_value: String,
    pub result_status: ResultStatus,
    pub reference_range: Option<String>,
    pub units: Option<String>,
    pub method: Option<String>,
    pub comments: Option<String>,
}
