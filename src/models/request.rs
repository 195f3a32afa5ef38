use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::{ItemPriority, ItemStatus, RequestStatus, Urgency};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRequest {
    pub id: i64,
    /// Human-readable code, e.g. `R202501230042`.
    pub request_id: String,
    pub patient_id: i64,
    pub doctor_id: i64,
    pub clinical_info: Option<String>,
    pub provisional_diagnosis: Option<String>,
    pub urgency: Urgency,
    pub status: RequestStatus,
    pub collection_date: Option<NaiveDate>,
    pub collection_time: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRequestItem {
    pub id: i64,
    pub request_id: i64,
    pub test_id: i64,
    pub priority: ItemPriority,
    pub status: ItemStatus,
}

/// One catalog test selected on the request form, with its priority.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestedTest {
    pub test_id: i64,
    #[serde(default = "default_priority")]
    pub priority: ItemPriority,
}

fn default_priority() -> ItemPriority {
    ItemPriority::Normal
}

/// Doctor's test-request submission. The patient is looked up by the
/// human-readable patient code, matching the original form.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTestRequest {
    pub patient_code: String,
    pub clinical_info: Option<String>,
    pub provisional_diagnosis: Option<String>,
    pub urgency: Urgency,
    pub collection_date: Option<NaiveDate>,
    pub collection_time: Option<String>,
    pub notes: Option<String>,
    pub tests: Vec<RequestedTest>,
}
