use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::SampleStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    pub id: i64,
    /// Human-readable code, e.g. `S202501230007`.
    pub sample_id: String,
    pub request_id: i64,
    pub sample_type: String,
    pub volume: Option<String>,
    pub collection_date: NaiveDate,
    pub collected_by: Option<String>,
    pub condition_on_receipt: String,
    pub status: SampleStatus,
    pub storage_location: Option<String>,
    pub storage_temperature: String,
    pub notes: Option<String>,
    pub received_by: Option<i64>,
    pub received_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSample {
    pub request_id: i64,
    pub sample_type: String,
    pub volume: Option<String>,
    pub collection_date: NaiveDate,
    pub collected_by: Option<String>,
    #[serde(default = "default_condition")]
    pub condition_on_receipt: String,
    pub storage_location: Option<String>,
    #[serde(default = "default_temperature")]
    pub storage_temperature: String,
    pub notes: Option<String>,
}

fn default_condition() -> String {
    "Good".to_string()
}

fn default_temperature() -> String {
    "Room Temperature".to_string()
}

/// Status-update form for an existing sample.
#[derive(Debug, Clone, Deserialize)]
pub struct SampleStatusUpdate {
    pub status: SampleStatus,
    pub notes: Option<String>,
    pub storage_location: Option<String>,
    pub storage_temperature: Option<String>,
}
