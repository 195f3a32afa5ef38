use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCatalogEntry {
    pub id: i64,
    pub test_code: String,
    pub test_name: String,
    pub category: String,
    pub description: Option<String>,
    pub sample_type: Option<String>,
    pub reference_range: Option<String>,
    pub units: Option<String>,
    /// Expected turnaround in hours.
    pub turnaround_time: Option<i64>,
    pub price: f64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCatalogEntry {
    pub test_code: String,
    pub test_name: String,
    pub category: String,
    pub description: Option<String>,
    pub sample_type: Option<String>,
    pub reference_range: Option<String>,
    pub units: Option<String>,
    pub turnaround_time: Option<i64>,
    pub price: f64,
}
