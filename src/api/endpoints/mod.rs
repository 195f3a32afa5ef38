//! API endpoint handlers.
//!
//! Each module corresponds to one area of the system: authentication,
//! patient registry, the request/sample/result workflow, catalog and
//! staff administration, and reporting.

pub mod auth;
pub mod catalog;
pub mod health;
pub mod patients;
pub mod reports;
pub mod requests;
pub mod results;
pub mod samples;
pub mod staff;
