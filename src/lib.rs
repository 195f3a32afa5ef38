//! Laboratory information management backend.
//!
//! Patients are registered by doctors, who order tests from the
//! catalog. Lab staff register samples against those requests and
//! enter results; request status is derived from the child items.
//! Admins manage staff accounts, the catalog, and reports.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod idgen;
pub mod models;
pub mod workflow;
