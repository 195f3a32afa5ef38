pub mod audit;
pub mod catalog;
pub mod patient;
pub mod report;
pub mod request;
pub mod result;
pub mod sample;
pub mod user;
