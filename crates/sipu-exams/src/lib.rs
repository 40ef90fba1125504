pub mod config;
pub mod error;
pub mod exams;
pub mod telemetry;
