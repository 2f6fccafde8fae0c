//! Recruitment engine for the ISER job board: application lifecycle, document
//! requirements and exemptions, interview scheduling, and committee evaluation.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
