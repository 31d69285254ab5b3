//! Quote Intake — step-sequenced insurance quote questionnaire.

pub mod config;
pub mod error;
pub mod intake;
pub mod routes;
pub mod submission;
pub mod vehicles;
