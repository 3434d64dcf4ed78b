//! qtriage - Security Questionnaire Triage
//!
//! Submits security questionnaires to an answering service, normalizes the
//! suggested answers, classifies each by confidence and supports a reviewer
//! approve/reject pass ending in a CSV export.

pub mod cli;
pub mod client;
pub mod confidence;
pub mod config;
pub mod error;
pub mod export;
pub mod filtering;
pub mod ingestion;
pub mod references;
pub mod submission;
pub mod triage;

pub use error::{Result, TriageError};
