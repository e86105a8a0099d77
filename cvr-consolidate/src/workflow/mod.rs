//! Consolidation workflow
//!
//! - Orchestrator: runs one consolidation from existing store plus inputs
//! - Report: what the run did, serialized next to the store

pub mod orchestrator;
pub mod report;

pub use orchestrator::{ConsolidationInput, ConsolidationOutcome, Consolidator};
pub use report::{AdmissionStats, MergeStats, RunReport};
