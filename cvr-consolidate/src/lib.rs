//! cvr-consolidate library interface
//!
//! Consolidates raw per-frame council vote observations into one canonical
//! record per agenda action, with derived meeting and member statistics.
//!
//! Pipeline: normalize → group → merge → anchor → aggregate → verify.
//! The binary wraps [`Consolidator`] with config, file I/O, and publishing.

pub mod config;
pub mod error;
pub mod fusion;
pub mod normalize;
pub mod policy;
pub mod services;
pub mod types;
pub mod validators;
pub mod workflow;

pub use crate::error::{ConsolidationError, Result};
pub use crate::policy::ConsolidationPolicy;
pub use crate::types::{ConsolidationMode, DropReason, IssueKind, ValidationIssue};
pub use crate::workflow::{ConsolidationInput, ConsolidationOutcome, Consolidator, RunReport};
