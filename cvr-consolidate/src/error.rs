//! Error types for cvr-consolidate
//!
//! Per-observation problems are not errors: they become drop entries or
//! validation issues in the run report. A `ConsolidationError` means the run
//! produced no store.

use crate::validators::InvariantViolation;
use thiserror::Error;

/// Engine result type
pub type Result<T> = std::result::Result<T, ConsolidationError>;

/// Fatal consolidation errors
#[derive(Debug, Error)]
pub enum ConsolidationError {
    /// Merger was handed a group with no observations
    #[error("Cannot merge empty observation group: {0}")]
    EmptyGroup(String),

    /// Store failed one or more invariants after merge/aggregate
    #[error("Structural inconsistency: {} invariant violation(s); first: {}",
        .0.len(),
        .0.first().map(|v| v.to_string()).unwrap_or_default())]
    StructuralInconsistency(Vec<InvariantViolation>),

    /// Run was cancelled before producing a store
    #[error("Consolidation cancelled")]
    Cancelled,

    /// cvr-common error (store encoding, I/O)
    #[error("Common error: {0}")]
    Common(#[from] cvr_common::Error),
}
