//! Store validation
//!
//! Post-build checks run before a store may be published.

pub mod invariants;

pub use invariants::{Invariant, InvariantChecker, InvariantViolation, ObservationLedger};
