//! Post-merge services
//!
//! - Anchor matcher: links canonical records to video positions
//! - Aggregator: derives meetings, member statistics, and the store summary

pub mod aggregator;
pub mod anchor_matcher;

pub use aggregator::{Aggregates, Aggregator};
pub use anchor_matcher::{AnchorMatch, AnchorMatcher, AnchorPolicy, CategoryOffsets};
