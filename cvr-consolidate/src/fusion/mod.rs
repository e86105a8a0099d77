// Fusion Module
//
// Grouper → Quality Scorer → Merger: turns normalized observations into one
// canonical record per ballot.

pub mod grouper;
pub mod quality_scorer;
pub mod vote_merger;

pub use grouper::{DuplicateGrouper, ObservationGroup, PartitionKey};
pub use quality_scorer::{QualityScorer, ScoreBreakdown, ScoringWeights};
pub use vote_merger::{MergeOutcome, VoteMerger};
