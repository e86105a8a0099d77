//! Quality Scorer
//!
//! Ranks observations of the same ballot so the merger can pick a base.
//!
//! # Scoring Algorithm
//! Additive integer score; every weight is tunable through `ScoringWeights`:
//! - **Supplied id** (+100): observation carries its own non-empty id
//! - **Vote entries** (+10 each): individual votes extracted
//! - **Tally units** (+5 each): reported tally total
//! - **Description** (+1 per char, capped at 200): agenda text length
//! - **Source reference** (+20): frame image reference present
//! - **Truncation** (−40): description ends in an ellipsis, is shorter than
//!   15 characters, or is only an agenda number
//! - **False pass** (−30): result text claims "pass" while reported ayes is 0
//!
//! "Reported ayes" is the tally's ayes when a tally is present, otherwise the
//! number of raw choice tokens that read as YES.

use crate::normalize::agenda::looks_truncated;
use crate::normalize::normalize_choice;
use cvr_common::models::{RawVoteObservation, VoteChoice};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Weight table (`[policy.weights]`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub supplied_id: i64,
    pub per_vote_entry: i64,
    pub per_tally_unit: i64,
    pub per_description_char: i64,
    pub description_char_cap: usize,
    pub source_reference: i64,
    pub truncated_description: i64,
    pub false_pass: i64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            supplied_id: 100,
            per_vote_entry: 10,
            per_tally_unit: 5,
            per_description_char: 1,
            description_char_cap: 200,
            source_reference: 20,
            truncated_description: -40,
            false_pass: -30,
        }
    }
}

/// Per-component score for one observation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub supplied_id: i64,
    pub vote_entries: i64,
    pub tally_units: i64,
    pub description: i64,
    pub source_reference: i64,
    pub truncation: i64,
    pub false_pass: i64,
    pub total: i64,
}

/// Quality scorer
pub struct QualityScorer {
    weights: ScoringWeights,
}

impl QualityScorer {
    /// Create scorer with default weights
    pub fn new() -> Self {
        Self::with_weights(ScoringWeights::default())
    }

    pub fn with_weights(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Total score of an observation
    pub fn score(&self, observation: &RawVoteObservation) -> i64 {
        self.breakdown(observation).total
    }

    /// Score with each component separated
    pub fn breakdown(&self, observation: &RawVoteObservation) -> ScoreBreakdown {
        let w = &self.weights;
        let description = observation.agenda_text();

        let mut b = ScoreBreakdown::default();

        if observation.supplied_id().is_some() {
            b.supplied_id = w.supplied_id;
        }

        b.vote_entries = observation.individual_votes.len() as i64 * w.per_vote_entry;

        if let Some(tally) = &observation.vote_tally {
            let units = i64::try_from(tally.total()).unwrap_or(i64::MAX);
            b.tally_units = units.saturating_mul(w.per_tally_unit);
        }

        let chars = description.trim().chars().count().min(w.description_char_cap);
        b.description = chars as i64 * w.per_description_char;

        if observation
            .source_frame_reference
            .as_deref()
            .is_some_and(|r| !r.trim().is_empty())
        {
            b.source_reference = w.source_reference;
        }

        if looks_truncated(&description) {
            b.truncation = w.truncated_description;
        }

        if claims_pass(observation) && reported_ayes(observation) == 0 {
            b.false_pass = w.false_pass;
        }

        b.total = [
            b.supplied_id,
            b.vote_entries,
            b.tally_units,
            b.description,
            b.source_reference,
            b.truncation,
            b.false_pass,
        ]
        .into_iter()
        .fold(0i64, i64::saturating_add);

        debug!(
            meeting_id = %observation.meeting_id,
            observation = %observation.provenance_id(),
            score = b.total,
            "Scored observation"
        );
        b
    }
}

impl Default for QualityScorer {
    fn default() -> Self {
        Self::new()
    }
}

fn claims_pass(observation: &RawVoteObservation) -> bool {
    observation
        .result
        .as_deref()
        .is_some_and(|r| r.to_lowercase().contains("pass"))
}

/// Ayes as the source reported them
fn reported_ayes(observation: &RawVoteObservation) -> u32 {
    match &observation.vote_tally {
        Some(tally) => tally.ayes,
        None => observation
            .individual_votes
            .values()
            .filter(|c| normalize_choice(c) == Some(VoteChoice::Yes))
            .count() as u32,
    }
}
