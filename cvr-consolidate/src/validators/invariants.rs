//! Store Invariant Checker
//!
//! Verifies a freshly built store before it is allowed to replace the old one.
//!
//! # Invariants
//! 1. **Unique identity**: one record per `(meeting_id, normalized_agenda_key)`
//! 2. **Tally**: `vote_tally` equals the literal counts of `individual_votes`
//! 3. **Result**: `result` is the pure function of `vote_tally`
//! 4. **Conservation**: every accepted observation is in exactly one record's
//!    provenance, and accepted plus dropped accounts for every considered input
//! 5. **Aggregates**: meeting counts and member statistics equal a full replay
//!
//! Any violation aborts the run; nothing is written.

use crate::services::Aggregator;
use cvr_common::models::{ConsolidatedStore, MeetingCatalog, VoteResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

/// Which invariant failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Invariant {
    UniqueIdentity,
    Tally,
    Result,
    Conservation,
    Aggregates,
}

/// One invariant violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvariantViolation {
    pub invariant: Invariant,
    pub detail: String,
}

impl InvariantViolation {
    fn new(invariant: Invariant, detail: impl Into<String>) -> Self {
        Self {
            invariant,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.invariant, self.detail)
    }
}

/// Observation accounting for the conservation check
#[derive(Debug, Clone, Default)]
pub struct ObservationLedger {
    /// Provenance ids of every accepted observation (archive plus new)
    pub accepted: BTreeSet<String>,
    /// Number of observations dropped this run
    pub dropped: usize,
    /// Archived observations plus new inputs, minus inputs already archived
    pub considered: usize,
}

/// Invariant checker
pub struct InvariantChecker;

impl InvariantChecker {
    /// Check every invariant; empty result means the store is consistent
    pub fn check(
        store: &ConsolidatedStore,
        ledger: &ObservationLedger,
        catalog: &MeetingCatalog,
    ) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();

        // 1. Unique identity
        let mut seen = BTreeSet::new();
        for record in &store.votes {
            if !seen.insert(record.identity()) {
                violations.push(InvariantViolation::new(
                    Invariant::UniqueIdentity,
                    format!(
                        "duplicate record {} / {}",
                        record.meeting_id, record.normalized_agenda_key
                    ),
                ));
            }
        }

        // 2-3. Tally and result
        for record in &store.votes {
            let derived = record.derived_tally();
            if record.vote_tally != derived {
                violations.push(InvariantViolation::new(
                    Invariant::Tally,
                    format!(
                        "{} / {}: tally {:?} but votes count {:?}",
                        record.meeting_id, record.normalized_agenda_key, record.vote_tally, derived
                    ),
                ));
            }
            if record.result != VoteResult::from_tally(&record.vote_tally) {
                violations.push(InvariantViolation::new(
                    Invariant::Result,
                    format!(
                        "{} / {}: result {:?} does not follow tally",
                        record.meeting_id, record.normalized_agenda_key, record.result
                    ),
                ));
            }
        }

        // 4. Conservation
        let mut provenance: BTreeMap<&str, usize> = BTreeMap::new();
        for record in &store.votes {
            for id in &record.provenance {
                *provenance.entry(id.as_str()).or_default() += 1;
            }
        }
        for (id, count) in &provenance {
            if *count > 1 {
                violations.push(InvariantViolation::new(
                    Invariant::Conservation,
                    format!("observation {} appears in {} records", id, count),
                ));
            }
            if !ledger.accepted.contains(*id) {
                violations.push(InvariantViolation::new(
                    Invariant::Conservation,
                    format!("record provenance names unknown observation {}", id),
                ));
            }
        }
        for id in &ledger.accepted {
            if !provenance.contains_key(id.as_str()) {
                violations.push(InvariantViolation::new(
                    Invariant::Conservation,
                    format!("accepted observation {} is in no record", id),
                ));
            }
        }
        if ledger.accepted.len() + ledger.dropped != ledger.considered {
            violations.push(InvariantViolation::new(
                Invariant::Conservation,
                format!(
                    "{} accepted + {} dropped != {} considered",
                    ledger.accepted.len(),
                    ledger.dropped,
                    ledger.considered
                ),
            ));
        }

        // 5. Aggregates
        let replay = Aggregator::aggregate(&store.votes, catalog, &store.meetings);
        if replay.meetings != store.meetings {
            violations.push(InvariantViolation::new(
                Invariant::Aggregates,
                "meeting counts differ from a full replay",
            ));
        }
        if replay.summary != store.summary {
            violations.push(InvariantViolation::new(
                Invariant::Aggregates,
                "store summary differs from a full replay",
            ));
        }
        if replay.councilmember_stats != store.councilmember_stats
            || replay.councilmembers != store.councilmembers
        {
            violations.push(InvariantViolation::new(
                Invariant::Aggregates,
                "member statistics differ from a full replay",
            ));
        }
        for (member, stats) in &store.councilmember_stats {
            if stats.total_votes != stats.bucket_sum() {
                violations.push(InvariantViolation::new(
                    Invariant::Aggregates,
                    format!("{}: total {} != bucket sum {}", member, stats.total_votes, stats.bucket_sum()),
                ));
            }
        }
        let member_total: u64 = store
            .councilmember_stats
            .values()
            .map(|s| u64::from(s.total_votes))
            .sum();
        let vote_total: u64 = store
            .votes
            .iter()
            .map(|r| r.individual_votes.len() as u64)
            .sum();
        if member_total != vote_total {
            violations.push(InvariantViolation::new(
                Invariant::Aggregates,
                format!(
                    "member totals {} != individual votes {}",
                    member_total, vote_total
                ),
            ));
        }

        debug!(
            records = store.votes.len(),
            violations = violations.len(),
            "Checked store invariants"
        );
        violations
    }
}
