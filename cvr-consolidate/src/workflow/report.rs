//! Consolidation Run Report
//!
//! **Purpose:** Everything a run did, written next to the store for audit:
//! what was accepted, dropped, merged, rebuilt, anchored, and flagged.

use crate::types::{ConsolidationMode, DroppedObservation, IssueKind, ValidationIssue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// **Admission Statistics**
///
/// Display: "N received, M new, K known, D dropped"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionStats {
    /// Observations in this run's input
    pub observations_received: usize,
    /// Inputs accepted as new observations
    pub observations_new: usize,
    /// Inputs identical to an archived observation
    pub observations_known: usize,
    /// Archive plus new after admission
    pub observations_accepted: usize,
}

impl AdmissionStats {
    pub fn display_string(&self, dropped: usize) -> String {
        format!(
            "{} received, {} new, {} known, {} dropped",
            self.observations_received, self.observations_new, self.observations_known, dropped
        )
    }
}

/// **Merge Statistics**
///
/// Display: "N records (R rebuilt, U unchanged), G duplicate groups merging M observations"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    /// Rebuilt groups with more than one observation
    pub duplicate_groups: usize,
    /// Observations folded into another observation's record
    pub observations_merged: usize,
    pub records_total: usize,
    pub records_rebuilt: usize,
    pub records_unchanged: usize,
}

impl MergeStats {
    pub fn display_string(&self) -> String {
        format!(
            "{} records ({} rebuilt, {} unchanged), {} duplicate groups merging {} observations",
            self.records_total,
            self.records_rebuilt,
            self.records_unchanged,
            self.duplicate_groups,
            self.observations_merged
        )
    }
}

/// Report for one consolidation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub mode: ConsolidationMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(flatten)]
    pub admission: AdmissionStats,
    pub dropped: Vec<DroppedObservation>,
    #[serde(flatten)]
    pub merge: MergeStats,
    pub anchors_matched: usize,
    pub anchors_estimated: usize,
    pub issues: Vec<ValidationIssue>,
    /// SHA-256 of the serialized store this run produced
    pub store_digest: String,
}

impl RunReport {
    /// Issue counts by kind
    pub fn issue_counts(&self) -> BTreeMap<IssueKind, usize> {
        let mut counts = BTreeMap::new();
        for issue in &self.issues {
            *counts.entry(issue.kind).or_default() += 1;
        }
        counts
    }

    /// One-line summary for logs
    pub fn display_string(&self) -> String {
        format!(
            "{} run: {}; {}; anchors {} matched, {} estimated; {} issues",
            self.mode,
            self.admission.display_string(self.dropped.len()),
            self.merge.display_string(),
            self.anchors_matched,
            self.anchors_estimated,
            self.issues.len()
        )
    }
}
