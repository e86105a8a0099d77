//! Consolidation Orchestrator
//!
//! **Purpose:** Turn an existing store plus a batch of raw observations into
//! the next store snapshot.
//!
//! # Pipeline
//! 1. **Admission**: structural drops, duplicate-id detection, archive union
//! 2. **Normalize**: agenda keys, member names, choice tokens
//! 3. **Partition**: `(meeting, key)` after truncated-prefix absorption
//! 4. **Rebuild or copy**: group and merge dirty partitions; copy clean ones
//! 5. **Anchor**: match rebuilt records to scraped anchors, else estimate
//! 6. **Aggregate**: full replay of meetings and member statistics
//! 7. **Verify**: invariant check; any violation aborts the run
//!
//! The existing store is never modified. The caller publishes the returned
//! snapshot (or not, for a dry run).
//!
//! # Incremental mode
//! A partition is clean when it holds no new observation and the records
//! previously built from it cover exactly its observation ids. Clean
//! partitions keep their records verbatim, anchors included; everything
//! else is rebuilt the same way a full run would.

use crate::error::{ConsolidationError, Result};
use crate::fusion::grouper::PartitionKey;
use crate::fusion::{DuplicateGrouper, QualityScorer, VoteMerger};
use crate::normalize::{normalize_agenda, NormalizedObservation, Normalizer};
use crate::policy::ConsolidationPolicy;
use crate::services::{Aggregator, AnchorMatcher};
use crate::types::{ConsolidationMode, DropReason, DroppedObservation, ValidationIssue};
use crate::validators::{InvariantChecker, ObservationLedger};
use crate::workflow::report::{AdmissionStats, MergeStats, RunReport};
use chrono::Utc;
use cvr_common::models::{
    AnchorCandidates, CanonicalVoteRecord, ConsolidatedStore, MeetingCatalog, RawVoteObservation,
};
use std::collections::{BTreeMap, BTreeSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Inputs of one run besides the existing store
#[derive(Debug, Clone, Default)]
pub struct ConsolidationInput {
    pub observations: Vec<RawVoteObservation>,
    /// Scraped anchors per meeting; meetings without an entry get estimates
    pub anchors: AnchorCandidates,
    /// Known meeting dates and titles
    pub meetings: MeetingCatalog,
}

/// New store snapshot plus the report describing how it was built
#[derive(Debug, Clone)]
pub struct ConsolidationOutcome {
    pub store: ConsolidatedStore,
    pub report: RunReport,
}

/// Result of the admission stage
struct Admission {
    /// Archive plus newly accepted observations, flagged new or not
    accepted: Vec<(RawVoteObservation, bool)>,
    dropped: Vec<DroppedObservation>,
    stats: AdmissionStats,
    considered: usize,
}

/// Consolidation orchestrator
pub struct Consolidator {
    normalizer: Normalizer,
    grouper: DuplicateGrouper,
    merger: VoteMerger,
    anchors: AnchorMatcher,
}

impl Consolidator {
    pub fn new(policy: ConsolidationPolicy) -> Self {
        Self {
            normalizer: Normalizer::new(&policy.roster, policy.unknown_choice),
            grouper: DuplicateGrouper::with_settings(policy.proximity_window, policy.min_key_chars),
            merger: VoteMerger::new(QualityScorer::with_weights(policy.weights)),
            anchors: AnchorMatcher::with_policy(policy.anchor),
        }
    }

    /// Run consolidation to completion
    pub fn consolidate(
        &self,
        existing: &ConsolidatedStore,
        input: ConsolidationInput,
        mode: ConsolidationMode,
    ) -> Result<ConsolidationOutcome> {
        self.consolidate_with_cancel(existing, input, mode, &CancellationToken::new())
    }

    /// Run consolidation, checking `cancel` between partitions
    ///
    /// A cancelled run returns [`ConsolidationError::Cancelled`] and no store.
    pub fn consolidate_with_cancel(
        &self,
        existing: &ConsolidatedStore,
        input: ConsolidationInput,
        mode: ConsolidationMode,
        cancel: &CancellationToken,
    ) -> Result<ConsolidationOutcome> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();
        let ConsolidationInput {
            observations,
            anchors,
            meetings: catalog,
        } = input;

        info!(
            run_id = %run_id,
            mode = %mode,
            received = observations.len(),
            archived = existing.observations.len(),
            existing_records = existing.votes.len(),
            "Starting consolidation"
        );

        // ========================================================================
        // 1. Admission
        // ========================================================================
        let admission = admit(&existing.observations, observations);
        for dropped in &admission.dropped {
            warn!(observation = %dropped.observation_id, reason = %dropped.reason, "Observation dropped");
        }

        let mut archive: Vec<RawVoteObservation> =
            admission.accepted.iter().map(|(raw, _)| raw.clone()).collect();
        archive.sort_by_cached_key(|raw| raw.provenance_id());

        let ledger = ObservationLedger {
            accepted: archive.iter().map(|raw| raw.provenance_id()).collect(),
            dropped: admission.dropped.len(),
            considered: admission.considered,
        };

        // ========================================================================
        // 2-3. Normalize and partition
        // ========================================================================
        let normalized: Vec<NormalizedObservation> = admission
            .accepted
            .into_iter()
            .map(|(raw, is_new)| self.normalizer.normalize(raw, is_new))
            .collect();
        let partitions = self.grouper.partition(normalized);

        let reusable = match mode {
            ConsolidationMode::Full => BTreeMap::new(),
            ConsolidationMode::Incremental => clean_partitions(&partitions, &existing.votes),
        };

        // ========================================================================
        // 4-5. Rebuild or copy, then anchor
        // ========================================================================
        let mut records: Vec<CanonicalVoteRecord> = Vec::new();
        let mut issues: Vec<ValidationIssue> = Vec::new();
        let mut merge = MergeStats::default();
        let mut anchors_matched = 0;
        let mut anchors_estimated = 0;

        for (key, members) in partitions {
            if cancel.is_cancelled() {
                info!(run_id = %run_id, "Consolidation cancelled");
                return Err(ConsolidationError::Cancelled);
            }

            if let Some(kept) = reusable.get(&key) {
                debug!(meeting_id = %key.0, key = %key.1, records = kept.len(), "Partition unchanged");
                merge.records_unchanged += kept.len();
                records.extend(kept.iter().map(|record| (*record).clone()));
                continue;
            }

            for obs in &members {
                issues.extend(obs.issues.iter().cloned());
            }

            for group in self.grouper.group_partition(&key, members) {
                if group.observations.len() > 1 {
                    merge.duplicate_groups += 1;
                    merge.observations_merged += group.observations.len() - 1;
                }

                let outcome = self.merger.merge(&group)?;
                issues.extend(outcome.issues);

                let mut record = outcome.record;
                let matched = self
                    .anchors
                    .match_record(&record, anchors.get(&record.meeting_id));
                if matched.is_estimated() {
                    anchors_estimated += 1;
                } else {
                    anchors_matched += 1;
                }
                record.anchor = Some(matched.into_anchor());

                merge.records_rebuilt += 1;
                records.push(record);
            }
        }

        records.sort_by(|a, b| {
            a.meeting_id
                .cmp(&b.meeting_id)
                .then_with(|| a.normalized_agenda_key.cmp(&b.normalized_agenda_key))
        });
        merge.records_total = records.len();

        // ========================================================================
        // 6. Aggregate
        // ========================================================================
        let aggregates = Aggregator::aggregate(&records, &catalog, &existing.meetings);
        let store = ConsolidatedStore {
            votes: records,
            meetings: aggregates.meetings,
            councilmembers: aggregates.councilmembers,
            councilmember_stats: aggregates.councilmember_stats,
            summary: aggregates.summary,
            observations: archive,
        };

        // ========================================================================
        // 7. Verify
        // ========================================================================
        let violations = InvariantChecker::check(&store, &ledger, &catalog);
        if !violations.is_empty() {
            for violation in &violations {
                warn!(violation = %violation, "Invariant violated");
            }
            return Err(ConsolidationError::StructuralInconsistency(violations));
        }

        let report = RunReport {
            run_id,
            mode,
            started_at,
            finished_at: Utc::now(),
            admission: admission.stats,
            dropped: admission.dropped,
            merge,
            anchors_matched,
            anchors_estimated,
            issues,
            store_digest: cvr_common::store::store_digest(&store)?,
        };

        info!(run_id = %run_id, "{}", report.display_string());
        Ok(ConsolidationOutcome { store, report })
    }
}

impl Default for Consolidator {
    fn default() -> Self {
        Self::new(ConsolidationPolicy::default())
    }
}

/// Admit archived and incoming observations
///
/// Archived observations are always accepted (first occurrence of an id wins).
/// Incoming observations are visited in `(provenance id, digest)` order so the
/// outcome does not depend on input order. Only a match against the archive
/// counts as known; a repeat within the batch is dropped so every input is
/// either accepted, known, or listed as dropped.
fn admit(archive: &[RawVoteObservation], incoming: Vec<RawVoteObservation>) -> Admission {
    let mut digests: BTreeMap<String, String> = BTreeMap::new();
    let mut accepted = Vec::new();

    for raw in archive {
        let id = raw.provenance_id();
        if digests.contains_key(&id) {
            warn!(observation = %id, "Archive holds a repeated observation id; keeping the first");
            continue;
        }
        digests.insert(id, raw.content_digest());
        accepted.push((raw.clone(), false));
    }
    let archived = accepted.len();

    let mut admitted_now: BTreeSet<String> = BTreeSet::new();
    let mut stats = AdmissionStats {
        observations_received: incoming.len(),
        ..Default::default()
    };
    let mut dropped = Vec::new();

    let mut incoming: Vec<(String, String, RawVoteObservation)> = incoming
        .into_iter()
        .map(|raw| (raw.provenance_id(), raw.content_digest(), raw))
        .collect();
    incoming.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    for (id, digest, raw) in incoming {
        let reason = if raw.meeting_id.trim().is_empty() {
            Some(DropReason::MissingMeetingId)
        } else if normalize_agenda(raw.agenda_item.as_ref()).is_empty() && raw.frame_number.is_none()
        {
            Some(DropReason::MissingAgendaIdentity)
        } else {
            match digests.get(&id) {
                Some(seen) if *seen == digest && admitted_now.contains(&id) => {
                    Some(DropReason::DuplicateObservation)
                }
                Some(seen) if *seen == digest => {
                    stats.observations_known += 1;
                    continue;
                }
                Some(_) => Some(DropReason::DuplicateObservationId),
                None => None,
            }
        };

        match reason {
            Some(reason) => dropped.push(DroppedObservation {
                observation_id: id,
                reason,
            }),
            None => {
                admitted_now.insert(id.clone());
                digests.insert(id, digest);
                stats.observations_new += 1;
                accepted.push((raw, true));
            }
        }
    }

    stats.observations_accepted = accepted.len();
    let considered = archived + stats.observations_received - stats.observations_known;
    debug!(
        archived,
        new = stats.observations_new,
        known = stats.observations_known,
        dropped = dropped.len(),
        "Admission complete"
    );

    Admission {
        accepted,
        dropped,
        stats,
        considered,
    }
}

/// Existing records that can be kept verbatim, by partition
fn clean_partitions<'a>(
    partitions: &BTreeMap<PartitionKey, Vec<NormalizedObservation>>,
    existing: &'a [CanonicalVoteRecord],
) -> BTreeMap<PartitionKey, Vec<&'a CanonicalVoteRecord>> {
    let mut location: BTreeMap<&str, &PartitionKey> = BTreeMap::new();
    let mut dirty: BTreeSet<&PartitionKey> = BTreeSet::new();
    for (key, members) in partitions {
        for obs in members {
            location.insert(obs.provenance_id.as_str(), key);
            if obs.is_new {
                dirty.insert(key);
            }
        }
    }

    let mut owned: BTreeMap<&PartitionKey, Vec<&CanonicalVoteRecord>> = BTreeMap::new();
    for record in existing {
        let homes: BTreeSet<Option<&PartitionKey>> = record
            .provenance
            .iter()
            .map(|id| location.get(id.as_str()).copied())
            .collect();
        let mut known_homes = homes.iter().flatten().copied();
        match (homes.len(), known_homes.next()) {
            (1, Some(home)) => owned.entry(home).or_default().push(record),
            _ => dirty.extend(homes.into_iter().flatten()),
        }
    }

    let mut clean = BTreeMap::new();
    for (key, members) in partitions {
        if dirty.contains(key) {
            continue;
        }
        let Some(records) = owned.remove(key) else {
            continue;
        };

        let expected: BTreeSet<&str> = members.iter().map(|o| o.provenance_id.as_str()).collect();
        let covered: Vec<&str> = records
            .iter()
            .flat_map(|r| r.provenance.iter().map(String::as_str))
            .collect();
        let covered_set: BTreeSet<&str> = covered.iter().copied().collect();
        if covered.len() == covered_set.len() && covered_set == expected {
            clean.insert(key.clone(), records);
        }
    }
    clean
}
