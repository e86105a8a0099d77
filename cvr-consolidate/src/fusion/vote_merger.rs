//! Vote Merger
//!
//! Fuses one observation group into a canonical vote record.
//!
//! # Merge rules
//! - Observations are ranked by quality score (descending), then lowest frame
//!   number, then smallest provenance id
//! - Display text is the longest agenda text; ties go to the higher rank
//! - Each member's choice comes from the highest-ranked observation that has
//!   one; lower-ranked disagreements are reported, never voted on
//! - Tally and result are always recomputed from the merged votes
//!
//! Anchors are attached later by the anchor matcher.

use crate::error::{ConsolidationError, Result};
use crate::fusion::grouper::ObservationGroup;
use crate::fusion::quality_scorer::QualityScorer;
use crate::normalize::NormalizedObservation;
use crate::types::{IssueKind, ValidationIssue};
use cvr_common::models::{CanonicalVoteRecord, VoteChoice, VoteTally};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

/// Merged record plus the issues found while merging
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub record: CanonicalVoteRecord,
    pub issues: Vec<ValidationIssue>,
}

/// Vote merger
pub struct VoteMerger {
    scorer: QualityScorer,
}

impl VoteMerger {
    pub fn new(scorer: QualityScorer) -> Self {
        Self { scorer }
    }

    pub fn scorer(&self) -> &QualityScorer {
        &self.scorer
    }

    /// Observations of a group in merge rank order, with their scores
    pub fn rank<'a>(
        &self,
        observations: &'a [NormalizedObservation],
    ) -> Vec<(i64, &'a NormalizedObservation)> {
        let mut ranked: Vec<(i64, &NormalizedObservation)> = observations
            .iter()
            .map(|o| (self.scorer.score(&o.raw), o))
            .collect();
        ranked.sort_by(|(sa, a), (sb, b)| {
            sb.cmp(sa)
                .then_with(|| match (a.frame_number(), b.frame_number()) {
                    (Some(fa), Some(fb)) => fa.cmp(&fb),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                })
                .then_with(|| a.provenance_id.cmp(&b.provenance_id))
        });
        ranked
    }

    /// Merge a group into one canonical record
    pub fn merge(&self, group: &ObservationGroup) -> Result<MergeOutcome> {
        if group.observations.is_empty() {
            return Err(ConsolidationError::EmptyGroup(format!(
                "{} / {}",
                group.meeting_id, group.group_key
            )));
        }

        let ranked = self.rank(&group.observations);
        let mut issues = Vec::new();

        let mut display_text = String::new();
        for (_, obs) in &ranked {
            if obs.agenda_text.chars().count() > display_text.chars().count() {
                display_text = obs.agenda_text.clone();
            }
        }

        // member -> (choice, provenance id it came from)
        let mut votes: BTreeMap<String, (VoteChoice, &str)> = BTreeMap::new();
        for (_, obs) in &ranked {
            for (member, choice) in &obs.votes {
                match votes.get(member).copied() {
                    None => {
                        votes.insert(member.clone(), (*choice, obs.provenance_id.as_str()));
                    }
                    Some((kept, from)) if kept != *choice => {
                        issues.push(
                            ValidationIssue::new(
                                IssueKind::VoteConflict,
                                group.meeting_id.clone(),
                                obs.provenance_id.clone(),
                                format!(
                                    "{} kept from {}; conflicting {} ignored",
                                    kept, from, choice
                                ),
                            )
                            .with_agenda_key(group.group_key.clone())
                            .with_member(member.clone()),
                        );
                    }
                    Some(_) => {}
                }
            }
        }
        let individual_votes: BTreeMap<String, VoteChoice> =
            votes.into_iter().map(|(m, (c, _))| (m, c)).collect();

        let vote_tally = VoteTally::from_choices(individual_votes.values());
        let result = vote_tally.result();

        if let Some((_, reporter)) = ranked.iter().find(|(_, o)| o.raw.vote_tally.is_some()) {
            if let Some(reported) = reporter.raw.vote_tally {
                if reported != vote_tally {
                    issues.push(
                        ValidationIssue::new(
                            IssueKind::TallyMismatch,
                            group.meeting_id.clone(),
                            reporter.provenance_id.clone(),
                            format!(
                                "reported {}-{}-{}-{}, derived {}-{}-{}-{}",
                                reported.ayes,
                                reported.noes,
                                reported.abstentions,
                                reported.recused,
                                vote_tally.ayes,
                                vote_tally.noes,
                                vote_tally.abstentions,
                                vote_tally.recused
                            ),
                        )
                        .with_agenda_key(group.group_key.clone()),
                    );
                }
            }
        }

        let source_frame_reference = ranked.iter().find_map(|(_, o)| {
            o.raw
                .source_frame_reference
                .as_deref()
                .filter(|r| !r.trim().is_empty())
                .map(str::to_string)
        });

        let record = CanonicalVoteRecord {
            meeting_id: group.meeting_id.clone(),
            normalized_agenda_key: group.group_key.clone(),
            agenda_display_text: display_text,
            frame_number: group.min_frame(),
            individual_votes,
            vote_tally,
            result,
            anchor: None,
            source_frame_reference,
            provenance: ranked.iter().map(|(_, o)| o.provenance_id.clone()).collect(),
        };

        debug!(
            meeting_id = %record.meeting_id,
            key = %record.normalized_agenda_key,
            observations = ranked.len(),
            best_score = ranked[0].0,
            votes = record.individual_votes.len(),
            result = ?record.result,
            "Merged group"
        );

        Ok(MergeOutcome { record, issues })
    }
}

impl Default for VoteMerger {
    fn default() -> Self {
        Self::new(QualityScorer::new())
    }
}
