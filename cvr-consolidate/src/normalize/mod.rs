//! Normalizer
//!
//! Canonicalizes agenda text, member names, and vote choice tokens so that
//! observations of the same ballot compare equal. Every rejected or doubtful
//! vote entry is reported as a validation issue; nothing is guessed.

pub mod agenda;
pub mod choice;
pub mod member;

pub use agenda::{is_weak_key, normalize_agenda, normalize_agenda_text};
pub use choice::{normalize_choice, UnknownChoicePolicy};
pub use member::{MatchConfidence, MemberMatch, MemberNormalizer, RosterConfig, RosterMember};

use crate::types::{IssueKind, ValidationIssue};
use cvr_common::models::{RawVoteObservation, VoteChoice};
use std::collections::BTreeMap;

/// Observation with its normalized identity and votes
#[derive(Debug, Clone)]
pub struct NormalizedObservation {
    pub provenance_id: String,
    /// Whether the observation arrived in this run (not from the archive)
    pub is_new: bool,
    pub agenda_key: String,
    /// Display form of the agenda item, as extracted
    pub agenda_text: String,
    /// Lower-case, whitespace-collapsed agenda text
    pub full_text: String,
    pub votes: BTreeMap<String, VoteChoice>,
    pub issues: Vec<ValidationIssue>,
    pub raw: RawVoteObservation,
}

impl NormalizedObservation {
    pub fn frame_number(&self) -> Option<u64> {
        self.raw.frame_number
    }

    pub fn meeting_id(&self) -> &str {
        self.raw.meeting_id.trim()
    }
}

/// Applies agenda, member, and choice normalization to raw observations
#[derive(Debug, Clone)]
pub struct Normalizer {
    members: MemberNormalizer,
    unknown_choice: UnknownChoicePolicy,
}

impl Normalizer {
    pub fn new(roster: &RosterConfig, unknown_choice: UnknownChoicePolicy) -> Self {
        Self {
            members: MemberNormalizer::new(roster),
            unknown_choice,
        }
    }

    /// Normalize one observation
    ///
    /// Vote entries are visited in raw-name order; when two raw names resolve
    /// to the same member the first one's choice is kept.
    pub fn normalize(&self, raw: RawVoteObservation, is_new: bool) -> NormalizedObservation {
        let provenance_id = raw.provenance_id();
        let meeting_id = raw.meeting_id.trim().to_string();
        let agenda_text = raw.agenda_text();
        let agenda_key = normalize_agenda(raw.agenda_item.as_ref());
        let full_text = agenda::full_text_key(raw.agenda_item.as_ref());

        let mut votes = BTreeMap::new();
        let mut issues = Vec::new();
        let issue = |kind: IssueKind, detail: String| {
            ValidationIssue::new(kind, meeting_id.clone(), provenance_id.clone(), detail)
                .with_agenda_key(agenda_key.clone())
        };

        for (raw_name, raw_choice) in &raw.individual_votes {
            let Some(member) = self.members.normalize(raw_name) else {
                issues.push(issue(
                    IssueKind::BlankMemberName,
                    format!("vote entry with blank member name (choice {:?})", raw_choice),
                ));
                continue;
            };

            if !member.is_recognized() {
                issues.push(
                    issue(
                        IssueKind::UnrecognizedMember,
                        format!("member {:?} not on roster; kept verbatim", raw_name),
                    )
                    .with_member(member.name.clone()),
                );
            }

            let choice = match normalize_choice(raw_choice) {
                Some(choice) => choice,
                None => match self.unknown_choice {
                    UnknownChoicePolicy::Reject => {
                        issues.push(
                            issue(
                                IssueKind::UnknownChoice,
                                format!("unknown choice token {:?}; entry excluded", raw_choice),
                            )
                            .with_member(member.name.clone()),
                        );
                        continue;
                    }
                    UnknownChoicePolicy::Abstain => {
                        issues.push(
                            issue(
                                IssueKind::UnknownChoice,
                                format!(
                                    "unknown choice token {:?}; recorded as ABSTAIN",
                                    raw_choice
                                ),
                            )
                            .with_member(member.name.clone()),
                        );
                        VoteChoice::Abstain
                    }
                },
            };

            match votes.get(&member.name).copied() {
                None => {
                    votes.insert(member.name, choice);
                }
                Some(kept) if kept != choice => {
                    issues.push(
                        issue(
                            IssueKind::IntraObservationConflict,
                            format!(
                                "{:?} resolves to a member already voting {}; {} ignored",
                                raw_name, kept, choice
                            ),
                        )
                        .with_member(member.name),
                    );
                }
                Some(_) => {}
            }
        }

        NormalizedObservation {
            provenance_id,
            is_new,
            agenda_key,
            agenda_text,
            full_text,
            votes,
            issues,
            raw,
        }
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(&RosterConfig::default(), UnknownChoicePolicy::default())
    }
}
