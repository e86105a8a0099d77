//! Shared pipeline types
//!
//! Issues, drop reasons, and run mode are produced by several stages
//! (normalizer, merger, orchestrator) and collected into the run report.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Run mode
// ============================================================================

/// How a run treats the existing store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ConsolidationMode {
    /// Rebuild every record from the archive plus new observations
    Full,
    /// Rebuild only partitions touched by new observations
    Incremental,
}

impl fmt::Display for ConsolidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsolidationMode::Full => f.write_str("full"),
            ConsolidationMode::Incremental => f.write_str("incremental"),
        }
    }
}

// ============================================================================
// Dropped observations
// ============================================================================

/// Why an input observation was excluded from consolidation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// `meeting_id` blank or absent
    MissingMeetingId,
    /// No usable agenda text and no frame number
    MissingAgendaIdentity,
    /// Observation id already accepted with different content
    DuplicateObservationId,
    /// Identical to another observation in the same batch
    DuplicateObservation,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DropReason::MissingMeetingId => "missing meeting id",
            DropReason::MissingAgendaIdentity => "missing agenda item and frame number",
            DropReason::DuplicateObservationId => "duplicate observation id with different content",
            DropReason::DuplicateObservation => "identical to another observation in this batch",
        };
        f.write_str(s)
    }
}

/// Entry in the report's explicit-drop list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedObservation {
    pub observation_id: String,
    pub reason: DropReason,
}

// ============================================================================
// Validation issues
// ============================================================================

/// Non-fatal problem found while normalizing or merging
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Choice token not in the recognized vocabulary
    UnknownChoice,
    /// Vote entry with an empty member name
    BlankMemberName,
    /// Member name not resolved against the roster
    UnrecognizedMember,
    /// One observation lists the same member twice with different choices
    IntraObservationConflict,
    /// Lower-ranked observation disagrees with the kept choice
    VoteConflict,
    /// Reported tally differs from counts derived from individual votes
    TallyMismatch,
}

/// Issue recorded in the run report; never fatal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub meeting_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agenda_key: Option<String>,
    pub observation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<String>,
    pub detail: String,
}

impl ValidationIssue {
    pub fn new(
        kind: IssueKind,
        meeting_id: impl Into<String>,
        observation_id: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            meeting_id: meeting_id.into(),
            agenda_key: None,
            observation_id: observation_id.into(),
            member: None,
            detail: detail.into(),
        }
    }

    pub fn with_member(mut self, member: impl Into<String>) -> Self {
        self.member = Some(member.into());
        self
    }

    pub fn with_agenda_key(mut self, key: impl Into<String>) -> Self {
        self.agenda_key = Some(key.into());
        self
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:?}] meeting {} observation {}: {}",
            self.kind, self.meeting_id, self.observation_id, self.detail
        )
    }
}
