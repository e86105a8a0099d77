//! Data model for vote consolidation
//!
//! Raw observations are immutable extraction output. Canonical records and
//! every aggregate are derived from them by the consolidation engine and are
//! never edited in place.
//!
//! All maps are `BTreeMap` and all record lists are kept sorted so that a
//! serialized store is byte-identical across runs over the same input.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Default meeting title when no catalog entry or prior store supplies one
pub const DEFAULT_MEETING_TITLE: &str = "City Council Meeting";

// ============================================================================
// Raw observations
// ============================================================================

/// Agenda identity as extracted: free text or a structured number/description pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AgendaItem {
    Text(String),
    Structured {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        number: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
}

impl AgendaItem {
    /// Display form of the agenda item ("9A. Description" for structured items)
    pub fn display_text(&self) -> String {
        match self {
            AgendaItem::Text(text) => text.trim().to_string(),
            AgendaItem::Structured { number, description } => {
                let number = number.as_deref().map(str::trim).unwrap_or("");
                let description = description.as_deref().map(str::trim).unwrap_or("");
                match (number.is_empty(), description.is_empty()) {
                    (true, true) => String::new(),
                    (false, true) => number.to_string(),
                    (true, false) => description.to_string(),
                    (false, false) => format!("{}. {}", number, description),
                }
            }
        }
    }
}

/// Reported vote counts
///
/// On raw observations this is whatever the extractor read off the screen.
/// On canonical records it is always recomputed from `individual_votes`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    #[serde(default)]
    pub ayes: u32,
    #[serde(default)]
    pub noes: u32,
    #[serde(default)]
    pub abstentions: u32,
    #[serde(default)]
    pub recused: u32,
}

impl VoteTally {
    /// Count choices literally
    pub fn from_choices<'a, I>(choices: I) -> Self
    where
        I: IntoIterator<Item = &'a VoteChoice>,
    {
        let mut tally = VoteTally::default();
        for choice in choices {
            match choice {
                VoteChoice::Yes => tally.ayes += 1,
                VoteChoice::No => tally.noes += 1,
                VoteChoice::Abstain => tally.abstentions += 1,
                VoteChoice::Recuse => tally.recused += 1,
            }
        }
        tally
    }

    /// Sum of all four counts; reported tallies are untrusted, so widened
    pub fn total(&self) -> u64 {
        u64::from(self.ayes)
            + u64::from(self.noes)
            + u64::from(self.abstentions)
            + u64::from(self.recused)
    }

    /// Outcome implied by this tally
    pub fn result(&self) -> VoteResult {
        VoteResult::from_tally(self)
    }
}

/// One extraction pass's view of a single ballot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawVoteObservation {
    #[serde(default)]
    pub meeting_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agenda_item: Option<AgendaItem>,
    /// Position in the source video; proximity heuristic and tiebreak only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_number: Option<u64>,
    /// Raw member name → raw choice token, exactly as extracted
    #[serde(default)]
    pub individual_votes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote_tally: Option<VoteTally>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_frame_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation_id: Option<String>,
}

impl RawVoteObservation {
    /// Supplied observation id, if present and non-blank
    pub fn supplied_id(&self) -> Option<&str> {
        self.observation_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Stable identity used in provenance lists
    ///
    /// The supplied id when there is one, otherwise `sha256:` plus the first
    /// 16 hex digits of the content digest.
    pub fn provenance_id(&self) -> String {
        match self.supplied_id() {
            Some(id) => id.to_string(),
            None => format!("sha256:{}", &self.content_digest()[..16]),
        }
    }

    /// SHA-256 over every field except `observation_id`
    ///
    /// Each field is hashed as name, byte length, then value, so no value can
    /// run into its neighbour. The agenda item is hashed in its tagged form:
    /// free text and a structured pair never collide even when they display
    /// the same.
    pub fn content_digest(&self) -> String {
        let mut hasher = Sha256::new();
        let mut field = |name: &str, value: &str| {
            hasher.update(name.as_bytes());
            hasher.update((value.len() as u64).to_be_bytes());
            hasher.update(value.as_bytes());
        };

        field("meeting_id", &self.meeting_id);
        match &self.agenda_item {
            None => field("agenda", ""),
            Some(AgendaItem::Text(text)) => field("agenda.text", text),
            Some(AgendaItem::Structured { number, description }) => {
                field("agenda.number", number.as_deref().unwrap_or(""));
                field("agenda.number?", if number.is_some() { "1" } else { "0" });
                field("agenda.description", description.as_deref().unwrap_or(""));
                field(
                    "agenda.description?",
                    if description.is_some() { "1" } else { "0" },
                );
            }
        }
        field(
            "frame",
            &self.frame_number.map(|f| f.to_string()).unwrap_or_default(),
        );
        for (name, choice) in &self.individual_votes {
            field("vote.member", name);
            field("vote.choice", choice);
        }
        if let Some(tally) = &self.vote_tally {
            field(
                "tally",
                &format!(
                    "{}/{}/{}/{}",
                    tally.ayes, tally.noes, tally.abstentions, tally.recused
                ),
            );
        }
        field("result", self.result.as_deref().unwrap_or(""));
        field(
            "confidence",
            &self
                .extraction_confidence
                .map(|c| c.to_string())
                .unwrap_or_default(),
        );
        field(
            "source",
            self.source_frame_reference.as_deref().unwrap_or(""),
        );

        format!("{:x}", hasher.finalize())
    }

    /// Display text of the agenda item, empty when absent
    pub fn agenda_text(&self) -> String {
        self.agenda_item
            .as_ref()
            .map(AgendaItem::display_text)
            .unwrap_or_default()
    }
}

// ============================================================================
// Canonical records
// ============================================================================

/// Normalized vote choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VoteChoice {
    Yes,
    No,
    Abstain,
    Recuse,
}

impl fmt::Display for VoteChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VoteChoice::Yes => "YES",
            VoteChoice::No => "NO",
            VoteChoice::Abstain => "ABSTAIN",
            VoteChoice::Recuse => "RECUSE",
        };
        f.write_str(s)
    }
}

/// Derived outcome of a vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteResult {
    Passes,
    Fails,
    Tie,
}

impl VoteResult {
    /// `Passes` iff ayes > noes, `Fails` iff noes > ayes, otherwise `Tie`
    pub fn from_tally(tally: &VoteTally) -> Self {
        use std::cmp::Ordering;
        match tally.ayes.cmp(&tally.noes) {
            Ordering::Greater => VoteResult::Passes,
            Ordering::Less => VoteResult::Fails,
            Ordering::Equal => VoteResult::Tie,
        }
    }
}

/// Position of a vote in the source video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    /// Scraped player-page id; `None` for estimates
    #[serde(default)]
    pub meta_id: Option<String>,
    pub timestamp_seconds: u64,
    /// `true` when derived from the frame-number estimate rather than a scraped match
    pub estimated: bool,
}

/// The single authoritative record for one agenda action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalVoteRecord {
    pub meeting_id: String,
    pub normalized_agenda_key: String,
    pub agenda_display_text: String,
    /// Lowest frame number among contributing observations
    #[serde(default)]
    pub frame_number: Option<u64>,
    pub individual_votes: BTreeMap<String, VoteChoice>,
    pub vote_tally: VoteTally,
    pub result: VoteResult,
    #[serde(default)]
    pub anchor: Option<Anchor>,
    #[serde(default)]
    pub source_frame_reference: Option<String>,
    /// Contributing provenance ids, best-scored first
    pub provenance: Vec<String>,
}

impl CanonicalVoteRecord {
    /// Identity within a store
    pub fn identity(&self) -> (&str, &str) {
        (&self.meeting_id, &self.normalized_agenda_key)
    }

    /// Tally literally counted from `individual_votes`
    pub fn derived_tally(&self) -> VoteTally {
        VoteTally::from_choices(self.individual_votes.values())
    }
}

// ============================================================================
// Aggregates
// ============================================================================

/// Meeting with derived vote counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meeting {
    pub id: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    pub title: String,
    pub total_votes: u32,
    pub passed_votes: u32,
    pub failed_votes: u32,
}

/// Per-member vote counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberStats {
    pub total_votes: u32,
    pub yes_votes: u32,
    pub no_votes: u32,
    pub abstentions: u32,
    pub recused: u32,
}

impl MemberStats {
    /// Count one vote into its bucket
    pub fn record(&mut self, choice: VoteChoice) {
        match choice {
            VoteChoice::Yes => self.yes_votes += 1,
            VoteChoice::No => self.no_votes += 1,
            VoteChoice::Abstain => self.abstentions += 1,
            VoteChoice::Recuse => self.recused += 1,
        }
        self.total_votes = self.bucket_sum();
    }

    pub fn bucket_sum(&self) -> u32 {
        self.yes_votes + self.no_votes + self.abstentions + self.recused
    }
}

/// Store-level counts for dashboards and reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSummary {
    pub total_votes: u32,
    pub total_meetings: u32,
    pub total_councilmembers: u32,
    pub votes_with_individual_data: u32,
    pub anchors_matched: u32,
    pub anchors_estimated: u32,
}

/// Consolidated store: one immutable snapshot produced per run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidatedStore {
    pub votes: Vec<CanonicalVoteRecord>,
    pub meetings: BTreeMap<String, Meeting>,
    pub councilmembers: Vec<String>,
    pub councilmember_stats: BTreeMap<String, MemberStats>,
    pub summary: StoreSummary,
    /// Archive of every accepted raw observation, sorted by provenance id
    pub observations: Vec<RawVoteObservation>,
}

impl ConsolidatedStore {
    pub fn is_empty(&self) -> bool {
        self.votes.is_empty() && self.observations.is_empty()
    }
}

// ============================================================================
// External inputs
// ============================================================================

/// Scraped anchor for one agenda entry on the player page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorCandidate {
    pub meta_id: String,
    pub timestamp_seconds: u64,
}

/// Anchor text → candidate, for one meeting
pub type MeetingAnchors = BTreeMap<String, AnchorCandidate>;

/// Meeting id → anchor candidates
pub type AnchorCandidates = BTreeMap<String, MeetingAnchors>;

/// Externally known meeting metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingInfo {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Meeting id → metadata
pub type MeetingCatalog = BTreeMap<String, MeetingInfo>;

#[cfg(test)]
mod tests {
    use super::*;

    fn observation() -> RawVoteObservation {
        let mut votes = BTreeMap::new();
        votes.insert("GEORGE CHEN".to_string(), "YES".to_string());
        RawVoteObservation {
            meeting_id: "100".to_string(),
            agenda_item: Some(AgendaItem::Text("5A. Consent Calendar".to_string())),
            frame_number: Some(10),
            individual_votes: votes,
            ..Default::default()
        }
    }

    #[test]
    fn test_structured_agenda_display_text() {
        let item = AgendaItem::Structured {
            number: Some("9A".to_string()),
            description: Some("Approve Minutes".to_string()),
        };
        assert_eq!(item.display_text(), "9A. Approve Minutes");

        let number_only = AgendaItem::Structured {
            number: Some("9A".to_string()),
            description: None,
        };
        assert_eq!(number_only.display_text(), "9A");
    }

    #[test]
    fn test_agenda_item_deserializes_both_shapes() {
        let text: AgendaItem = serde_json::from_str("\"12. Adjournment\"").unwrap();
        assert_eq!(text, AgendaItem::Text("12. Adjournment".to_string()));

        let structured: AgendaItem =
            serde_json::from_str(r#"{"number":"10B","description":"Public Hearing"}"#).unwrap();
        assert_eq!(structured.display_text(), "10B. Public Hearing");
    }

    #[test]
    fn test_provenance_id_prefers_supplied_id() {
        let mut obs = observation();
        obs.observation_id = Some("  vote-7 ".to_string());
        assert_eq!(obs.provenance_id(), "vote-7");
    }

    #[test]
    fn test_derived_provenance_id_is_stable_and_content_sensitive() {
        let obs = observation();
        let id = obs.provenance_id();
        assert!(id.starts_with("sha256:"));
        assert_eq!(id.len(), "sha256:".len() + 16);
        assert_eq!(id, observation().provenance_id());

        let mut other = observation();
        other.frame_number = Some(11);
        assert_ne!(id, other.provenance_id());
    }

    #[test]
    fn test_digest_distinguishes_agenda_shapes() {
        let mut text = observation();
        text.agenda_item = Some(AgendaItem::Text("9A. X".to_string()));
        let mut structured = observation();
        structured.agenda_item = Some(AgendaItem::Structured {
            number: Some("9A".to_string()),
            description: Some("X".to_string()),
        });
        assert_eq!(text.agenda_text(), structured.agenda_text());
        assert_ne!(text.content_digest(), structured.content_digest());

        let mut number_only = observation();
        number_only.agenda_item = Some(AgendaItem::Structured {
            number: Some("9A".to_string()),
            description: None,
        });
        let mut empty_description = number_only.clone();
        empty_description.agenda_item = Some(AgendaItem::Structured {
            number: Some("9A".to_string()),
            description: Some(String::new()),
        });
        assert_ne!(number_only.content_digest(), empty_description.content_digest());
    }

    #[test]
    fn test_digest_separator_inside_values() {
        let mut left = observation();
        left.individual_votes = BTreeMap::from([("A=B".to_string(), "C".to_string())]);
        let mut right = observation();
        right.individual_votes = BTreeMap::from([("A".to_string(), "B=C".to_string())]);
        assert_ne!(left.content_digest(), right.content_digest());
    }

    #[test]
    fn test_blank_supplied_id_falls_back_to_digest() {
        let mut obs = observation();
        obs.observation_id = Some("   ".to_string());
        assert!(obs.supplied_id().is_none());
        assert!(obs.provenance_id().starts_with("sha256:"));
    }

    #[test]
    fn test_tally_result_derivation() {
        let choices = [VoteChoice::Yes, VoteChoice::Yes, VoteChoice::No, VoteChoice::Recuse];
        let tally = VoteTally::from_choices(choices.iter());
        assert_eq!(tally.ayes, 2);
        assert_eq!(tally.noes, 1);
        assert_eq!(tally.recused, 1);
        assert_eq!(tally.total(), 4);

        let oversized = VoteTally { ayes: u32::MAX, noes: 1, ..Default::default() };
        assert_eq!(oversized.total(), u64::from(u32::MAX) + 1);
        assert_eq!(tally.result(), VoteResult::Passes);

        assert_eq!(VoteTally::default().result(), VoteResult::Tie);
        let fails = VoteTally { noes: 3, ayes: 1, ..Default::default() };
        assert_eq!(fails.result(), VoteResult::Fails);
    }

    #[test]
    fn test_member_stats_total_is_bucket_sum() {
        let mut stats = MemberStats::default();
        stats.record(VoteChoice::Yes);
        stats.record(VoteChoice::Abstain);
        stats.record(VoteChoice::Recuse);
        assert_eq!(stats.total_votes, 3);
        assert_eq!(stats.total_votes, stats.bucket_sum());
    }

    #[test]
    fn test_choice_serializes_upper_case() {
        assert_eq!(serde_json::to_string(&VoteChoice::Abstain).unwrap(), "\"ABSTAIN\"");
        let parsed: VoteChoice = serde_json::from_str("\"RECUSE\"").unwrap();
        assert_eq!(parsed, VoteChoice::Recuse);
    }
}
