//! Test Helper Utilities
//!
//! Observation builders and a one-call consolidation wrapper shared by the
//! integration tests.

#![allow(dead_code)]

use cvr_common::models::{AgendaItem, ConsolidatedStore, RawVoteObservation, VoteTally};
use cvr_consolidate::{
    ConsolidationInput, ConsolidationMode, ConsolidationOutcome, Consolidator,
};

/// The default roster, in canonical form
pub const ROSTER: [&str; 7] = [
    "GEORGE CHEN",
    "MIKE GERSON",
    "JON KAJI",
    "SHARON KALANI",
    "ASAM SHAIKH",
    "AURELIO MATTUCCI",
    "BRIDGET LEWIS",
];

/// Builder for raw observations in meeting "100"
#[derive(Debug, Clone)]
pub struct ObservationBuilder {
    raw: RawVoteObservation,
}

impl ObservationBuilder {
    pub fn new(agenda: &str) -> Self {
        Self {
            raw: RawVoteObservation {
                meeting_id: "100".to_string(),
                agenda_item: Some(AgendaItem::Text(agenda.to_string())),
                ..Default::default()
            },
        }
    }

    pub fn meeting(mut self, meeting_id: &str) -> Self {
        self.raw.meeting_id = meeting_id.to_string();
        self
    }

    pub fn id(mut self, id: &str) -> Self {
        self.raw.observation_id = Some(id.to_string());
        self
    }

    pub fn frame(mut self, frame: u64) -> Self {
        self.raw.frame_number = Some(frame);
        self
    }

    pub fn vote(mut self, member: &str, choice: &str) -> Self {
        self.raw
            .individual_votes
            .insert(member.to_string(), choice.to_string());
        self
    }

    /// Every roster member votes `choice`
    pub fn all(mut self, choice: &str) -> Self {
        for member in ROSTER {
            self = self.vote(member, choice);
        }
        self
    }

    pub fn tally(mut self, ayes: u32, noes: u32) -> Self {
        self.raw.vote_tally = Some(VoteTally {
            ayes,
            noes,
            ..Default::default()
        });
        self
    }

    pub fn result(mut self, result: &str) -> Self {
        self.raw.result = Some(result.to_string());
        self
    }

    pub fn build(self) -> RawVoteObservation {
        self.raw
    }
}

pub fn obs(agenda: &str) -> ObservationBuilder {
    ObservationBuilder::new(agenda)
}

pub fn input(observations: Vec<RawVoteObservation>) -> ConsolidationInput {
    ConsolidationInput {
        observations,
        ..Default::default()
    }
}

/// Consolidate with the default policy, panicking on error
pub fn run(
    existing: &ConsolidatedStore,
    observations: Vec<RawVoteObservation>,
    mode: ConsolidationMode,
) -> ConsolidationOutcome {
    Consolidator::default()
        .consolidate(existing, input(observations), mode)
        .expect("consolidation succeeds")
}

/// Full consolidation from an empty store
pub fn run_full(observations: Vec<RawVoteObservation>) -> ConsolidationOutcome {
    run(&ConsolidatedStore::default(), observations, ConsolidationMode::Full)
}

/// A small meeting with duplicates, a truncated title, and a conflict
pub fn sample_meeting() -> Vec<RawVoteObservation> {
    vec![
        obs("5A. Consent Calendar").id("v1").frame(10).all("Y").build(),
        obs("5A. Consent Calendar").frame(12).vote("GEORGE CHEN", "Y").build(),
        obs("8B. Resolution Adopting Budget")
            .id("v3")
            .frame(40)
            .all("Y")
            .vote("JON KAJI", "N")
            .tally(6, 1)
            .build(),
        obs("8B. Resolution Adop...")
            .id("v4")
            .frame(42)
            .vote("JON KAJI", "Y")
            .build(),
        obs("12C. Public Hearing on Sign Code")
            .id("v5")
            .frame(90)
            .all("N")
            .vote("MIKE GERSON", "Y")
            .build(),
        obs("12C. Public Hearing on Sign Code")
            .meeting("101")
            .id("v6")
            .frame(5)
            .all("Y")
            .vote("SHARON KALANI", "nl")
            .build(),
    ]
}
