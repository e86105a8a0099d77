//! Anchor Matcher
//!
//! Links each canonical record to a position in the meeting video.
//!
//! Candidates are agenda entries scraped from the video player page, keyed
//! by their display text. A record is matched to the best-scoring candidate;
//! when nothing scores high enough, the timestamp is estimated from the frame
//! number and agenda category and the anchor is flagged `estimated`.
//!
//! # Text Scoring
//! Both sides are upper-cased, stripped of punctuation and stop words:
//! - exact match: 1000
//! - containment (either direction): 100
//! - each shared token: +2
//! - same leading agenda number (e.g. `10B`): +10
//! - each shared category phrase: +10
//! - lengths within 50 characters: +1

use cvr_common::models::{Anchor, CanonicalVoteRecord, MeetingAnchors};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

const STOP_WORDS: &[&str] = &[
    "THE", "A", "AN", "AND", "OR", "BUT", "IN", "ON", "AT", "TO", "FOR", "OF", "WITH", "BY",
];

const CATEGORY_PHRASES: &[&str] = &[
    "PUBLIC HEARING",
    "CONSENT CALENDAR",
    "ADJOURNMENT",
    "ORAL COMMUNICATIONS",
    "PLANNING COMMISSION",
    "COMMUNITY DEVELOPMENT",
    "COUNCIL COMMITTEE",
    "COMMUNITY SERVICES",
    "RESOLUTION",
    "ORDINANCE",
    "ACCEPT AND FILE",
    "HEARINGS",
];

/// Category phrases in normalized form ("ACCEPT AND FILE" loses its stop word)
static NORMALIZED_CATEGORIES: Lazy<Vec<String>> = Lazy::new(|| {
    CATEGORY_PHRASES
        .iter()
        .map(|p| normalize_anchor_text(p))
        .collect()
});

/// Fallback offsets (seconds) added to the frame-based estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryOffsets {
    pub consent: u64,
    pub public_hearing: u64,
    pub adjournment: u64,
    pub resolution: u64,
    pub ordinance: u64,
    pub other: u64,
}

impl Default for CategoryOffsets {
    fn default() -> Self {
        Self {
            consent: 300,
            public_hearing: 1800,
            adjournment: 3600,
            resolution: 1200,
            ordinance: 1500,
            other: 900,
        }
    }
}

/// Anchor matching settings (`[policy.anchor]`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorPolicy {
    /// Minimum text score for a candidate to be accepted
    pub min_match_score: i64,
    /// Seconds of video per extracted frame
    pub seconds_per_frame: u64,
    pub offsets: CategoryOffsets,
}

impl Default for AnchorPolicy {
    fn default() -> Self {
        Self {
            min_match_score: 12,
            seconds_per_frame: 30,
            offsets: CategoryOffsets::default(),
        }
    }
}

/// Result of anchoring one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorMatch {
    Matched {
        candidate_text: String,
        meta_id: String,
        timestamp_seconds: u64,
        score: i64,
    },
    Estimated {
        timestamp_seconds: u64,
    },
}

impl AnchorMatch {
    pub fn is_estimated(&self) -> bool {
        matches!(self, AnchorMatch::Estimated { .. })
    }

    pub fn into_anchor(self) -> Anchor {
        match self {
            AnchorMatch::Matched {
                meta_id,
                timestamp_seconds,
                ..
            } => Anchor {
                meta_id: Some(meta_id),
                timestamp_seconds,
                estimated: false,
            },
            AnchorMatch::Estimated { timestamp_seconds } => Anchor {
                meta_id: None,
                timestamp_seconds,
                estimated: true,
            },
        }
    }
}

/// Upper-case, punctuation-free, stop-word-free form of anchor text
pub fn normalize_anchor_text(text: &str) -> String {
    let cleaned: String = text
        .to_uppercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    cleaned
        .split_whitespace()
        .filter(|token| !STOP_WORDS.contains(token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Leading agenda number token such as `10B`
fn agenda_number(normalized: &str) -> Option<&str> {
    let first = normalized.split(' ').next()?;
    let starts_with_digit = first.chars().next().is_some_and(|c| c.is_ascii_digit());
    let digits_then_letter = first
        .trim_start_matches(|c: char| c.is_ascii_digit())
        .chars()
        .count()
        <= 1;
    if starts_with_digit && digits_then_letter && first.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(first)
    } else {
        None
    }
}

fn contains_phrase(normalized: &str, phrase: &str) -> bool {
    format!(" {} ", normalized).contains(&format!(" {} ", phrase))
}

/// Text similarity score between normalized record and candidate texts
pub fn score_texts(record: &str, candidate: &str) -> i64 {
    if record.is_empty() || candidate.is_empty() {
        return 0;
    }
    if record == candidate {
        return 1000;
    }

    let mut score = 0;
    if candidate.contains(record) || record.contains(candidate) {
        score += 100;
    }

    let record_tokens: BTreeSet<&str> = record.split(' ').collect();
    let candidate_tokens: BTreeSet<&str> = candidate.split(' ').collect();
    score += 2 * record_tokens.intersection(&candidate_tokens).count() as i64;

    if let (Some(a), Some(b)) = (agenda_number(record), agenda_number(candidate)) {
        if a == b {
            score += 10;
        }
    }

    for phrase in NORMALIZED_CATEGORIES.iter() {
        if contains_phrase(record, phrase) && contains_phrase(candidate, phrase) {
            score += 10;
        }
    }

    if record.len().abs_diff(candidate.len()) <= 50 {
        score += 1;
    }

    score
}

/// Anchor matcher
pub struct AnchorMatcher {
    policy: AnchorPolicy,
}

impl AnchorMatcher {
    pub fn new() -> Self {
        Self::with_policy(AnchorPolicy::default())
    }

    pub fn with_policy(policy: AnchorPolicy) -> Self {
        Self { policy }
    }

    /// Match a record against its meeting's candidates, estimating on failure
    pub fn match_record(
        &self,
        record: &CanonicalVoteRecord,
        candidates: Option<&MeetingAnchors>,
    ) -> AnchorMatch {
        let record_text = normalize_anchor_text(&record.agenda_display_text);

        // (score, timestamp, meta_id, text): higher score, then earlier, then smaller id
        let mut best: Option<(i64, u64, &str, &str)> = None;
        for (text, candidate) in candidates.into_iter().flatten() {
            let score = score_texts(&record_text, &normalize_anchor_text(text));
            let entry = (score, candidate.timestamp_seconds, candidate.meta_id.as_str(), text.as_str());
            let better = match best {
                None => true,
                Some((s, t, m, _)) => {
                    score > s
                        || (score == s && entry.1 < t)
                        || (score == s && entry.1 == t && entry.2 < m)
                }
            };
            if better {
                best = Some(entry);
            }
        }

        if let Some((score, timestamp_seconds, meta_id, text)) = best {
            if score >= self.policy.min_match_score {
                debug!(
                    meeting_id = %record.meeting_id,
                    key = %record.normalized_agenda_key,
                    candidate = text,
                    score,
                    "Anchor matched"
                );
                return AnchorMatch::Matched {
                    candidate_text: text.to_string(),
                    meta_id: meta_id.to_string(),
                    timestamp_seconds,
                    score,
                };
            }
        }

        let timestamp_seconds = self.estimate(record);
        debug!(
            meeting_id = %record.meeting_id,
            key = %record.normalized_agenda_key,
            timestamp_seconds,
            "No anchor above threshold; estimated"
        );
        AnchorMatch::Estimated { timestamp_seconds }
    }

    /// Frame-based timestamp plus the agenda category offset
    pub fn estimate(&self, record: &CanonicalVoteRecord) -> u64 {
        let base = record
            .frame_number
            .unwrap_or(0)
            .saturating_mul(self.policy.seconds_per_frame);
        let text = record.agenda_display_text.to_lowercase();
        if text.trim().is_empty() {
            return base;
        }

        let offsets = &self.policy.offsets;
        let offset = if text.contains("consent") {
            offsets.consent
        } else if text.contains("public hearing") {
            offsets.public_hearing
        } else if text.contains("adjournment") {
            offsets.adjournment
        } else if text.contains("resolution") {
            offsets.resolution
        } else if text.contains("ordinance") {
            offsets.ordinance
        } else {
            offsets.other
        };
        base.saturating_add(offset)
    }
}

impl Default for AnchorMatcher {
    fn default() -> Self {
        Self::new()
    }
}
