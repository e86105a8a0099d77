//! Consolidation policy
//!
//! One configurable policy covers every tunable rule of the pipeline. It is
//! read from the `[policy]` section of the TOML config; any omitted field
//! takes its default.

use crate::fusion::grouper::{DEFAULT_MIN_KEY_CHARS, DEFAULT_PROXIMITY_WINDOW};
use crate::fusion::ScoringWeights;
use crate::normalize::{RosterConfig, UnknownChoicePolicy};
use crate::services::AnchorPolicy;
use serde::{Deserialize, Serialize};

/// Tunable consolidation rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidationPolicy {
    /// Frame distance under which observations of one key are linked
    pub proximity_window: u64,
    /// Keys shorter than this group by frame only
    pub min_key_chars: usize,
    pub unknown_choice: UnknownChoicePolicy,
    pub weights: ScoringWeights,
    pub anchor: AnchorPolicy,
    pub roster: RosterConfig,
}

impl Default for ConsolidationPolicy {
    fn default() -> Self {
        Self {
            proximity_window: DEFAULT_PROXIMITY_WINDOW,
            min_key_chars: DEFAULT_MIN_KEY_CHARS,
            unknown_choice: UnknownChoicePolicy::default(),
            weights: ScoringWeights::default(),
            anchor: AnchorPolicy::default(),
            roster: RosterConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_policy_fills_defaults() {
        let policy: ConsolidationPolicy = toml::from_str(
            r#"
            proximity_window = 8
            unknown_choice = "abstain"

            [weights]
            supplied_id = 50

            [anchor.offsets]
            public_hearing = 2000
            "#,
        )
        .unwrap();

        assert_eq!(policy.proximity_window, 8);
        assert_eq!(policy.min_key_chars, DEFAULT_MIN_KEY_CHARS);
        assert_eq!(policy.unknown_choice, UnknownChoicePolicy::Abstain);
        assert_eq!(policy.weights.supplied_id, 50);
        assert_eq!(policy.weights.per_vote_entry, 10);
        assert_eq!(policy.anchor.offsets.public_hearing, 2000);
        assert_eq!(policy.anchor.offsets.consent, 300);
        assert_eq!(policy.roster.members.len(), 7);
    }

    #[test]
    fn test_roster_override() {
        let policy: ConsolidationPolicy = toml::from_str(
            r#"
            [roster]
            fuzzy_threshold = 0.95

            [[roster.members]]
            name = "PAT SMITH"
            aliases = ["PAT SMYTH"]
            "#,
        )
        .unwrap();
        assert_eq!(policy.roster.fuzzy_threshold, 0.95);
        assert_eq!(policy.roster.members.len(), 1);
        assert_eq!(policy.roster.members[0].aliases, vec!["PAT SMYTH"]);
    }

    #[test]
    fn test_default_policy_round_trips_through_toml() {
        let text = toml::to_string_pretty(&ConsolidationPolicy::default()).unwrap();
        let parsed: ConsolidationPolicy = toml::from_str(&text).unwrap();
        assert_eq!(parsed, ConsolidationPolicy::default());
    }
}
