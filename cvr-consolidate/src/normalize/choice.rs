//! Vote choice tokens

use cvr_common::models::VoteChoice;
use serde::{Deserialize, Serialize};

/// What to do with a vote entry whose choice token is not recognized
///
/// Either way the entry is reported as an `UnknownChoice` issue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownChoicePolicy {
    /// Exclude the single vote entry
    #[default]
    Reject,
    /// Record the entry as ABSTAIN
    Abstain,
}

/// Map a raw choice token to a vote choice; `None` for anything unrecognized
///
/// OCR fragments such as "nl", "ra" or "am" are never guessed.
pub fn normalize_choice(raw: &str) -> Option<VoteChoice> {
    let token = raw
        .trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_uppercase();

    match token.as_str() {
        "Y" | "YES" | "YEA" | "AYE" | "AYES" => Some(VoteChoice::Yes),
        "N" | "NO" | "NAY" | "NOES" => Some(VoteChoice::No),
        "A" | "ABSTAIN" | "ABSTAINED" | "ABSTENTION" => Some(VoteChoice::Abstain),
        "R" | "RECUSE" | "RECUSED" | "RECUSAL" => Some(VoteChoice::Recuse),
        _ => None,
    }
}
