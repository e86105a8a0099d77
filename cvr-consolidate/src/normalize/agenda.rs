//! Agenda text normalization
//!
//! Maps free-text agenda items to the key used to identify a vote within a
//! meeting. The key is lower-case, whitespace-collapsed, and stripped of
//! recurring boilerplate that differs between extraction passes of the same
//! slide.

use cvr_common::models::AgendaItem;
use once_cell::sync::Lazy;
use regex::Regex;

/// Texts the extractor emits when it could not read the agenda line
const PLACEHOLDER_TEXTS: &[&str] = &[
    "none",
    "not visible in image",
    "not visible in the image",
    "unknown agenda item",
];

/// Descriptions shorter than this look truncated to the quality scorer
const TRUNCATED_DESCRIPTION_CHARS: usize = 15;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

static ITEM_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^item\s+\d+\s*:\s*").expect("valid regex"));

static NUMBER_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^no\.\s*\d+\s*").expect("valid regex"));

static CONSENT_PREAMBLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"consent calendar matters listed under the consent calendar are considered routine.*$")
        .expect("valid regex")
});

static ORAL_COMMUNICATIONS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"oral communications(?:\s*#\s*\d+)?\s*\(limited[^)]*\).*$").expect("valid regex")
});

static ADJOURNMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"adjournment adjournment of .*$").expect("valid regex"));

static PARENTHETICAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\([^)]*\)").expect("valid regex"));

static EXPENDITURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s*expenditure:\s*(?:none|\$[0-9,]+(?:\.\d+)?)\.?\s*$").expect("valid regex")
});

static BARE_AGENDA_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+[a-z]?\.?$").expect("valid regex"));

/// Collapse runs of whitespace to single spaces and trim
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Normalized key for an agenda item; empty when the item is absent
pub fn normalize_agenda(item: Option<&AgendaItem>) -> String {
    match item {
        Some(item) => normalize_agenda_text(&item.display_text()),
        None => String::new(),
    }
}

/// Normalized key for already-rendered agenda text
pub fn normalize_agenda_text(text: &str) -> String {
    let mut key = collapse_whitespace(&text.to_lowercase());

    let bare = key.trim_end_matches('.');
    if PLACEHOLDER_TEXTS.contains(&bare) {
        return String::new();
    }

    key = ITEM_PREFIX.replace(&key, "").into_owned();
    key = NUMBER_PREFIX.replace(&key, "").into_owned();

    key = CONSENT_PREAMBLE.replace(&key, "consent calendar").into_owned();
    key = ORAL_COMMUNICATIONS
        .replace(&key, "oral communications")
        .into_owned();
    key = ADJOURNMENT.replace(&key, "adjournment").into_owned();
    key = key.replace(
        "council committee meetings and announcements",
        "council committee meetings",
    );

    key = PARENTHETICAL.replace_all(&key, "").into_owned();
    key = EXPENDITURE.replace(&key, "").into_owned();

    collapse_whitespace(&key)
        .trim_end_matches(|c: char| c == '.' || c == ':' || c == ',')
        .trim_end()
        .to_string()
}

/// Lower-case, whitespace-collapsed agenda text used for exact-text linking
pub fn full_text_key(item: Option<&AgendaItem>) -> String {
    item.map(|i| collapse_whitespace(&i.display_text().to_lowercase()))
        .unwrap_or_default()
}

/// Keys too generic to identify a vote on their own
pub fn is_weak_key(key: &str, min_key_chars: usize) -> bool {
    key.is_empty() || key.chars().count() < min_key_chars || BARE_AGENDA_NUMBER.is_match(key)
}

/// Agenda text that ends with an ellipsis
pub fn ends_with_ellipsis(text: &str) -> bool {
    let text = text.trim_end();
    text.ends_with("...") || text.ends_with('…')
}

/// Key of the text before its trailing ellipsis, if the text has one
pub fn truncation_stem(text: &str) -> Option<String> {
    if !ends_with_ellipsis(text) {
        return None;
    }
    let stem = text
        .trim_end()
        .trim_end_matches(|c: char| c == '.' || c == '…')
        .trim_end();
    let key = normalize_agenda_text(stem);
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

/// Description that looks cut off: ellipsis, very short, or only an agenda number
pub fn looks_truncated(text: &str) -> bool {
    let text = text.trim();
    ends_with_ellipsis(text)
        || text.chars().count() < TRUNCATED_DESCRIPTION_CHARS
        || BARE_AGENDA_NUMBER.is_match(&text.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> AgendaItem {
        AgendaItem::Text(s.to_string())
    }

    #[test]
    fn test_basic_key_normalization() {
        assert_eq!(
            normalize_agenda(Some(&text("  5A.   Consent   Calendar "))),
            "5a. consent calendar"
        );
        assert_eq!(normalize_agenda(None), "");
    }

    #[test]
    fn test_structured_item_matches_text_form() {
        let structured = AgendaItem::Structured {
            number: Some("9A".to_string()),
            description: Some("Approve Minutes".to_string()),
        };
        assert_eq!(
            normalize_agenda(Some(&structured)),
            normalize_agenda(Some(&text("9A. Approve Minutes")))
        );
    }

    #[test]
    fn test_placeholders_become_empty() {
        assert_eq!(normalize_agenda_text("None"), "");
        assert_eq!(normalize_agenda_text("Not visible in the image."), "");
        assert_eq!(normalize_agenda_text("UNKNOWN AGENDA ITEM"), "");
    }

    #[test]
    fn test_prefixes_stripped() {
        assert_eq!(normalize_agenda_text("Item 4: Budget Review"), "budget review");
        assert_eq!(normalize_agenda_text("No. 12 Budget Review"), "budget review");
    }

    #[test]
    fn test_boilerplate_collapsed() {
        let consent = "Consent Calendar Matters listed under the Consent Calendar are \
                       considered routine and will be enacted by one motion and one vote.";
        assert_eq!(normalize_agenda_text(consent), "consent calendar");

        let oral = "Oral Communications #2 (Limited up to a 15-minute period) This portion \
                    of the meeting is reserved for comments";
        assert_eq!(normalize_agenda_text(oral), "oral communications");

        let adjourn = "Adjournment Adjournment of City Council Meeting to Tuesday, \
                       October 21, 2025, at 5:00 p.m.";
        assert_eq!(normalize_agenda_text(adjourn), "adjournment");

        assert_eq!(
            normalize_agenda_text("Council Committee Meetings and Announcements"),
            "council committee meetings"
        );
    }

    #[test]
    fn test_annotations_and_expenditure_stripped() {
        assert_eq!(
            normalize_agenda_text("Approve contract (for adoption only) Expenditure: $12,500."),
            "approve contract"
        );
        assert_eq!(
            normalize_agenda_text("Accept and file report. Expenditure: None."),
            "accept and file report"
        );
    }

    #[test]
    fn test_trailing_punctuation_trimmed() {
        assert_eq!(normalize_agenda_text("Public Hearing:"), "public hearing");
        assert_eq!(normalize_agenda_text("Budget Review,"), "budget review");
    }

    #[test]
    fn test_weak_keys() {
        assert!(is_weak_key("", 4));
        assert!(is_weak_key("9a", 4));
        assert!(is_weak_key("10b.", 4));
        assert!(is_weak_key("123", 2));
        assert!(!is_weak_key("consent calendar", 4));
    }

    #[test]
    fn test_truncation_stem() {
        assert_eq!(
            truncation_stem("10B. Public Hearing on Land..."),
            Some("10b. public hearing on land".to_string())
        );
        assert_eq!(
            truncation_stem("Budget Rev…"),
            Some("budget rev".to_string())
        );
        assert_eq!(truncation_stem("Budget Review"), None);
    }

    #[test]
    fn test_looks_truncated() {
        assert!(looks_truncated("Approve the..."));
        assert!(looks_truncated("9A"));
        assert!(looks_truncated("Short"));
        assert!(!looks_truncated("Approve the minutes of the prior meeting"));
    }
}
