//! Council member name resolution
//!
//! Resolves OCR'd names against a configured roster. Matching order:
//! 1. Exact full name
//! 2. Configured alias
//! 3. Unique surname
//! 4. Jaro-Winkler similarity at or above the fuzzy threshold
//!
//! Names that resolve to nothing are kept verbatim and flagged, never
//! silently mapped onto a roster member.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strsim::jaro_winkler;
use tracing::debug;

static HONORIFIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:council\s*member|councilwoman|councilman|mayor\s+pro\s+tem|mayor|dr\.?)\s+")
        .expect("valid regex")
});

/// One roster entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterMember {
    /// Canonical name as stored in records
    pub name: String,
    /// Known misreadings that map to this member
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl RosterMember {
    fn new(name: &str, aliases: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Roster and fuzzy-match settings (`[policy.roster]`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    /// Minimum Jaro-Winkler similarity for a fuzzy match
    pub fuzzy_threshold: f64,
    pub members: Vec<RosterMember>,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.90,
            members: vec![
                RosterMember::new("GEORGE CHEN", &[]),
                RosterMember::new("MIKE GERSON", &[]),
                RosterMember::new("JON KAJI", &["JONATHAN KANG"]),
                RosterMember::new("SHARON KALANI", &[]),
                RosterMember::new("ASAM SHAIKH", &["ASAM SHEIKH"]),
                RosterMember::new("AURELIO MATTUCCI", &[]),
                RosterMember::new("BRIDGET LEWIS", &[]),
            ],
        }
    }
}

/// How a name was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchConfidence {
    Exact,
    Alias,
    Surname,
    Fuzzy,
    Unrecognized,
}

/// Resolved member name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberMatch {
    pub name: String,
    pub confidence: MatchConfidence,
}

impl MemberMatch {
    pub fn is_recognized(&self) -> bool {
        self.confidence != MatchConfidence::Unrecognized
    }
}

/// Comparable form of a name: honorifics removed, upper-case, letters/digits only
pub fn name_key(raw: &str) -> String {
    let mut name = raw.trim().to_string();
    while let Some(end) = HONORIFIC.find(&name).map(|m| m.end()) {
        name = name[end..].to_string();
    }

    let cleaned: String = name
        .to_uppercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn surname(key: &str) -> &str {
    key.rsplit(' ').next().unwrap_or(key)
}

/// Roster lookup for member names
#[derive(Debug, Clone)]
pub struct MemberNormalizer {
    /// (lookup key, canonical name, is alias), in roster order
    entries: Vec<(String, String, bool)>,
    fuzzy_threshold: f64,
}

impl MemberNormalizer {
    pub fn new(roster: &RosterConfig) -> Self {
        let mut entries = Vec::new();
        for member in &roster.members {
            let canonical = name_key(&member.name);
            if canonical.is_empty() {
                continue;
            }
            entries.push((canonical.clone(), canonical.clone(), false));
            for alias in &member.aliases {
                let alias_key = name_key(alias);
                if !alias_key.is_empty() {
                    entries.push((alias_key, canonical.clone(), true));
                }
            }
        }

        Self {
            entries,
            fuzzy_threshold: roster.fuzzy_threshold,
        }
    }

    /// Resolve a raw name; `None` for blank input
    pub fn normalize(&self, raw: &str) -> Option<MemberMatch> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        let key = name_key(raw);
        if key.is_empty() {
            return Some(self.unrecognized(raw));
        }

        // Exact, then alias
        for alias_pass in [false, true] {
            if let Some((_, canonical, _)) = self
                .entries
                .iter()
                .find(|(k, _, is_alias)| *is_alias == alias_pass && *k == key)
            {
                return Some(MemberMatch {
                    name: canonical.clone(),
                    confidence: if alias_pass {
                        MatchConfidence::Alias
                    } else {
                        MatchConfidence::Exact
                    },
                });
            }
        }

        // Unique surname
        let wanted = surname(&key);
        let mut by_surname: Vec<&String> = self
            .entries
            .iter()
            .filter(|(k, _, _)| surname(k) == wanted)
            .map(|(_, canonical, _)| canonical)
            .collect();
        by_surname.sort();
        by_surname.dedup();
        if by_surname.len() == 1 {
            return Some(MemberMatch {
                name: by_surname[0].clone(),
                confidence: MatchConfidence::Surname,
            });
        }

        // Fuzzy; first in roster order wins on equal similarity
        let mut best: Option<(&String, f64)> = None;
        for (k, canonical, _) in &self.entries {
            let similarity = jaro_winkler(&key, k);
            if best.map_or(true, |(_, s)| similarity > s) {
                best = Some((canonical, similarity));
            }
        }
        if let Some((canonical, similarity)) = best {
            if similarity >= self.fuzzy_threshold {
                debug!(raw = raw, member = %canonical, similarity, "Fuzzy member match");
                return Some(MemberMatch {
                    name: canonical.clone(),
                    confidence: MatchConfidence::Fuzzy,
                });
            }
        }

        Some(self.unrecognized(raw))
    }

    fn unrecognized(&self, raw: &str) -> MemberMatch {
        MemberMatch {
            name: raw.to_string(),
            confidence: MatchConfidence::Unrecognized,
        }
    }
}

impl Default for MemberNormalizer {
    fn default() -> Self {
        Self::new(&RosterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> MemberNormalizer {
        MemberNormalizer::default()
    }

    #[test]
    fn test_blank_name_is_none() {
        assert!(normalizer().normalize("   ").is_none());
    }

    #[test]
    fn test_exact_match_ignores_case_and_punctuation() {
        let m = normalizer().normalize("george chen.").unwrap();
        assert_eq!(m.name, "GEORGE CHEN");
        assert_eq!(m.confidence, MatchConfidence::Exact);
    }

    #[test]
    fn test_honorifics_stripped() {
        let m = normalizer().normalize("Councilmember Sharon Kalani").unwrap();
        assert_eq!(m.name, "SHARON KALANI");

        let m = normalizer().normalize("Mayor Pro Tem Dr. Bridget Lewis").unwrap();
        assert_eq!(m.name, "BRIDGET LEWIS");
        assert_eq!(m.confidence, MatchConfidence::Exact);
    }

    #[test]
    fn test_alias_match() {
        let m = normalizer().normalize("Jonathan Kang").unwrap();
        assert_eq!(m.name, "JON KAJI");
        assert_eq!(m.confidence, MatchConfidence::Alias);
    }

    #[test]
    fn test_surname_match() {
        let m = normalizer().normalize("Mayor Chen").unwrap();
        assert_eq!(m.name, "GEORGE CHEN");
        assert_eq!(m.confidence, MatchConfidence::Surname);

        // Alias surname of the same member is not ambiguous
        let m = normalizer().normalize("Sheikh").unwrap();
        assert_eq!(m.name, "ASAM SHAIKH");
    }

    #[test]
    fn test_fuzzy_match() {
        let m = normalizer().normalize("AURELIO MATUCCI").unwrap();
        assert_eq!(m.name, "AURELIO MATTUCCI");
        assert_eq!(m.confidence, MatchConfidence::Fuzzy);
    }

    #[test]
    fn test_unrecognized_name_preserved() {
        let m = normalizer().normalize("  Pat Smith ").unwrap();
        assert_eq!(m.name, "Pat Smith");
        assert!(!m.is_recognized());
    }
}
