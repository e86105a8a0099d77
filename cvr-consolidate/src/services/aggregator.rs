//! Aggregator
//!
//! Derives meetings, member statistics, and the store summary from the full
//! set of canonical records. Always a full replay; nothing is incremented in
//! place, so aggregates can never drift from the records.

use cvr_common::models::{
    CanonicalVoteRecord, Meeting, MeetingCatalog, MemberStats, StoreSummary, VoteResult,
    DEFAULT_MEETING_TITLE,
};
use std::collections::BTreeMap;
use tracing::debug;

/// Aggregates derived from canonical records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregates {
    pub meetings: BTreeMap<String, Meeting>,
    pub councilmembers: Vec<String>,
    pub councilmember_stats: BTreeMap<String, MemberStats>,
    pub summary: StoreSummary,
}

/// Aggregator
pub struct Aggregator;

impl Aggregator {
    /// Replay all records into aggregates
    ///
    /// Meetings are the union of record meeting ids and catalog ids. Date and
    /// title come from the catalog, else from `prior` meetings, else defaults.
    pub fn aggregate(
        records: &[CanonicalVoteRecord],
        catalog: &MeetingCatalog,
        prior: &BTreeMap<String, Meeting>,
    ) -> Aggregates {
        let mut meetings: BTreeMap<String, Meeting> = BTreeMap::new();
        let mut stats: BTreeMap<String, MemberStats> = BTreeMap::new();
        let mut summary = StoreSummary::default();

        let blank_meeting = |id: &str| {
            let info = catalog.get(id);
            let previous = prior.get(id);
            Meeting {
                id: id.to_string(),
                date: info
                    .and_then(|i| i.date)
                    .or_else(|| previous.and_then(|p| p.date)),
                title: info
                    .and_then(|i| i.title.clone())
                    .filter(|t| !t.trim().is_empty())
                    .or_else(|| previous.map(|p| p.title.clone()))
                    .unwrap_or_else(|| DEFAULT_MEETING_TITLE.to_string()),
                total_votes: 0,
                passed_votes: 0,
                failed_votes: 0,
            }
        };

        for id in catalog.keys() {
            meetings.insert(id.clone(), blank_meeting(id));
        }

        for record in records {
            let meeting = meetings
                .entry(record.meeting_id.clone())
                .or_insert_with(|| blank_meeting(&record.meeting_id));
            meeting.total_votes += 1;
            match record.result {
                VoteResult::Passes => meeting.passed_votes += 1,
                VoteResult::Fails => meeting.failed_votes += 1,
                VoteResult::Tie => {}
            }

            for (member, choice) in &record.individual_votes {
                stats.entry(member.clone()).or_default().record(*choice);
            }

            summary.total_votes += 1;
            if !record.individual_votes.is_empty() {
                summary.votes_with_individual_data += 1;
            }
            match &record.anchor {
                Some(anchor) if anchor.estimated => summary.anchors_estimated += 1,
                Some(_) => summary.anchors_matched += 1,
                None => {}
            }
        }

        summary.total_meetings = meetings.len() as u32;
        summary.total_councilmembers = stats.len() as u32;
        let councilmembers: Vec<String> = stats.keys().cloned().collect();

        debug!(
            meetings = summary.total_meetings,
            votes = summary.total_votes,
            members = summary.total_councilmembers,
            "Aggregated store"
        );

        Aggregates {
            meetings,
            councilmembers,
            councilmember_stats: stats,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use cvr_common::models::{Anchor, MeetingInfo, VoteChoice, VoteTally};

    fn record(meeting: &str, key: &str, votes: &[(&str, VoteChoice)]) -> CanonicalVoteRecord {
        let individual_votes: BTreeMap<String, VoteChoice> =
            votes.iter().map(|(m, c)| (m.to_string(), *c)).collect();
        let vote_tally = VoteTally::from_choices(individual_votes.values());
        CanonicalVoteRecord {
            meeting_id: meeting.to_string(),
            normalized_agenda_key: key.to_string(),
            agenda_display_text: key.to_string(),
            frame_number: None,
            individual_votes,
            vote_tally,
            result: vote_tally.result(),
            anchor: None,
            source_frame_reference: None,
            provenance: vec![format!("{}-{}", meeting, key)],
        }
    }

    #[test]
    fn test_meeting_counts() {
        let records = vec![
            record("100", "a", &[("GEORGE CHEN", VoteChoice::Yes)]),
            record("100", "b", &[("GEORGE CHEN", VoteChoice::No)]),
            record("100", "c", &[]),
            record("200", "a", &[("MIKE GERSON", VoteChoice::Yes)]),
        ];
        let agg = Aggregator::aggregate(&records, &MeetingCatalog::new(), &BTreeMap::new());

        let m100 = &agg.meetings["100"];
        assert_eq!(m100.total_votes, 3);
        assert_eq!(m100.passed_votes, 1);
        assert_eq!(m100.failed_votes, 1);
        assert_eq!(m100.title, DEFAULT_MEETING_TITLE);
        assert_eq!(agg.summary.total_votes, 4);
        assert_eq!(agg.summary.votes_with_individual_data, 3);
        assert_eq!(agg.summary.total_meetings, 2);
    }

    #[test]
    fn test_member_stats_replay() {
        let records = vec![
            record("100", "a", &[("GEORGE CHEN", VoteChoice::Yes), ("MIKE GERSON", VoteChoice::Recuse)]),
            record("100", "b", &[("GEORGE CHEN", VoteChoice::Abstain)]),
        ];
        let agg = Aggregator::aggregate(&records, &MeetingCatalog::new(), &BTreeMap::new());
        let chen = agg.councilmember_stats["GEORGE CHEN"];
        assert_eq!(chen.total_votes, 2);
        assert_eq!(chen.yes_votes, 1);
        assert_eq!(chen.abstentions, 1);
        assert_eq!(agg.councilmember_stats["MIKE GERSON"].recused, 1);
        assert_eq!(agg.councilmembers, vec!["GEORGE CHEN", "MIKE GERSON"]);
    }

    #[test]
    fn test_catalog_meetings_included_and_titled() {
        let mut catalog = MeetingCatalog::new();
        catalog.insert(
            "300".to_string(),
            MeetingInfo {
                date: NaiveDate::from_ymd_opt(2025, 10, 7),
                title: Some("Regular Meeting".to_string()),
            },
        );
        let agg = Aggregator::aggregate(&[], &catalog, &BTreeMap::new());
        let meeting = &agg.meetings["300"];
        assert_eq!(meeting.total_votes, 0);
        assert_eq!(meeting.title, "Regular Meeting");
        assert_eq!(meeting.date, NaiveDate::from_ymd_opt(2025, 10, 7));
    }

    #[test]
    fn test_prior_meeting_metadata_carried() {
        let mut prior = BTreeMap::new();
        prior.insert(
            "100".to_string(),
            Meeting {
                id: "100".to_string(),
                date: NaiveDate::from_ymd_opt(2025, 9, 9),
                title: "Budget Session".to_string(),
                total_votes: 99,
                passed_votes: 99,
                failed_votes: 0,
            },
        );
        let records = vec![record("100", "a", &[])];
        let agg = Aggregator::aggregate(&records, &MeetingCatalog::new(), &prior);
        let meeting = &agg.meetings["100"];
        assert_eq!(meeting.title, "Budget Session");
        assert_eq!(meeting.total_votes, 1);
        assert_eq!(meeting.passed_votes, 0);
    }

    #[test]
    fn test_anchor_counts() {
        let mut matched = record("100", "a", &[]);
        matched.anchor = Some(Anchor {
            meta_id: Some("m-1".to_string()),
            timestamp_seconds: 10,
            estimated: false,
        });
        let mut estimated = record("100", "b", &[]);
        estimated.anchor = Some(Anchor {
            meta_id: None,
            timestamp_seconds: 900,
            estimated: true,
        });
        let agg = Aggregator::aggregate(&[matched, estimated], &MeetingCatalog::new(), &BTreeMap::new());
        assert_eq!(agg.summary.anchors_matched, 1);
        assert_eq!(agg.summary.anchors_estimated, 1);
    }
}
