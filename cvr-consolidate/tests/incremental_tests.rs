//! Incremental Consolidation Tests
//! Test File: incremental_tests.rs
//!
//! Incremental runs must produce exactly what a full run over the union of
//! all observations would, while copying untouched records verbatim.

mod helpers;

use cvr_common::models::{ConsolidatedStore, RawVoteObservation};
use cvr_common::store::to_store_json;
use cvr_consolidate::{ConsolidationError, ConsolidationMode, Consolidator, DropReason};
use helpers::{input, obs, run, run_full, sample_meeting};
use tokio_util::sync::CancellationToken;

fn later_observations() -> Vec<RawVoteObservation> {
    vec![
        // Complete title for a partition that so far only had a truncated one
        obs("15A. Approve Sewer Rehabilitation Contract")
            .id("n1")
            .frame(120)
            .all("Y")
            .build(),
        // Second reading of an existing ballot
        obs("12C. Public Hearing on Sign Code")
            .id("n2")
            .frame(91)
            .vote("BRIDGET LEWIS", "N")
            .build(),
        // A brand-new meeting
        obs("3B. Accept and File Minutes")
            .meeting("102")
            .id("n3")
            .frame(7)
            .all("Y")
            .build(),
    ]
}

fn first_batch() -> Vec<RawVoteObservation> {
    let mut batch = sample_meeting();
    batch.push(
        obs("15A. Approve Sewer Rehab...")
            .id("t1")
            .frame(118)
            .vote("GEORGE CHEN", "Y")
            .build(),
    );
    batch
}

/// TC-INC-001: Incremental over a split equals full over the union
/// **Type:** Property | **Priority:** P0
#[test]
fn tc_inc_001_incremental_matches_full() {
    // Given: a store built from the first batch
    let base = run_full(first_batch());

    // When: the later batch is added incrementally
    let incremental = run(&base.store, later_observations(), ConsolidationMode::Incremental);

    // Then: the store equals a full run over both batches
    let mut union = first_batch();
    union.extend(later_observations());
    let full = run_full(union);

    assert_eq!(
        to_store_json(&incremental.store).unwrap(),
        to_store_json(&full.store).unwrap()
    );
    assert_eq!(incremental.report.store_digest, full.report.store_digest);
}

/// TC-INC-002: Untouched partitions are copied, touched ones rebuilt
/// **Type:** Integration | **Priority:** P0
#[test]
fn tc_inc_002_untouched_records_copied() {
    let base = run_full(first_batch());
    let incremental = run(&base.store, later_observations(), ConsolidationMode::Incremental);
    let merge = incremental.report.merge;

    // Consent, budget, and the 101 hearing are untouched
    assert_eq!(merge.records_unchanged, 3);
    // Sewer contract (absorbed truncation), 100 hearing, new meeting 102
    assert_eq!(merge.records_rebuilt, 3);
    assert_eq!(merge.records_total, 6);

    for kept in ["5a. consent calendar", "8b. resolution adopting budget"] {
        let before = base
            .store
            .votes
            .iter()
            .find(|r| r.meeting_id == "100" && r.normalized_agenda_key == kept)
            .unwrap();
        let after = incremental
            .store
            .votes
            .iter()
            .find(|r| r.meeting_id == "100" && r.normalized_agenda_key == kept)
            .unwrap();
        assert_eq!(before, after);
    }

    // The truncated-only record was replaced by the complete title
    assert!(incremental
        .store
        .votes
        .iter()
        .all(|r| !r.agenda_display_text.ends_with("...")));
    assert!(incremental.store.meetings.contains_key("102"));
}

/// TC-INC-003: Incremental run with nothing new rebuilds nothing
/// **Type:** Integration | **Priority:** P1
#[test]
fn tc_inc_003_no_new_observations_copies_everything() {
    let base = run_full(sample_meeting());
    let incremental = run(&base.store, Vec::new(), ConsolidationMode::Incremental);

    assert_eq!(incremental.report.merge.records_rebuilt, 0);
    assert_eq!(
        incremental.report.merge.records_unchanged,
        base.store.votes.len()
    );
    assert_eq!(incremental.store, base.store);
}

/// TC-INC-004: Same id with different content is dropped, archive wins
/// **Type:** Integration | **Priority:** P1
#[test]
fn tc_inc_004_conflicting_resubmission_dropped() {
    let base = run_full(sample_meeting());
    let altered = obs("5A. Consent Calendar").id("v1").frame(10).all("N").build();

    let outcome = run(&base.store, vec![altered], ConsolidationMode::Incremental);

    assert_eq!(outcome.report.dropped.len(), 1);
    assert_eq!(outcome.report.dropped[0].observation_id, "v1");
    assert_eq!(
        outcome.report.dropped[0].reason,
        DropReason::DuplicateObservationId
    );
    assert_eq!(outcome.store.votes, base.store.votes);
}

/// TC-INC-005: A cancelled run returns no store
/// **Type:** Integration | **Priority:** P1
#[test]
fn tc_inc_005_cancelled_run_produces_no_store() {
    let base = run_full(sample_meeting());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = Consolidator::default().consolidate_with_cancel(
        &base.store,
        input(later_observations()),
        ConsolidationMode::Incremental,
        &cancel,
    );

    assert!(matches!(result, Err(ConsolidationError::Cancelled)));
}

/// TC-INC-006: Incremental from an empty store equals a full run
/// **Type:** Property | **Priority:** P2
#[test]
fn tc_inc_006_incremental_from_empty_store() {
    let incremental = run(
        &ConsolidatedStore::default(),
        sample_meeting(),
        ConsolidationMode::Incremental,
    );
    let full = run_full(sample_meeting());
    assert_eq!(incremental.store, full.store);
    assert_eq!(incremental.report.merge.records_unchanged, 0);
}
