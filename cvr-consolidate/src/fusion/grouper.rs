//! Duplicate Grouper
//!
//! Clusters normalized observations that describe the same ballot.
//!
//! # Algorithm
//! 1. Partition by `(meeting_id, normalized_agenda_key)`
//! 2. Move truncated observations ("Approve the...") into the partition of
//!    the unique longer key in the same meeting that starts with their stem
//! 3. Within a partition, link observations whose frame numbers are within
//!    the proximity window; strong keys also link on identical full text
//! 4. Each connected component is one group
//!
//! # Group keys
//! A strong partition's earliest group keeps the key; later groups (the same
//! title voted again later in the meeting) become `"{key} #2"`, `"{key} #3"`.
//! Groups in a weak partition ("9a", empty) are keyed by their earliest frame
//! so that generic titles are never merged across the meeting.
//!
//! Output order depends only on observation content, never on input order.

use crate::normalize::agenda::{ends_with_ellipsis, truncation_stem};
use crate::normalize::{is_weak_key, NormalizedObservation};
use std::collections::BTreeMap;
use tracing::debug;

/// Default frame distance under which two observations are linked
pub const DEFAULT_PROXIMITY_WINDOW: u64 = 5;

/// Default minimum length of a key that identifies a vote on its own
pub const DEFAULT_MIN_KEY_CHARS: usize = 4;

/// `(meeting_id, normalized_agenda_key)`
pub type PartitionKey = (String, String);

/// Observations believed to describe one ballot
#[derive(Debug, Clone)]
pub struct ObservationGroup {
    pub meeting_id: String,
    /// Key of the canonical record this group produces
    pub group_key: String,
    /// Agenda key of the partition the group came from
    pub partition_key: String,
    /// Sorted by frame (missing last), then provenance id
    pub observations: Vec<NormalizedObservation>,
}

impl ObservationGroup {
    pub fn min_frame(&self) -> Option<u64> {
        self.observations.iter().filter_map(|o| o.frame_number()).min()
    }
}

/// Duplicate grouper
pub struct DuplicateGrouper {
    proximity_window: u64,
    min_key_chars: usize,
}

impl DuplicateGrouper {
    pub fn new() -> Self {
        Self::with_settings(DEFAULT_PROXIMITY_WINDOW, DEFAULT_MIN_KEY_CHARS)
    }

    pub fn with_settings(proximity_window: u64, min_key_chars: usize) -> Self {
        Self {
            proximity_window,
            min_key_chars,
        }
    }

    /// Group observations into per-ballot clusters
    pub fn group(&self, observations: Vec<NormalizedObservation>) -> Vec<ObservationGroup> {
        self.partition(observations)
            .into_iter()
            .flat_map(|(key, members)| self.group_partition(&key, members))
            .collect()
    }

    /// Partition observations by `(meeting, key)` after truncated-prefix absorption
    pub fn partition(
        &self,
        mut observations: Vec<NormalizedObservation>,
    ) -> BTreeMap<PartitionKey, Vec<NormalizedObservation>> {
        observations.sort_by(|a, b| a.provenance_id.cmp(&b.provenance_id));
        self.absorb_truncated(&mut observations);

        let mut partitions: BTreeMap<PartitionKey, Vec<NormalizedObservation>> = BTreeMap::new();
        for obs in observations {
            partitions
                .entry((obs.meeting_id().to_string(), obs.agenda_key.clone()))
                .or_default()
                .push(obs);
        }
        partitions
    }

    /// Rewrite the key of each truncated observation that has a unique longer match
    fn absorb_truncated(&self, observations: &mut [NormalizedObservation]) {
        // Keys of complete (non-truncated) observations, with their frames, per meeting
        let mut complete: BTreeMap<String, BTreeMap<String, Vec<Option<u64>>>> = BTreeMap::new();
        for obs in observations.iter() {
            if !ends_with_ellipsis(&obs.agenda_text) && !obs.agenda_key.is_empty() {
                complete
                    .entry(obs.meeting_id().to_string())
                    .or_default()
                    .entry(obs.agenda_key.clone())
                    .or_default()
                    .push(obs.frame_number());
            }
        }

        for obs in observations.iter_mut() {
            let Some(stem) = truncation_stem(&obs.agenda_text) else {
                continue;
            };
            if is_weak_key(&stem, self.min_key_chars) {
                continue;
            }
            let Some(keys) = complete.get(obs.meeting_id()) else {
                continue;
            };

            let frame = obs.frame_number();
            let target = keys
                .iter()
                .filter(|(key, _)| key.len() > stem.len() && key.starts_with(&stem))
                .min_by(|(ka, fa), (kb, fb)| {
                    nearest_distance(frame, fa)
                        .cmp(&nearest_distance(frame, fb))
                        .then_with(|| ka.cmp(kb))
                })
                .map(|(key, _)| key.clone());

            if let Some(target) = target {
                if target != obs.agenda_key {
                    debug!(
                        meeting_id = %obs.meeting_id(),
                        observation = %obs.provenance_id,
                        from = %obs.agenda_key,
                        to = %target,
                        "Absorbing truncated agenda text"
                    );
                    obs.agenda_key = target;
                }
            }
        }
    }

    /// Split one partition into connected components
    pub fn group_partition(
        &self,
        key: &PartitionKey,
        mut members: Vec<NormalizedObservation>,
    ) -> Vec<ObservationGroup> {
        let (meeting_id, agenda_key) = key;
        let weak = is_weak_key(agenda_key, self.min_key_chars);

        members.sort_by(|a, b| {
            frame_order(a.frame_number(), b.frame_number())
                .then_with(|| a.provenance_id.cmp(&b.provenance_id))
        });

        let mut links = UnionFind::new(members.len());
        for i in 0..members.len() {
            for j in (i + 1)..members.len() {
                let near = match (members[i].frame_number(), members[j].frame_number()) {
                    (Some(a), Some(b)) => a.abs_diff(b) <= self.proximity_window,
                    _ => false,
                };
                let same_text = !weak
                    && !members[i].full_text.is_empty()
                    && members[i].full_text == members[j].full_text;
                if near || same_text {
                    links.union(i, j);
                }
            }
        }

        // Roots are the smallest member index, so components come out earliest first
        let mut components: BTreeMap<usize, Vec<NormalizedObservation>> = BTreeMap::new();
        for (i, obs) in members.into_iter().enumerate() {
            let root = links.find(i);
            components.entry(root).or_default().push(obs);
        }

        let groups: Vec<ObservationGroup> = components
            .into_values()
            .enumerate()
            .map(|(n, observations)| {
                let group_key = if weak {
                    match observations.iter().filter_map(|o| o.frame_number()).min() {
                        Some(frame) => format!("{}@frame {}", agenda_key, frame),
                        None => format!("{}@{}", agenda_key, observations[0].provenance_id),
                    }
                } else if n == 0 {
                    agenda_key.clone()
                } else {
                    format!("{} #{}", agenda_key, n + 1)
                };
                ObservationGroup {
                    meeting_id: meeting_id.clone(),
                    group_key,
                    partition_key: agenda_key.clone(),
                    observations,
                }
            })
            .collect();

        debug!(
            meeting_id = %meeting_id,
            key = %agenda_key,
            weak,
            groups = groups.len(),
            "Grouped partition"
        );
        groups
    }
}

impl Default for DuplicateGrouper {
    fn default() -> Self {
        Self::new()
    }
}

/// Frame ordering with missing frames last
fn frame_order(a: Option<u64>, b: Option<u64>) -> std::cmp::Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
}

fn nearest_distance(frame: Option<u64>, candidates: &[Option<u64>]) -> u64 {
    let Some(frame) = frame else {
        return u64::MAX;
    };
    candidates
        .iter()
        .flatten()
        .map(|c| c.abs_diff(frame))
        .min()
        .unwrap_or(u64::MAX)
}

/// Disjoint-set forest over observation indices
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, i: usize) -> usize {
        let mut root = i;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = i;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    /// Smaller index becomes the root
    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }
}
