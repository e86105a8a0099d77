//! JSON store persistence
//!
//! The consolidated store is a single JSON document. Writers never modify it
//! in place: a new snapshot is written to a temp file in the same directory
//! and renamed over the old one, so readers see either the previous snapshot
//! or the new one.

use crate::models::ConsolidatedStore;
use crate::{Error, Result};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Load the store, returning an empty store when the file does not exist
pub fn load_store(path: &Path) -> Result<ConsolidatedStore> {
    if !path.exists() {
        info!(path = %path.display(), "No existing store; starting from empty");
        return Ok(ConsolidatedStore::default());
    }

    let store: ConsolidatedStore = load_json(path)?;
    debug!(
        path = %path.display(),
        votes = store.votes.len(),
        observations = store.observations.len(),
        "Loaded store"
    );
    Ok(store)
}

/// Replace the store file atomically
pub fn save_store(path: &Path, store: &ConsolidatedStore) -> Result<()> {
    let bytes = to_store_json(store)?;
    write_atomic(path, &bytes)?;
    info!(path = %path.display(), votes = store.votes.len(), "Saved store");
    Ok(())
}

/// Copy the current store to `<file>.<UTC timestamp>.bak`
///
/// Returns `None` when there is nothing to back up.
pub fn backup_store(path: &Path) -> Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::InvalidInput(format!("Invalid store path: {}", path.display())))?;
    let stamp = Utc::now().format("%Y%m%dT%H%M%SZ");

    let mut backup = path.with_file_name(format!("{}.{}.bak", file_name, stamp));
    let mut n = 1;
    while backup.exists() {
        backup = path.with_file_name(format!("{}.{}-{}.bak", file_name, stamp, n));
        n += 1;
    }

    std::fs::copy(path, &backup)?;
    info!(backup = %backup.display(), "Backed up store");
    Ok(Some(backup))
}

/// Serialized form of a store as written to disk
pub fn to_store_json(store: &ConsolidatedStore) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(store)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// SHA-256 of the serialized store
pub fn store_digest(store: &ConsolidatedStore) -> Result<String> {
    let bytes = to_store_json(store)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

/// Read and decode a JSON input file
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read(path).map_err(|e| {
        Error::InvalidInput(format!("Failed to read {}: {}", path.display(), e))
    })?;
    let value = serde_json::from_slice(&content)?;
    Ok(value)
}

/// Encode a value as pretty JSON and write it atomically
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    write_atomic(path, &bytes)
}

/// Write `contents` to a temp file beside `path` and rename it into place
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let mut temp = tempfile::NamedTempFile::new_in(&dir)?;
    temp.write_all(contents)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CanonicalVoteRecord, VoteResult, VoteTally};
    use std::collections::BTreeMap;

    fn sample_store() -> ConsolidatedStore {
        ConsolidatedStore {
            votes: vec![CanonicalVoteRecord {
                meeting_id: "100".to_string(),
                normalized_agenda_key: "consent calendar".to_string(),
                agenda_display_text: "5A. Consent Calendar".to_string(),
                frame_number: Some(3),
                individual_votes: BTreeMap::new(),
                vote_tally: VoteTally::default(),
                result: VoteResult::Tie,
                anchor: None,
                source_frame_reference: None,
                provenance: vec!["obs-1".to_string()],
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_digest_is_stable() {
        let a = store_digest(&sample_store()).unwrap();
        let b = store_digest(&sample_store()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, store_digest(&ConsolidatedStore::default()).unwrap());
    }

    #[test]
    fn test_store_json_ends_with_newline() {
        let bytes = to_store_json(&sample_store()).unwrap();
        assert_eq!(bytes.last(), Some(&b'\n'));
    }
}
