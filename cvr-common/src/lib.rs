//! # Council Vote Records Common Library
//!
//! Shared code for the consolidation engine and its host binary:
//! - Data model (raw observations, canonical records, aggregates)
//! - Error type
//! - TOML configuration loading
//! - JSON store persistence (atomic replacement, backups, digests)

pub mod config;
pub mod error;
pub mod models;
pub mod store;

pub use error::{Error, Result};
