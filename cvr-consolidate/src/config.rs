//! Configuration resolution for cvr-consolidate
//!
//! One TOML file carries logging, input/output paths, and the consolidation
//! policy. Paths resolve with CLI → ENV → TOML priority; the policy comes from
//! TOML only, with compiled defaults for anything omitted.

use crate::policy::ConsolidationPolicy;
use cvr_common::config::{
    load_toml_config, resolve_config_path, resolve_store_path, LoggingConfig, PathsConfig,
};
use cvr_common::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Full configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CvrConfig {
    pub logging: LoggingConfig,
    pub paths: PathsConfig,
    pub policy: ConsolidationPolicy,
}

/// Config plus the file it came from (if any)
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: CvrConfig,
    pub source: Option<PathBuf>,
}

/// Locate and load the config file
///
/// **Priority:** `--config` → `CVR_CONFIG` → platform default (if present).
/// No file at all yields the compiled defaults.
pub fn load_config(cli_config: Option<&Path>) -> Result<LoadedConfig> {
    let source = resolve_config_path(cli_config);
    let config: CvrConfig = load_toml_config(source.as_deref())?;
    Ok(LoadedConfig { config, source })
}

/// Paths for one run after CLI overrides
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    pub store: PathBuf,
    pub observations: Option<PathBuf>,
    pub anchors: Option<PathBuf>,
    pub meetings: Option<PathBuf>,
    pub report: Option<PathBuf>,
}

/// CLI path arguments, each overriding its `[paths]` entry
#[derive(Debug, Clone, Copy, Default)]
pub struct PathOverrides<'a> {
    pub store: Option<&'a Path>,
    pub observations: Option<&'a Path>,
    pub anchors: Option<&'a Path>,
    pub meetings: Option<&'a Path>,
    pub report: Option<&'a Path>,
}

/// Resolve run paths
///
/// The store path also honours `CVR_STORE` between CLI and TOML.
pub fn resolve_run_paths(paths: &PathsConfig, cli: PathOverrides<'_>) -> RunPaths {
    let pick = |cli: Option<&Path>, toml: &Option<PathBuf>| {
        cli.map(Path::to_path_buf).or_else(|| toml.clone())
    };

    let resolved = RunPaths {
        store: resolve_store_path(cli.store, paths.store.as_deref()),
        observations: pick(cli.observations, &paths.observations),
        anchors: pick(cli.anchors, &paths.anchors),
        meetings: pick(cli.meetings, &paths.meetings),
        report: pick(cli.report, &paths.report),
    };
    info!("Store: {}", resolved.store.display());
    resolved
}
