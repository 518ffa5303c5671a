//! Canonical locations for the data directory, the store file, and
//! materialized configs.
//!
//! Everything lives under one data root so a backup or a wipe is a single
//! directory. Only [`data_root`] reads the environment; the other helpers
//! are pure joins on an explicit root, which keeps them trivially testable
//! and lets the CLI thread a `--data-dir` override through.

use std::env;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Environment override for the data root.
pub const HOME_ENV: &str = "FRPDESK_HOME";

/// Directory under `$HOME` when no override is set.
pub const DEFAULT_DIR_NAME: &str = ".frpdesk";

#[derive(Debug, Error)]
pub enum PathError {
    #[error("could not determine a home directory; set {HOME_ENV}")]
    NoHomeDir,
}

/// Resolve the data root.
///
/// Resolution order:
/// 1. `FRPDESK_HOME` environment variable (highest priority)
/// 2. `~/.frpdesk`
pub fn data_root() -> Result<PathBuf, PathError> {
    if let Ok(path) = env::var(HOME_ENV)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }
    let home = dirs::home_dir().ok_or(PathError::NoHomeDir)?;
    Ok(home.join(DEFAULT_DIR_NAME))
}

/// The JSON store file under `root`.
pub fn store_path(root: &Path) -> PathBuf {
    root.join("frpdesk.json")
}

/// Directory for materialized frp config files under `root`.
pub fn configs_dir(root: &Path) -> PathBuf {
    root.join("configs")
}
