//! Config file materialization.
//!
//! Rendered TOML lands in one directory, one file per entity, named
//! `<stem>-<id>.toml` (`frpc-3.toml`, `frps-1.toml`). Names are
//! deterministic so cleanup works even when the write happened in an
//! earlier host process.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use frpdesk_core::domain::{EntityId, EntityKind};
use frpdesk_core::ports::ConfigMaterializerPort;

/// Materializes configs under a single directory.
///
/// Writes go through a temp file and a rename, so the frp binary never
/// reads a half-written config.
pub struct ConfigDir {
    dir: PathBuf,
}

impl ConfigDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(kind: EntityKind, id: EntityId) -> String {
        format!("{}-{id}.toml", kind.config_stem())
    }
}

impl ConfigMaterializerPort for ConfigDir {
    fn materialize(&self, kind: EntityKind, id: EntityId, contents: &str) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let path = self.path_for(kind, id);
        let temp = self.dir.join(format!("{}.tmp", Self::file_name(kind, id)));
        fs::write(&temp, contents)?;
        fs::rename(&temp, &path)?;

        debug!(path = %path.display(), "config written");
        Ok(path)
    }

    fn cleanup(&self, kind: EntityKind, id: EntityId) -> io::Result<()> {
        match fs::remove_file(self.path_for(kind, id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn path_for(&self, kind: EntityKind, id: EntityId) -> PathBuf {
        self.dir.join(Self::file_name(kind, id))
    }
}
