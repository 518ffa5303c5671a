//! Config materialization port.

use std::io;
use std::path::PathBuf;

use crate::domain::{EntityId, EntityKind};

/// Writes rendered configs where the frp binaries can read them.
///
/// Paths are deterministic per kind and id, so cleanup works even when the
/// original write happened in an earlier host process.
pub trait ConfigMaterializerPort: Send + Sync {
    /// Write `contents` for the entity, replacing any previous file.
    /// Returns the path handed to the binary via `-c`.
    fn materialize(&self, kind: EntityKind, id: EntityId, contents: &str) -> io::Result<PathBuf>;

    /// Remove the entity's config file. A missing file is success; other
    /// failures are for the caller to log, not raise.
    fn cleanup(&self, kind: EntityKind, id: EntityId) -> io::Result<()>;

    /// Where the entity's config lives. No I/O.
    fn path_for(&self, kind: EntityKind, id: EntityId) -> PathBuf;
}
