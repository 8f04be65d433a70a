use std::fs::Metadata;
use std::path::Path;

/// Hooks around each per-file copy made by the [`Archiver`](super::Archiver).
///
/// Observers only watch: they cannot fail, skip a file or change the outcome of
/// an archiving call. `after_copy` runs only once the file's bytes were copied
/// in full.
pub trait ArchiveObserver: Send + Sync {
    fn before_copy(&self, _path: &Path, _metadata: &Metadata) {}

    fn after_copy(&self, _path: &Path, _metadata: &Metadata) {}
}

/// Observer that does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ArchiveObserver for NoopObserver {}
