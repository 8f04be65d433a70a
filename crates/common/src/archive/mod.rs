//! ZIP archiving of directory trees and explicit file lists.
//!
//! Both entry points write DEFLATE entries through the same per-file copy path, so
//! the instrumented and plain variants are one implementation: instrumentation is an
//! injected [`ArchiveObserver`] that defaults to [`NoopObserver`].

mod observer;

use std::collections::HashSet;
use std::fs::{File, Metadata};
use std::io::{self, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub use observer::{ArchiveObserver, NoopObserver};

/// Compression used for every entry we write
pub const COMPRESSION: CompressionMethod = CompressionMethod::Deflated;

/// Entries at or above this size need zip64 headers
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("cannot create archive {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot copy {path} into archive: {source}")]
    Copy {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("zip error: {0}")]
    Zip(#[from] ZipError),
    #[error("directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("archive i/o error: {0}")]
    Io(#[from] io::Error),
}

/// What [`Archiver::archive_files`] produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveInfo {
    pub path: PathBuf,
    /// Base file name of the archive
    pub name: String,
    /// Size of the finished archive on disk, in bytes
    pub size: u64,
}

#[derive(Clone)]
pub struct Archiver {
    observer: Arc<dyn ArchiveObserver>,
}

impl Default for Archiver {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Archiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archiver").finish_non_exhaustive()
    }
}

impl Archiver {
    pub fn new() -> Self {
        Self {
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(observer: Arc<dyn ArchiveObserver>) -> Self {
        Self { observer }
    }

    /// Recursively archive every regular file under `source_dir` into `dest`.
    ///
    /// Entries are named by their full walked path (`source_dir` joined with the
    /// relative path) and visited in file-name order. Directories never become
    /// entries. The first error aborts the walk and leaves whatever was already
    /// written in `dest` on disk.
    pub fn archive_tree(&self, source_dir: &Path, dest: &Path) -> Result<(), ArchiveError> {
        let mut zip = ZipWriter::new(create_dest(dest)?);

        for entry in WalkDir::new(source_dir).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_dir() || entry.path() == dest {
                continue;
            }

            // follows symlinks, so a link to a file is archived as that file
            let metadata = std::fs::metadata(entry.path()).map_err(|source| ArchiveError::Open {
                path: entry.path().to_path_buf(),
                source,
            })?;
            if !metadata.is_file() {
                tracing::debug!(path = %entry.path().display(), "skipping non-regular entry");
                continue;
            }

            self.append(&mut zip, entry.path(), entry_name(entry.path()))?;
        }

        finish(zip)?;
        Ok(())
    }

    /// Combine an ordered list of existing files into one archive at `dest`.
    ///
    /// Each entry is named by the source's base file name and carries the
    /// source's unix mode. A base name already used by an earlier entry falls
    /// back to the path as given, so every input gets its own entry. No file is
    /// skipped: the first one that cannot be opened or fully copied fails the
    /// whole call.
    pub fn archive_files<P: AsRef<Path>>(
        &self,
        paths: &[P],
        dest: &Path,
    ) -> Result<ArchiveInfo, ArchiveError> {
        let mut zip = ZipWriter::new(create_dest(dest)?);
        let mut taken = HashSet::with_capacity(paths.len());

        for path in paths {
            let path = path.as_ref();
            let name = unique_entry_name(path, &mut taken);
            self.append(&mut zip, path, name)?;
        }

        let file = finish(zip)?;
        let size = file.metadata()?.len();

        Ok(ArchiveInfo {
            path: dest.to_path_buf(),
            name: dest
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            size,
        })
    }

    /// Open `path`, stat it, and stream its bytes into a new entry named `name`.
    /// The source handle is closed before returning.
    fn append<W: Write + Seek>(
        &self,
        zip: &mut ZipWriter<W>,
        path: &Path,
        name: String,
    ) -> Result<u64, ArchiveError> {
        let open_err = |source| ArchiveError::Open {
            path: path.to_path_buf(),
            source,
        };
        let mut file = File::open(path).map_err(open_err)?;
        let metadata = file.metadata().map_err(open_err)?;

        zip.start_file(name, entry_options(&metadata))?;

        self.observer.before_copy(path, &metadata);
        let copied = io::copy(&mut file, zip).map_err(|source| ArchiveError::Copy {
            path: path.to_path_buf(),
            source,
        })?;
        self.observer.after_copy(path, &metadata);

        tracing::trace!(path = %path.display(), bytes = copied, "archived file");
        Ok(copied)
    }
}

/// Count the non-directory entries under `dir`
pub fn count_files(dir: &Path) -> Result<u64, ArchiveError> {
    let mut count = 0;
    for entry in WalkDir::new(dir) {
        if !entry?.file_type().is_dir() {
            count += 1;
        }
    }
    Ok(count)
}

fn create_dest(dest: &Path) -> Result<BufWriter<File>, ArchiveError> {
    let file = File::create(dest).map_err(|source| ArchiveError::Create {
        path: dest.to_path_buf(),
        source,
    })?;
    Ok(BufWriter::new(file))
}

/// Write the central directory, flush and sync. Returns the closed-over file.
fn finish(zip: ZipWriter<BufWriter<File>>) -> Result<File, ArchiveError> {
    let writer = zip.finish()?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(file)
}

fn entry_options(metadata: &Metadata) -> SimpleFileOptions {
    let options = SimpleFileOptions::default()
        .compression_method(COMPRESSION)
        .large_file(metadata.len() >= ZIP64_THRESHOLD);

    #[cfg(unix)]
    let options = {
        use std::os::unix::fs::PermissionsExt;
        options.unix_permissions(metadata.permissions().mode())
    };

    options
}

/// Base name of `path`, else its full name, else the full name with a counter.
/// The chosen name is recorded in `taken`.
fn unique_entry_name(path: &Path, taken: &mut HashSet<String>) -> String {
    let full = entry_name(path);
    let base = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned());

    let mut name = match base {
        Some(base) if !taken.contains(&base) => base,
        _ => full.clone(),
    };
    let mut n = 1;
    while taken.contains(&name) {
        name = format!("{}~{}", full, n);
        n += 1;
    }

    taken.insert(name.clone());
    name
}

fn entry_name(path: &Path) -> String {
    let name = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        name.into_owned()
    } else {
        name.replace(std::path::MAIN_SEPARATOR, "/")
    }
}
