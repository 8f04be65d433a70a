use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum CleanupError {
    #[error("cannot list {path}: {source}")]
    List {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot remove {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Remove every immediate child of each directory in `dirs`, recursively.
///
/// The directories themselves stay. Stops at the first failure: entries already
/// removed stay removed, the rest are left alone. Returns how many entries were
/// removed.
pub fn cleanup<P: AsRef<Path>>(dirs: &[P]) -> Result<usize, CleanupError> {
    let mut removed = 0;

    for dir in dirs {
        let dir = dir.as_ref();
        let list_err = |source| CleanupError::List {
            path: dir.to_path_buf(),
            source,
        };

        for entry in fs::read_dir(dir).map_err(list_err)? {
            let entry = entry.map_err(list_err)?;
            let path = entry.path();

            // symlinks are removed, never followed
            let result = match entry.file_type() {
                Ok(kind) if kind.is_dir() => fs::remove_dir_all(&path),
                Ok(_) => fs::remove_file(&path),
                Err(e) => Err(e),
            };
            result.map_err(|source| CleanupError::Remove {
                path: path.clone(),
                source,
            })?;

            tracing::debug!(path = %path.display(), "removed");
            removed += 1;
        }
    }

    Ok(removed)
}
