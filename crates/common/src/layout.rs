use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const TMP_DIR_NAME: &str = "tmp";
pub const BACKUPS_DIR_NAME: &str = "backups";

/// On-disk working area: `<home>/tmp` holds intermediate artifacts (site
/// archive, database dump), `<home>/backups` holds final combined archives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupLayout {
    pub home: PathBuf,
    pub tmp: PathBuf,
    pub backups: PathBuf,
}

impl BackupLayout {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            tmp: home.join(TMP_DIR_NAME),
            backups: home.join(BACKUPS_DIR_NAME),
            home,
        }
    }

    /// Create any missing directory of the layout
    pub fn ensure(&self) -> io::Result<()> {
        for dir in [&self.home, &self.tmp, &self.backups] {
            if !dir.exists() {
                tracing::debug!(path = %dir.display(), "creating directory");
                fs::create_dir_all(dir)?;
            }
        }
        Ok(())
    }

    /// Directories whose contents are disposable
    pub fn work_dirs(&self) -> [&Path; 2] {
        [&self.tmp, &self.backups]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_creates_tree() {
        let temp = TempDir::new().unwrap();
        let layout = BackupLayout::new(temp.path().join(".backuper"));
        layout.ensure().unwrap();

        assert!(layout.tmp.is_dir());
        assert!(layout.backups.is_dir());
        assert_eq!(layout.tmp, temp.path().join(".backuper/tmp"));

        // idempotent
        layout.ensure().unwrap();
    }
}
