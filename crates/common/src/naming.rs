//! Time-based artifact names.
//!
//! Every artifact the pipeline writes is named `<prefix><YYYYMMDDTHHMMSS>.<ext>`,
//! e.g. `site_20240115T140302.zip`. Names only differ when generated at least one
//! second apart.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, NaiveDateTime};

/// strftime pattern shared by every generated name
pub const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

pub const SITE_PREFIX: &str = "site_";
pub const FINAL_PREFIX: &str = "final_";
pub const ZIP_EXT: &str = "zip";

/// Source of wall-clock time for artifact names.
///
/// Cloning is cheap; the default reads the local clock on every call.
#[derive(Clone)]
pub struct Clock(Arc<dyn Fn() -> NaiveDateTime + Send + Sync>);

impl Clock {
    pub fn system() -> Self {
        Self(Arc::new(|| Local::now().naive_local()))
    }

    /// A clock frozen at `at`
    pub fn fixed(at: NaiveDateTime) -> Self {
        Self(Arc::new(move || at))
    }

    pub fn now(&self) -> NaiveDateTime {
        (self.0)()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::system()
    }
}

impl fmt::Debug for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Clock").field(&self.now()).finish()
    }
}

/// A generated file name: prefix, second-precision timestamp and extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedArtifact {
    prefix: String,
    stamp: String,
    ext: String,
}

impl NamedArtifact {
    pub fn at(prefix: &str, ext: &str, at: NaiveDateTime) -> Self {
        Self {
            prefix: prefix.to_string(),
            stamp: at.format(TIMESTAMP_FORMAT).to_string(),
            ext: ext.to_string(),
        }
    }

    pub fn now(prefix: &str, ext: &str, clock: &Clock) -> Self {
        Self::at(prefix, ext, clock.now())
    }

    pub fn file_name(&self) -> String {
        self.to_string()
    }

    /// Full path of this artifact inside `dir`
    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }
}

impl fmt::Display for NamedArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}.{}", self.prefix, self.stamp, self.ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_name_format() {
        let name = NamedArtifact::at(SITE_PREFIX, ZIP_EXT, at(14, 3, 2));
        assert_eq!(name.file_name(), "site_20240115T140302.zip");
    }

    #[test]
    fn test_names_one_second_apart_differ() {
        let a = NamedArtifact::at(FINAL_PREFIX, ZIP_EXT, at(14, 3, 2));
        let b = NamedArtifact::at(FINAL_PREFIX, ZIP_EXT, at(14, 3, 3));
        assert_ne!(a, b);
    }

    #[test]
    fn test_same_second_collides() {
        let clock = Clock::fixed(at(9, 0, 0));
        let a = NamedArtifact::now(SITE_PREFIX, ZIP_EXT, &clock);
        let b = NamedArtifact::now(SITE_PREFIX, ZIP_EXT, &clock);
        assert_eq!(a, b);
    }

    #[test]
    fn test_path_in() {
        let name = NamedArtifact::at("db-", "sql", at(0, 0, 1));
        assert_eq!(
            name.path_in(Path::new("/tmp/backuper")),
            PathBuf::from("/tmp/backuper/db-20240115T000001.sql")
        );
    }
}
