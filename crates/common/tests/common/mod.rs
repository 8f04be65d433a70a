//! Shared test utilities for archive and pipeline integration tests
#![allow(dead_code)]

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use common::layout::BackupLayout;
use common::naming::Clock;
use tempfile::TempDir;
use zip::CompressionMethod;

/// One entry as read back from a finished archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub size: u64,
    pub compressed_size: u64,
    pub compression: CompressionMethod,
    pub bytes: Vec<u8>,
}

/// Route library logs to the test harness; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Clock pinned to 2024-01-15 14:03:02
pub fn fixed_clock() -> Clock {
    let at = NaiveDate::from_ymd_opt(2024, 1, 15)
        .and_then(|d| d.and_hms_opt(14, 3, 2))
        .unwrap();
    Clock::fixed(at)
}

/// A site tree with a few nested files:
///
/// ```text
/// site/
///   index.html
///   assets/app.css
///   assets/img/logo.png
///   empty/
/// ```
pub fn site_tree(root: &Path) -> PathBuf {
    let site = root.join("site");
    fs::create_dir_all(site.join("assets/img")).unwrap();
    fs::create_dir_all(site.join("empty")).unwrap();
    fs::write(site.join("index.html"), "<html>hello</html>").unwrap();
    fs::write(site.join("assets/app.css"), "body { margin: 0 }").unwrap();
    fs::write(site.join("assets/img/logo.png"), [0x89, b'P', b'N', b'G']).unwrap();
    site
}

/// A fresh layout rooted at `<temp>/.backuper`, directories created
pub fn layout(temp: &TempDir) -> BackupLayout {
    let layout = BackupLayout::new(temp.path().join(".backuper"));
    layout.ensure().unwrap();
    layout
}

/// Read every entry of the archive at `path`, in stored order
pub fn entries(path: &Path) -> Vec<Entry> {
    let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut out = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).unwrap();
        let mut bytes = Vec::new();
        std::io::copy(&mut file, &mut bytes).unwrap();
        out.push(Entry {
            name: file.name().to_string(),
            size: file.size(),
            compressed_size: file.compressed_size(),
            compression: file.compression(),
            bytes,
        });
    }
    out
}

pub fn entry_names(path: &Path) -> Vec<String> {
    entries(path).into_iter().map(|e| e.name).collect()
}

/// Names of the files directly inside `dir`, sorted
pub fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<_> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
