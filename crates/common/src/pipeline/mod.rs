//! The backup pipeline.
//!
//! A run walks a fixed sequence of stages and stops at the first failure:
//!
//! ```text
//! archive_site -> dump_db -> combine_archive -> transfer -> done
//!      |             |              |               |
//!      +-------------+--------------+---------------+--> failed(stage, cause)
//! ```
//!
//! Every stage closes what it wrote before the next one starts. Nothing is rolled
//! back on failure and nothing is cleaned up on success: artifacts stay in the
//! layout's `tmp/` and `backups/` directories until an explicit cleanup.

mod events;

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::archive::{ArchiveError, ArchiveInfo, Archiver};
use crate::dump::{DumpArtifact, DumpError, DumpSource};
use crate::layout::BackupLayout;
use crate::naming::{Clock, NamedArtifact, FINAL_PREFIX, SITE_PREFIX, ZIP_EXT};
use crate::transfer::{
    NoopTransferObserver, ProgressReader, RemoteCopy, TransferError, TransferObserver,
};

pub use events::{EventSink, PipelineEvent, TracingEvents};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ArchiveSite,
    DumpDb,
    CombineArchive,
    Transfer,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::ArchiveSite,
        Stage::DumpDb,
        Stage::CombineArchive,
        Stage::Transfer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::ArchiveSite => "archive_site",
            Stage::DumpDb => "dump_db",
            Stage::CombineArchive => "combine_archive",
            Stage::Transfer => "transfer",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of a run: the stage that failed and why.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("archive_site failed: {0}")]
    ArchiveSite(#[source] ArchiveError),
    #[error("dump_db failed: {0}")]
    DumpDb(#[source] DumpError),
    #[error("combine_archive failed: {0}")]
    CombineArchive(#[source] ArchiveError),
    #[error("transfer failed: {0}")]
    Transfer(#[source] TransferError),
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::ArchiveSite(_) => Stage::ArchiveSite,
            PipelineError::DumpDb(_) => Stage::DumpDb,
            PipelineError::CombineArchive(_) => Stage::CombineArchive,
            PipelineError::Transfer(_) => Stage::Transfer,
        }
    }
}

/// What a run needs to know about the local and remote sides
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory tree to back up
    pub site_dir: PathBuf,
    pub layout: BackupLayout,
    /// Remote login; also names the default remote home directory
    pub remote_username: String,
    /// Existing remote directory for uploads, `/home/<remote_username>` when unset
    pub remote_dir: Option<String>,
}

/// Artifacts of a successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupReport {
    pub run_id: Uuid,
    pub site_archive: PathBuf,
    pub dump: DumpArtifact,
    pub archive: ArchiveInfo,
    pub remote_path: String,
}

impl fmt::Display for BackupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Backup {} complete\n\
             - Site archive: {}\n\
             - Database dump: {} ({} bytes)\n\
             - Final archive: {} ({} bytes)\n\
             - Remote: {}",
            self.run_id,
            self.site_archive.display(),
            self.dump.path.display(),
            self.dump.size,
            self.archive.path.display(),
            self.archive.size,
            self.remote_path
        )
    }
}

/// Remote path for an uploaded archive named `file_name`
pub fn remote_destination(remote_dir: Option<&str>, username: &str, file_name: &str) -> String {
    match remote_dir.filter(|dir| !dir.is_empty()) {
        Some(dir) => format!("{}/{}", dir.trim_end_matches('/'), file_name),
        None => format!("/home/{}/{}", username, file_name),
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    archiver: Archiver,
    dump: Arc<dyn DumpSource>,
    remote: Arc<dyn RemoteCopy>,
    events: Arc<dyn EventSink>,
    transfer_observer: Arc<dyn TransferObserver>,
    clock: Clock,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        dump: Arc<dyn DumpSource>,
        remote: Arc<dyn RemoteCopy>,
    ) -> Self {
        Self {
            config,
            archiver: Archiver::new(),
            dump,
            remote,
            events: Arc::new(TracingEvents),
            transfer_observer: Arc::new(NoopTransferObserver),
            clock: Clock::system(),
        }
    }

    pub fn with_archiver(mut self, archiver: Archiver) -> Self {
        self.archiver = archiver;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_transfer_observer(mut self, observer: Arc<dyn TransferObserver>) -> Self {
        self.transfer_observer = observer;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage in order, stopping at the first failure.
    pub fn run(&self) -> Result<BackupReport, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("backup", %run_id);
        let _guard = span.enter();

        let result = self.run_stages(run_id);
        match &result {
            Ok(report) => self.events.emit(&PipelineEvent::Finished(report.clone())),
            Err(e) => self.events.emit(&PipelineEvent::StageFailed {
                stage: e.stage(),
                error: e.to_string(),
            }),
        }
        result
    }

    fn run_stages(&self, run_id: Uuid) -> Result<BackupReport, PipelineError> {
        self.started(Stage::ArchiveSite);
        let site_archive = self.archive_site().map_err(PipelineError::ArchiveSite)?;
        self.completed(Stage::ArchiveSite, site_archive.display());

        self.started(Stage::DumpDb);
        let dump = self.dump_db().map_err(PipelineError::DumpDb)?;
        self.completed(Stage::DumpDb, dump.path.display());

        self.started(Stage::CombineArchive);
        let archive = self
            .combine_archive(&site_archive, &dump)
            .map_err(PipelineError::CombineArchive)?;
        self.completed(Stage::CombineArchive, archive.path.display());

        self.started(Stage::Transfer);
        let remote_path = self.transfer(&archive).map_err(PipelineError::Transfer)?;
        self.completed(Stage::Transfer, &remote_path);

        Ok(BackupReport {
            run_id,
            site_archive,
            dump,
            archive,
            remote_path,
        })
    }

    fn started(&self, stage: Stage) {
        self.events.emit(&PipelineEvent::StageStarted(stage));
    }

    fn completed(&self, stage: Stage, artifact: impl fmt::Display) {
        self.events.emit(&PipelineEvent::StageCompleted {
            stage,
            artifact: artifact.to_string(),
        });
    }

    fn archive_site(&self) -> Result<PathBuf, ArchiveError> {
        let dest = NamedArtifact::now(SITE_PREFIX, ZIP_EXT, &self.clock)
            .path_in(&self.config.layout.tmp);
        self.archiver.archive_tree(&self.config.site_dir, &dest)?;
        Ok(dest)
    }

    fn dump_db(&self) -> Result<DumpArtifact, DumpError> {
        self.dump.dump(&self.config.layout.tmp)
    }

    fn combine_archive(
        &self,
        site_archive: &Path,
        dump: &DumpArtifact,
    ) -> Result<ArchiveInfo, ArchiveError> {
        let dest = NamedArtifact::now(FINAL_PREFIX, ZIP_EXT, &self.clock)
            .path_in(&self.config.layout.backups);
        self.archiver
            .archive_files(&[site_archive, dump.path.as_path()], &dest)
    }

    fn transfer(&self, archive: &ArchiveInfo) -> Result<String, TransferError> {
        let local_err = |source: io::Error| TransferError::Local {
            path: archive.path.clone(),
            source,
        };
        let file = File::open(&archive.path).map_err(local_err)?;
        let size = file.metadata().map_err(local_err)?.len();

        let dest = remote_destination(
            self.config.remote_dir.as_deref(),
            &self.config.remote_username,
            &archive.name,
        );

        let mut reader =
            ProgressReader::new(BufReader::new(file), size, self.transfer_observer.clone());
        self.remote.copy(&mut reader, &dest, size)?;
        reader.finish();

        Ok(dest)
    }
}
