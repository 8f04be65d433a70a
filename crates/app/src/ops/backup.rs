use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use clap::Args;
use common::archive::count_files;
use common::prelude::{
    ArchiveObserver, Archiver, BackupReport, MysqlDump, Pipeline, PipelineConfig, PipelineError,
    ScpClient, TransferObserver,
};

use crate::state::{AppState, StateError};

/// Log a progress line every this many percent
const PROGRESS_STEP_PERCENT: u64 = 10;

#[derive(Args, Debug, Clone)]
pub struct Backup;

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error("backup failed: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("backup task did not complete: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("cannot render report: {0}")]
    Render(#[from] serde_json::Error),
}

/// The first progress step strictly above `percent`
fn next_step(percent: u64) -> u64 {
    percent - percent % PROGRESS_STEP_PERCENT + PROGRESS_STEP_PERCENT
}

/// Counts archived files against the number expected under the site directory
#[derive(Debug)]
struct ArchiveProgress {
    expected: u64,
    archived: AtomicU64,
    next_percent: AtomicU64,
}

impl ArchiveProgress {
    fn new(expected: u64) -> Self {
        Self {
            expected,
            archived: AtomicU64::new(0),
            next_percent: AtomicU64::new(PROGRESS_STEP_PERCENT),
        }
    }
}

impl ArchiveObserver for ArchiveProgress {
    fn before_copy(&self, path: &Path, metadata: &std::fs::Metadata) {
        tracing::trace!(path = %path.display(), size = metadata.len(), "archiving");
    }

    fn after_copy(&self, _path: &Path, _metadata: &std::fs::Metadata) {
        let archived = self.archived.fetch_add(1, Ordering::Relaxed) + 1;
        // the combine stage reuses this archiver; its files are past `expected`
        if self.expected == 0 || archived > self.expected {
            return;
        }
        let percent = archived * 100 / self.expected;
        let next = self.next_percent.load(Ordering::Relaxed);
        if percent >= next {
            self.next_percent.store(next_step(percent), Ordering::Relaxed);
            tracing::info!(archived, expected = self.expected, percent, "archiving site");
        }
    }
}

/// Logs upload progress in coarse steps
#[derive(Debug)]
struct TransferProgress {
    next_percent: AtomicU64,
}

impl Default for TransferProgress {
    fn default() -> Self {
        Self {
            next_percent: AtomicU64::new(PROGRESS_STEP_PERCENT),
        }
    }
}

impl TransferObserver for TransferProgress {
    fn on_progress(&self, transferred: u64, total: u64) {
        if total == 0 {
            return;
        }
        let percent = transferred.saturating_mul(100) / total;
        let next = self.next_percent.load(Ordering::Relaxed);
        if percent >= next && percent < 100 {
            self.next_percent.store(next_step(percent), Ordering::Relaxed);
            tracing::info!(transferred, total, percent, "uploading");
        }
    }

    fn on_finish(&self, transferred: u64, total: u64) {
        tracing::info!(transferred, total, "upload finished");
    }
}

/// Wire the configured collaborators into a pipeline
fn build_pipeline(state: &AppState) -> Pipeline {
    let config = &state.config;

    let dump = MysqlDump::new(
        &config.db.username,
        &config.db.password,
        &config.db.hostname,
        &config.db.name,
        config.db.port,
    )
    .with_program(&config.db.dump_program);

    let scp = ScpClient::new(config.ssh.scp_config());

    let expected = match count_files(&config.site) {
        Ok(n) => n,
        Err(e) => {
            tracing::debug!(error = %e, "cannot count site files");
            0
        }
    };

    Pipeline::new(
        PipelineConfig {
            site_dir: config.site.clone(),
            layout: state.layout.clone(),
            remote_username: config.ssh.username.clone(),
            remote_dir: config.ssh.destination.clone(),
        },
        Arc::new(dump),
        Arc::new(scp),
    )
    .with_archiver(Archiver::with_observer(Arc::new(ArchiveProgress::new(expected))))
    .with_transfer_observer(Arc::new(TransferProgress::default()))
}

fn render(report: &BackupReport, json: bool) -> Result<String, serde_json::Error> {
    if json {
        serde_json::to_string_pretty(report)
    } else {
        Ok(report.to_string())
    }
}

#[async_trait::async_trait]
impl crate::op::Op for Backup {
    type Error = BackupError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = AppState::load(ctx.config_path.clone())?;
        let pipeline = build_pipeline(&state);

        tracing::info!(
            site = %state.config.site.display(),
            database = %state.config.db.name,
            remote = %state.config.ssh.remote,
            "starting backup"
        );

        // archiving, the dump client and libssh2 all block
        let report = tokio::task::spawn_blocking(move || pipeline.run()).await??;

        Ok(render(&report, ctx.json)?)
    }
}
