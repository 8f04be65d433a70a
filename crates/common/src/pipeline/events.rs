use super::{BackupReport, Stage};

/// Progress of a pipeline run, in order of occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    StageStarted(Stage),
    /// `artifact` is the local path or remote destination the stage produced
    StageCompleted {
        stage: Stage,
        artifact: String,
    },
    StageFailed {
        stage: Stage,
        error: String,
    },
    Finished(BackupReport),
}

/// Where pipeline events go.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &PipelineEvent);
}

/// Writes every event as a structured `tracing` record
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEvents;

impl EventSink for TracingEvents {
    fn emit(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::StageStarted(stage) => {
                tracing::debug!(%stage, "stage started");
            }
            PipelineEvent::StageCompleted { stage, artifact } => {
                tracing::info!(%stage, %artifact, "stage completed");
            }
            PipelineEvent::StageFailed { stage, error } => {
                tracing::error!(%stage, %error, "stage failed, backup aborted");
            }
            PipelineEvent::Finished(report) => {
                tracing::info!(
                    archive = %report.archive.path.display(),
                    size = report.archive.size,
                    remote = %report.remote_path,
                    "backup transferred to remote host"
                );
            }
        }
    }
}
