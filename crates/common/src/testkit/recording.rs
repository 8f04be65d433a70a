use std::fs::Metadata;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::archive::ArchiveObserver;
use crate::pipeline::{EventSink, PipelineEvent, Stage};

/// Keeps every pipeline event in order
#[derive(Debug, Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<PipelineEvent>>,
}

impl RecordingEvents {
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().clone()
    }

    /// Stages that reported completion, in order
    pub fn completed_stages(&self) -> Vec<Stage> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                PipelineEvent::StageCompleted { stage, .. } => Some(*stage),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingEvents {
    fn emit(&self, event: &PipelineEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Which side of a per-file copy an observation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyPhase {
    Before,
    After,
}

/// Records archiver hook calls
#[derive(Debug, Default)]
pub struct RecordingObserver {
    calls: Mutex<Vec<(CopyPhase, PathBuf, u64)>>,
}

impl RecordingObserver {
    pub fn calls(&self) -> Vec<(CopyPhase, PathBuf, u64)> {
        self.calls.lock().clone()
    }
}

impl ArchiveObserver for RecordingObserver {
    fn before_copy(&self, path: &Path, metadata: &Metadata) {
        self.calls
            .lock()
            .push((CopyPhase::Before, path.to_path_buf(), metadata.len()));
    }

    fn after_copy(&self, path: &Path, metadata: &Metadata) {
        self.calls
            .lock()
            .push((CopyPhase::After, path.to_path_buf(), metadata.len()));
    }
}
