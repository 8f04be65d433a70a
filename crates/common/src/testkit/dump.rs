use std::fs;
use std::path::Path;

use crate::dump::{DumpArtifact, DumpError, DumpSource};

/// Writes a fixed file into the target directory
#[derive(Debug, Clone)]
pub struct StaticDump {
    file_name: String,
    contents: Vec<u8>,
}

impl StaticDump {
    pub fn new(file_name: impl Into<String>, contents: &[u8]) -> Self {
        Self {
            file_name: file_name.into(),
            contents: contents.to_vec(),
        }
    }
}

impl DumpSource for StaticDump {
    fn dump(&self, target_dir: &Path) -> Result<DumpArtifact, DumpError> {
        let path = target_dir.join(&self.file_name);
        fs::write(&path, &self.contents)?;
        DumpArtifact::from_path(path)
    }
}

/// Always fails with the given message
#[derive(Debug, Clone)]
pub struct FailingDump(pub String);

impl DumpSource for FailingDump {
    fn dump(&self, _target_dir: &Path) -> Result<DumpArtifact, DumpError> {
        Err(DumpError::Other(self.0.clone()))
    }
}
