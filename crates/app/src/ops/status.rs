use std::fmt;
use std::path::PathBuf;

use clap::Args;
use common::archive::{count_files, ArchiveError};
use common::prelude::HostIdentityPolicy;
use serde::Serialize;

use crate::state::{AppState, StateError};

#[derive(Args, Debug, Clone)]
pub struct Status;

#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error("cannot inspect working directories: {0}")]
    Count(#[from] ArchiveError),
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusOutput {
    pub backuper_dir: PathBuf,
    pub site: PathBuf,
    pub remote: String,
    pub tmp_files: u64,
    pub backup_files: u64,
    pub host_identity: HostIdentityPolicy,
    #[serde(skip)]
    json: bool,
}

impl fmt::Display for StatusOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.json {
            let text = serde_json::to_string_pretty(self).map_err(|_| fmt::Error)?;
            return f.write_str(&text);
        }
        write!(
            f,
            "Backuper directory: {}\n\
             - Site: {}\n\
             - Remote: {}\n\
             - Files in tmp: {}\n\
             - Files in backups: {}\n\
             - Host identity: {}",
            self.backuper_dir.display(),
            self.site.display(),
            self.remote,
            self.tmp_files,
            self.backup_files,
            self.host_identity
        )
    }
}

#[async_trait::async_trait]
impl crate::op::Op for Status {
    type Error = StatusError;
    type Output = StatusOutput;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = AppState::load(ctx.config_path.clone())?;

        Ok(StatusOutput {
            tmp_files: count_files(&state.layout.tmp)?,
            backup_files: count_files(&state.layout.backups)?,
            backuper_dir: state.backuper_dir,
            site: state.config.site,
            remote: state.config.ssh.remote,
            host_identity: state.config.ssh.host_identity,
            json: ctx.json,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::{Op, OpContext};
    use crate::state::tests::sample_config;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_status_counts_files() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("state");
        let state = AppState::init(Some(dir.clone()), sample_config()).unwrap();
        fs::write(state.layout.backups.join("final_1.zip"), "a").unwrap();
        fs::write(state.layout.backups.join("final_2.zip"), "b").unwrap();

        let status = Status
            .execute(&OpContext::new(Some(dir.clone()), false))
            .await
            .unwrap();
        assert_eq!(status.tmp_files, 0);
        assert_eq!(status.backup_files, 2);
        assert!(status.to_string().contains("Files in backups: 2"));

        let json = Status
            .execute(&OpContext::new(Some(dir), true))
            .await
            .unwrap()
            .to_string();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["backup_files"], 2);
        assert_eq!(value["host_identity"]["policy"], "pinned");
    }
}
