use clap::Args;
use common::prelude::{cleanup, CleanupError};

use crate::state::{AppState, StateError};

#[derive(Args, Debug, Clone)]
pub struct Cleanup;

#[derive(Debug, thiserror::Error)]
pub enum CleanupOpError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error("cleanup failed: {0}")]
    Cleanup(#[from] CleanupError),
}

#[async_trait::async_trait]
impl crate::op::Op for Cleanup {
    type Error = CleanupOpError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = AppState::load(ctx.config_path.clone())?;
        let removed = cleanup(&state.layout.work_dirs())?;

        tracing::info!(removed, "cleanup complete");
        Ok(format!(
            "Removed {} entries from {} and {}",
            removed,
            state.layout.tmp.display(),
            state.layout.backups.display()
        ))
    }
}
