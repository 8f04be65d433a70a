use clap::Args;

use common::version::build_info;

#[derive(Args, Debug, Clone)]
pub struct Version;

#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    #[error("Version operation failed: {0}")]
    Failed(String),
}

#[async_trait::async_trait]
impl crate::op::Op for Version {
    type Error = VersionError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let info = build_info();
        if ctx.json {
            serde_json::to_string_pretty(&info).map_err(|e| VersionError::Failed(e.to_string()))
        } else {
            Ok(info.to_string())
        }
    }
}
