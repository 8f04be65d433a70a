use std::fmt;

use serde::Serialize;

/// Compile-time build metadata, filled in by `build.rs`.
#[derive(Debug, Clone, Serialize)]
pub struct BuildInfo {
    pub version: &'static str,
    pub build_profile: &'static str,
    pub build_features: &'static str,
    pub build_timestamp: &'static str,
    pub rust_version: &'static str,
    pub target: &'static str,
}

pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: env!("REPO_VERSION"),
        build_profile: env!("BUILD_PROFILE"),
        build_features: env!("BUILD_FEATURES"),
        build_timestamp: env!("BUILD_TIMESTAMP"),
        rust_version: env!("RUST_VERSION"),
        target: env!("BUILD_TARGET"),
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "backuper {} ({} build, features: {}, built {} for {} with {})",
            self.version,
            self.build_profile,
            self.build_features,
            self.build_timestamp,
            self.target,
            self.rust_version
        )
    }
}
