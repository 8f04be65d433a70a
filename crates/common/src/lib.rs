/**
 * ZIP archiving of directory trees and file lists,
 *  with optional per-file copy hooks.
 */
pub mod archive;
/**
 * Removal of disposable backup artifacts.
 */
pub mod cleanup;
/**
 * Database export collaborators: the `DumpSource`
 *  trait and a `mysqldump` implementation.
 */
pub mod dump;
/**
 * On-disk working directories.
 */
pub mod layout;
/**
 * Time-based artifact names.
 */
pub mod naming;
/**
 * Orchestration of a backup run, stage by stage.
 */
pub mod pipeline;
/**
 * Fakes for the pipeline's collaborators.
 */
pub mod testkit;
/**
 * SSH secure copy with an explicit
 *  host identity policy.
 */
pub mod transfer;
/**
 * Helper for setting build version information
 *  at compile time.
 */
pub mod version;

pub mod prelude {
    pub use crate::archive::{ArchiveError, ArchiveInfo, ArchiveObserver, Archiver};
    pub use crate::cleanup::{cleanup, CleanupError};
    pub use crate::dump::{DumpArtifact, DumpError, DumpSource, MysqlDump};
    pub use crate::layout::BackupLayout;
    pub use crate::pipeline::{
        BackupReport, EventSink, Pipeline, PipelineConfig, PipelineError, PipelineEvent, Stage,
    };
    pub use crate::transfer::{
        HostFingerprint, HostIdentityPolicy, KeyMaterial, RemoteCopy, ScpClient, ScpConfig,
        TransferError, TransferObserver,
    };
    pub use crate::version::build_info;
}
