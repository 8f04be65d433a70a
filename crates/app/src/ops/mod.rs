pub mod backup;
pub mod cleanup;
pub mod init;
pub mod status;
pub mod version;

pub use backup::Backup;
pub use cleanup::Cleanup;
pub use init::Init;
pub use status::Status;
pub use version::Version;
