//! In-process stand-ins for the pipeline's collaborators.
//!
//! These let a full pipeline run without a database server or SSH host:
//!
//! ```rust,ignore
//! use common::testkit::{MemoryRemote, RecordingEvents, StaticDump};
//!
//! let remote = Arc::new(MemoryRemote::default());
//! let pipeline = Pipeline::new(config, Arc::new(StaticDump::new("db.sql", b"--")), remote.clone())
//!     .with_events(Arc::new(RecordingEvents::default()));
//! pipeline.run()?;
//! assert_eq!(remote.uploads().len(), 1);
//! ```
mod dump;
mod recording;
mod remote;

pub use dump::{FailingDump, StaticDump};
pub use recording::{CopyPhase, RecordingEvents, RecordingObserver};
pub use remote::{MemoryRemote, UnreachableRemote, Upload};
