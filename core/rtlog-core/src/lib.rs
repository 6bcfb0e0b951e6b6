//! # rtlog-core
//!
//! Core library for rtlog, the red-team session logger. Everything with an
//! invariant lives here; the `rtlog` binary only maps command-line
//! invocations onto these operations.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime. `start` blocks on the capture child.
//! - **Append-only artifacts**: Session files are only ever appended to, one
//!   write per record, so the hook process and readers can run concurrently.
//! - **Owner-only permissions**: Every directory is 0700 and every file 0600,
//!   re-applied after writes.
//! - **Explicit state**: The single active-session record is a
//!   [`StateBackend`] handed to [`SessionTracker`], never a hidden global.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rtlog_core::{FileStateStore, SessionTracker, StorageConfig, StopOutcome};
//!
//! let storage = StorageConfig::from_env()?;
//! let tracker = SessionTracker::new(FileStateStore::new(storage.state_file()));
//! match tracker.stop()? {
//!     StopOutcome::NoActiveSession => println!("No active session"),
//!     StopOutcome::Stopped { record, .. } => println!("Stopped {}", record.session_id),
//! }
//! ```

pub mod artifacts;
pub mod capture;
pub mod error;
pub mod export;
pub mod ids;
pub mod render;
pub mod session;
pub mod setup;
pub mod shell;
pub mod state;
pub mod storage;

pub use artifacts::SessionLayout;
pub use capture::{run_foreground, CaptureCommand, CaptureOutcome};
pub use error::{Result, RtlogError};
pub use export::{export, ExportReport, SkippedLine};
pub use session::{Session, SessionContext, SessionGuard, StartOptions};
pub use setup::DependencyStatus;
pub use state::{
    FileStateStore, MemoryStateStore, ProcessControl, SessionStatus, SessionTracker,
    StateBackend, StateRecord, StopOutcome, SystemProcesses,
};
pub use storage::StorageConfig;
