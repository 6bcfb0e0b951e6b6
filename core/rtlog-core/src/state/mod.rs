//! Active Session State
//!
//! At most one logged session runs per user account. Which one, if any, is
//! recorded in a single state record (`~/.rt_command_logger/.rtlog_state`).
//!
//! ```text
//! rtlog start ──begin──▶ state record ◀──current── rtlog status
//!      │                      ▲
//!      └──(guard) end_if──────┤
//!                             └──request_stop── rtlog stop
//! ```
//!
//! The record is advisory: it coordinates cooperating rtlog processes, it does
//! not lock anything on disk.
//!
//! # Module Structure
//!
//! - [`types`]: the three-field record and its parser
//! - [`store`]: where the record lives (`FileStateStore`, `MemoryStateStore`)
//! - [`process`]: owner liveness and termination
//! - [`tracker`]: begin/current/end/stop semantics over a store

pub mod process;
mod store;
mod tracker;
mod types;

pub use process::{is_pid_alive, FakeProcesses, ProcessControl, SystemProcesses};
pub use store::{FileStateStore, MemoryStateStore, StateBackend};
pub use tracker::{SessionStatus, SessionTracker, StopOutcome};
pub use types::StateRecord;
