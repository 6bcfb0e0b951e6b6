//! Storage configuration and path management for rtlog.
//!
//! `StorageConfig` is the single place that decides where rtlog keeps its
//! process-wide files:
//!
//! - the active-session state record
//! - the default output directory for session logs
//! - the debug log written by the CLI
//!
//! Production code uses [`StorageConfig::from_env`], which honours `RTLOG_HOME`
//! and otherwise points at `~/.rt_command_logger/`. Tests use
//! [`StorageConfig::with_root`] for isolation.

use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Result, RtlogError};

/// Overrides the storage root.
pub const HOME_ENV: &str = "RTLOG_HOME";

const DEFAULT_ROOT_NAME: &str = ".rt_command_logger";
const STATE_FILE_NAME: &str = ".rtlog_state";
const DEBUG_LOG_NAME: &str = "rtlog-debug.log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    root: PathBuf,
}

impl StorageConfig {
    pub fn from_env() -> Result<Self> {
        if let Some(root) = env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::with_root(PathBuf::from(root)));
        }
        let home = dirs::home_dir().ok_or(RtlogError::HomeDirNotFound)?;
        Ok(Self::with_root(home.join(DEFAULT_ROOT_NAME)))
    }

    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the singleton active-session record.
    pub fn state_file(&self) -> PathBuf {
        self.root.join(STATE_FILE_NAME)
    }

    /// Where `start` creates session directories when `--outdir` is not given.
    pub fn default_outdir(&self) -> PathBuf {
        self.root.clone()
    }

    pub fn debug_log_file(&self) -> PathBuf {
        self.root.join(DEBUG_LOG_NAME)
    }
}
