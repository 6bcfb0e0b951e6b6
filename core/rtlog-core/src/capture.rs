//! Terminal capture subprocess.
//!
//! The transcript and timing files are produced by the system `script`
//! program running an interactive zsh. rtlog only names the files and waits.
//!
//! `start` blocks on the child in the foreground. SIGINT, SIGTERM and SIGHUP
//! delivered to rtlog while it waits are caught and forwarded to the child as
//! SIGTERM, so the wait always returns and the caller's cleanup runs.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};

use crate::error::{Result, RtlogError};
use crate::state::process::terminate_pid;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Variables with these prefixes never reach the captured shell.
const SCRUBBED_PREFIXES: [&str; 2] = ["API_", "TOKEN_"];

#[derive(Debug, Clone)]
pub struct CaptureCommand {
    pub transcript: PathBuf,
    pub timing: PathBuf,
    pub shell: String,
    pub zdotdir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureOutcome {
    pub status: ExitStatus,
    /// A termination signal arrived while waiting and was forwarded.
    pub interrupted: bool,
}

impl CaptureCommand {
    /// `script` arguments for this platform.
    ///
    /// BSD `script` (macOS) records timing inline with `-r`; util-linux
    /// writes a separate timing file.
    pub fn args(&self) -> Vec<OsString> {
        if cfg!(target_os = "macos") {
            vec![
                "-q".into(),
                "-r".into(),
                self.transcript.clone().into_os_string(),
                self.shell.clone().into(),
                "-i".into(),
            ]
        } else {
            let mut timing = OsString::from("--timing=");
            timing.push(self.timing.as_os_str());
            vec![
                "-q".into(),
                timing,
                "-c".into(),
                format!("{} -i", self.shell).into(),
                self.transcript.clone().into_os_string(),
            ]
        }
    }

    pub fn to_command(&self) -> Command {
        let mut command = Command::new("script");
        command
            .args(self.args())
            .env_clear()
            .envs(scrub_environment(std::env::vars_os()))
            .env("ZDOTDIR", &self.zdotdir);
        command
    }
}

/// Drops `API_*` and `TOKEN_*` variables from the child environment.
pub fn scrub_environment<I>(vars: I) -> Vec<(OsString, OsString)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter(|(key, _)| {
            let key = key.to_string_lossy();
            !SCRUBBED_PREFIXES
                .iter()
                .any(|prefix| key.starts_with(prefix))
        })
        .collect()
}

/// Spawns `command` and blocks until it exits, forwarding termination signals.
pub fn run_foreground(mut command: Command) -> Result<CaptureOutcome> {
    let interrupted = Arc::new(AtomicBool::new(false));
    let mut handlers = Vec::new();
    for signal in [SIGINT, SIGTERM, SIGHUP] {
        let id = signal_hook::flag::register(signal, Arc::clone(&interrupted))
            .map_err(|e| RtlogError::io("install signal handler", e))?;
        handlers.push(id);
    }

    let result = command
        .spawn()
        .map_err(|e| RtlogError::Capture(format!("failed to launch script: {}", e)))
        .and_then(|child| wait_forwarding(child, &interrupted));

    for id in handlers {
        signal_hook::low_level::unregister(id);
    }
    result
}

fn wait_forwarding(mut child: Child, interrupted: &AtomicBool) -> Result<CaptureOutcome> {
    let mut forwarded = false;
    loop {
        if let Some(status) = child
            .try_wait()
            .map_err(|e| RtlogError::Capture(format!("failed to wait for script: {}", e)))?
        {
            return Ok(CaptureOutcome {
                status,
                interrupted: forwarded,
            });
        }

        if !forwarded && interrupted.load(Ordering::Relaxed) {
            tracing::warn!(pid = child.id(), "Session interrupted; terminating capture");
            match terminate_pid(child.id()) {
                Ok(()) | Err(RtlogError::NoSuchProcess(_)) => {}
                Err(e) => tracing::warn!(error = %e, "Failed to forward termination"),
            }
            forwarded = true;
        }

        thread::sleep(POLL_INTERVAL);
    }
}
