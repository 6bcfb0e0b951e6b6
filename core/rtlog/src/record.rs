//! `rtlog record`: append one finished command to the active session.
//!
//! Invoked by the session shell's precmd hook once per command line:
//!
//! ```bash
//! rtlog record --command="nmap -sV 10.0.0.5" --exit-status 0 --duration 3.217 \
//!     --index 4 --tty /dev/ttys003 --ppid 5120
//! ```
//!
//! Session context comes from the `RT_*` variables the session rc exports.
//! The shell runs this synchronously after every command, so it does one
//! append to `commands.jsonl`, one to `commands.log`, and exits.

use std::env;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::Args;
use rtlog_core::artifacts::{append_command_event, append_log_block};
use rtlog_core::render::render_block;
use rtlog_core::shell::{ENV_SESSION_DIR, ENV_SESSION_ID};
use rtlog_core::RtlogError;
use rtlog_schema::{snapshot_env, CommandEvent, CommandEventInput, ErrorInfo};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Not inside an rtlog session: {0} is not set")]
    MissingContext(&'static str),

    #[error("Refusing to record invalid event: {0}")]
    InvalidEvent(ErrorInfo),

    #[error(transparent)]
    Core(#[from] RtlogError),
}

#[derive(Args, Debug, Clone)]
pub struct RecordArgs {
    /// Full command line as typed
    #[arg(long)]
    pub command: String,

    #[arg(long, allow_negative_numbers = true)]
    pub exit_status: i32,

    /// Wall-clock seconds
    #[arg(long, allow_negative_numbers = true)]
    pub duration: f64,

    /// 1-based position of the command in the session
    #[arg(long)]
    pub index: u64,

    #[arg(long, default_value = "unknown")]
    pub tty: String,

    #[arg(long, default_value_t = 0)]
    pub ppid: u32,

    #[arg(long, env = "RT_SESSION_DIR", hide_env_values = true)]
    pub session_dir: Option<PathBuf>,

    #[arg(long, env = "RT_SESSION_ID")]
    pub session_id: Option<String>,

    #[arg(long, env = "RT_TTP_TAG")]
    pub ttp_tag: Option<String>,

    #[arg(long, env = "RT_TRANSCRIPT_FILE", hide_env_values = true)]
    pub transcript: Option<String>,

    #[arg(long, env = "RT_USE_COLOR")]
    pub use_color: Option<String>,
}

impl RecordArgs {
    fn color(&self) -> bool {
        matches!(
            self.use_color.as_deref(),
            Some("1" | "true" | "TRUE" | "yes" | "YES")
        )
    }
}

pub fn run(args: &RecordArgs) -> Result<(), RecordError> {
    let session_dir = args
        .session_dir
        .as_deref()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or(RecordError::MissingContext(ENV_SESSION_DIR))?;
    let session_id = args
        .session_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(RecordError::MissingContext(ENV_SESSION_ID))?;

    let cwd = env::current_dir()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    let event = build_event(
        args,
        session_id,
        Utc::now(),
        current_user(),
        cwd,
    );

    write_event(session_dir, args.index, &event, args.color())?;
    tracing::debug!(
        session_id = %session_id,
        index = args.index,
        exit_status = event.exit_status,
        "Command recorded"
    );
    Ok(())
}

fn build_event(
    args: &RecordArgs,
    session_id: &str,
    now: DateTime<Utc>,
    user: String,
    cwd: String,
) -> CommandEvent {
    CommandEvent::from_input(CommandEventInput {
        timestamp: now,
        duration: args.duration,
        user,
        cwd,
        command: args.command.clone(),
        exit_status: args.exit_status,
        session_id: session_id.to_string(),
        tty: args.tty.clone(),
        ppid: args.ppid,
        env: snapshot_env(|key| env::var(key).ok()),
        ttp_tag: args.ttp_tag.clone(),
        transcript: args.transcript.clone().unwrap_or_default(),
    })
}

/// JSON first: the metadata stream is the record of truth, the log block is derived.
/// Nothing is appended for an event that fails validation.
fn write_event(
    session_dir: &Path,
    index: u64,
    event: &CommandEvent,
    color: bool,
) -> Result<(), RecordError> {
    event.validate().map_err(RecordError::InvalidEvent)?;
    append_command_event(session_dir, event)?;
    append_log_block(session_dir, &render_block(index, event, color))?;
    Ok(())
}

fn current_user() -> String {
    ["USER", "LOGNAME"]
        .iter()
        .filter_map(|key| env::var(key).ok())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rtlog_core::artifacts::{read_command_events, COMMANDS_JSONL, COMMANDS_LOG};
    use tempfile::tempdir;

    fn args(command: &str, exit_status: i32) -> RecordArgs {
        RecordArgs {
            command: command.to_string(),
            exit_status,
            duration: 1.23456,
            index: 7,
            tty: "/dev/ttys003".to_string(),
            ppid: 5120,
            session_dir: None,
            session_id: None,
            ttp_tag: Some("T1046".to_string()),
            transcript: Some("/tmp/rt/s/20250514T143000Z_T1046.log".to_string()),
            use_color: Some("".to_string()),
        }
    }

    #[test]
    fn event_carries_hook_values() {
        let now = Utc.with_ymd_and_hms(2025, 5, 14, 14, 32, 10).unwrap();
        let event = build_event(
            &args("nmap -sV 10.0.0.5", 0),
            "sess-1",
            now,
            "op".to_string(),
            "/home/op".to_string(),
        );

        assert_eq!(event.args, "-sV 10.0.0.5");
        assert_eq!(event.exit_desc, "Success");
        assert_eq!(event.duration, 1.235);
        assert_eq!(event.ttp_tag, "T1046");
        assert_eq!(event.ppid, 5120);
        assert_eq!(event.session_id, "sess-1");
        assert!(event.validate().is_ok());
    }

    #[test]
    fn missing_session_context_is_reported() {
        let err = run(&args("id", 0)).unwrap_err();
        assert!(matches!(err, RecordError::MissingContext(ENV_SESSION_DIR)));
    }

    #[test]
    fn color_flag_values() {
        let mut a = args("id", 0);
        assert!(!a.color());
        a.use_color = Some("1".to_string());
        assert!(a.color());
    }

    #[test]
    fn writes_jsonl_then_log_block() {
        let temp = tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2025, 5, 14, 14, 32, 10).unwrap();
        let event = build_event(
            &args("cat /etc/passwd", 1),
            "sess-1",
            now,
            "op".to_string(),
            "/".to_string(),
        );

        write_event(temp.path(), 7, &event, false).unwrap();

        let events: Vec<_> = read_command_events(&temp.path().join(COMMANDS_JSONL))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(events, vec![event]);
        let log = std::fs::read_to_string(temp.path().join(COMMANDS_LOG)).unwrap();
        assert!(log.starts_with("=== Command #7 ===\n"));
        assert!(log.contains("Exit:      1 (Error (code 1))"));
    }

    #[test]
    fn invalid_event_is_not_appended() {
        let temp = tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2025, 5, 14, 14, 32, 10).unwrap();
        let mut event = build_event(
            &args("whoami", 0),
            "sess-1",
            now,
            "op".to_string(),
            "/".to_string(),
        );
        event.command = "id".to_string();

        let err = write_event(temp.path(), 1, &event, false).unwrap_err();
        assert!(
            matches!(&err, RecordError::InvalidEvent(info) if info.code == "hash_mismatch"),
            "{:?}",
            err
        );
        assert!(!temp.path().join(COMMANDS_JSONL).exists());
        assert!(!temp.path().join(COMMANDS_LOG).exists());
    }
}
