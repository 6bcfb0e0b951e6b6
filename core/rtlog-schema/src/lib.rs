//! Metadata event schema for rtlog sessions.
//!
//! This crate is shared by the core library and the `rtlog record` hook so the
//! on-disk format of `commands.jsonl` and `audit.log` cannot drift between the
//! writer and the readers. The core remains the authority on validation, but
//! the hook reuses the same types to construct valid records.
//!
//! ## Command event line
//!
//! ```json
//! {"schema_version":1,"timestamp":"2025-05-14T14:30:00Z","duration":0.012,
//!  "user":"op","cwd":"/tmp","command":"ls -la","args":"-la","exit_status":0,
//!  "exit_desc":"Success","session_id":"...","tty":"/dev/ttys003","ppid":4242,
//!  "command_hash":"...","env":{"HOME":"/Users/op"},"ttp_tag":"T1190",
//!  "transcript":"/.../20250514T143000Z_T1190.log"}
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Reserved for forward compatibility. Readers accept lines without it.
pub const SCHEMA_VERSION: u32 = 1;

/// Environment variables captured in every command event. Nothing else is read.
pub const ENV_ALLOW_LIST: [&str; 3] = ["PATH", "HOME", "SHELL"];

/// Second-precision UTC, `Z` suffix.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Tag recorded when the session was started without a name.
pub const NO_TAG: &str = "none";

const EXIT_COMMAND_NOT_FOUND: i32 = 127;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Command Events
// ═══════════════════════════════════════════════════════════════════════════════

/// One executed command line, as appended to `commands.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<u32>,
    #[serde(with = "utc_seconds")]
    pub timestamp: DateTime<Utc>,
    pub duration: f64,
    pub user: String,
    pub cwd: String,
    pub command: String,
    pub args: String,
    pub exit_status: i32,
    pub exit_desc: String,
    pub session_id: String,
    pub tty: String,
    pub ppid: u32,
    pub command_hash: String,
    pub env: BTreeMap<String, String>,
    pub ttp_tag: String,
    pub transcript: String,
}

/// Raw facts supplied by the shell hook. Derived fields are computed by
/// [`CommandEvent::from_input`].
#[derive(Debug, Clone)]
pub struct CommandEventInput {
    pub timestamp: DateTime<Utc>,
    pub duration: f64,
    pub user: String,
    pub cwd: String,
    pub command: String,
    pub exit_status: i32,
    pub session_id: String,
    pub tty: String,
    pub ppid: u32,
    pub env: BTreeMap<String, String>,
    pub ttp_tag: Option<String>,
    pub transcript: String,
}

impl CommandEvent {
    pub fn from_input(input: CommandEventInput) -> Self {
        let duration = if input.duration.is_finite() && input.duration > 0.0 {
            (input.duration * 1000.0).round() / 1000.0
        } else {
            0.0
        };

        Self {
            schema_version: Some(SCHEMA_VERSION),
            timestamp: input.timestamp.trunc_subsecs(0),
            duration,
            user: input.user,
            cwd: input.cwd,
            args: argument_tail(&input.command).to_string(),
            command_hash: command_hash(&input.command),
            command: input.command,
            exit_status: input.exit_status,
            exit_desc: describe_exit(input.exit_status),
            session_id: input.session_id,
            tty: input.tty,
            ppid: input.ppid,
            env: input.env,
            ttp_tag: input
                .ttp_tag
                .filter(|tag| !tag.is_empty())
                .unwrap_or_else(|| NO_TAG.to_string()),
            transcript: input.transcript,
        }
    }

    /// Serializes the event as exactly one newline-terminated JSON line.
    ///
    /// JSON string escaping guarantees embedded newlines in the command text
    /// never split the record.
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    pub fn validate(&self) -> Result<(), ErrorInfo> {
        if self.session_id.trim().is_empty() {
            return Err(ErrorInfo::new("missing_field", "session_id is required"));
        }

        if !self.duration.is_finite() || self.duration < 0.0 {
            return Err(ErrorInfo::new(
                "invalid_duration",
                "duration must be a non-negative number of seconds",
            ));
        }

        if self.command_hash != command_hash(&self.command) {
            return Err(ErrorInfo::new(
                "hash_mismatch",
                "command_hash does not match the SHA-256 of command",
            ));
        }

        if self.exit_desc != describe_exit(self.exit_status) {
            return Err(ErrorInfo::new(
                "invalid_exit_desc",
                format!(
                    "exit_desc {:?} does not describe exit status {}",
                    self.exit_desc, self.exit_status
                ),
            ));
        }

        if let Some(key) = self
            .env
            .keys()
            .find(|key| !ENV_ALLOW_LIST.contains(&key.as_str()))
        {
            return Err(ErrorInfo::new(
                "env_not_allowed",
                format!("{} is not in the environment allow-list", key),
            ));
        }

        Ok(())
    }
}

/// Human description of a shell exit status.
pub fn describe_exit(code: i32) -> String {
    match code {
        0 => "Success".to_string(),
        EXIT_COMMAND_NOT_FOUND => "Command not found".to_string(),
        other => format!("Error (code {})", other),
    }
}

/// SHA-256 of the command text, lowercase hex.
pub fn command_hash(command: &str) -> String {
    hex::encode(Sha256::digest(command.as_bytes()))
}

/// Everything after the first space. A command without arguments has an empty tail.
pub fn argument_tail(command: &str) -> &str {
    command
        .split_once(' ')
        .map(|(_, tail)| tail)
        .unwrap_or_default()
}

/// Snapshot of the allow-listed environment variables present in `lookup`.
pub fn snapshot_env<F>(lookup: F) -> BTreeMap<String, String>
where
    F: Fn(&str) -> Option<String>,
{
    ENV_ALLOW_LIST
        .iter()
        .filter_map(|name| lookup(name).map(|value| (name.to_string(), value)))
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Audit Events
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    SessionStart,
    SessionStop,
    SessionEnd,
}

/// Session lifecycle record appended to `audit.log`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    #[serde(with = "utc_seconds")]
    pub timestamp: DateTime<Utc>,
    pub event: AuditKind,
    #[serde(default)]
    pub details: Value,
}

impl AuditEvent {
    pub fn new(event: AuditKind, details: Value) -> Self {
        Self::at(Utc::now(), event, details)
    }

    pub fn at(timestamp: DateTime<Utc>, event: AuditKind, details: Value) -> Self {
        let details = if details.is_null() {
            Value::Object(Default::default())
        } else {
            details
        };
        Self {
            timestamp: timestamp.trunc_subsecs(0),
            event,
            details,
        }
    }

    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

mod utc_seconds {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    use super::TIMESTAMP_FORMAT;

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
