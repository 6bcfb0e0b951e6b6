//! Session artifact storage.
//!
//! All filesystem side effects for a session go through this module:
//! - Creating the session directory (owner-only, never reused)
//! - Creating empty artifact files (owner-only)
//! - Appending audit events, command events and rendered log blocks
//! - Reading the command event stream back, line by line
//!
//! # Session Layout
//!
//! ```text
//! <outdir>/<timestamp>_<host>_<user>[_<name>]/   0700
//! ├── audit.log                                  0600  lifecycle events (JSON lines)
//! ├── commands.jsonl                             0600  command events (JSON lines)
//! ├── commands.log                               0600  human-readable blocks
//! ├── <timestamp>[_<name>].log                         transcript (written by `script`)
//! └── <timestamp>[_<name>].time                        timing data (written by `script`)
//! ```
//!
//! # Append Discipline
//!
//! Files are only ever opened in append mode and each record is handed to the
//! kernel as one buffer, so a concurrent reader never observes half a line from
//! this writer. Permissions are re-applied after every write: the hook process
//! appending events may run under a different umask than the one that created
//! the file.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs_err as fs;
use rtlog_schema::{AuditEvent, AuditKind, CommandEvent};
use serde::de::DeserializeOwned;
use serde_json::error::Category;
use serde_json::Value;

use crate::error::{Result, RtlogError};
use crate::ids::artifact_file_name;

pub const AUDIT_LOG: &str = "audit.log";
pub const COMMANDS_JSONL: &str = "commands.jsonl";
pub const COMMANDS_LOG: &str = "commands.log";

pub const DIR_MODE: u32 = 0o700;
pub const FILE_MODE: u32 = 0o600;

/// Names every artifact belonging to one session directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLayout {
    directory: PathBuf,
    transcript_name: String,
    timing_name: String,
}

impl SessionLayout {
    pub fn new(directory: PathBuf, started_at: DateTime<Utc>, name: &str) -> Self {
        Self {
            transcript_name: artifact_file_name(started_at, name, "log"),
            timing_name: artifact_file_name(started_at, name, "time"),
            directory,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn audit_log(&self) -> PathBuf {
        self.directory.join(AUDIT_LOG)
    }

    pub fn commands_jsonl(&self) -> PathBuf {
        self.directory.join(COMMANDS_JSONL)
    }

    pub fn commands_log(&self) -> PathBuf {
        self.directory.join(COMMANDS_LOG)
    }

    pub fn transcript(&self) -> PathBuf {
        self.directory.join(&self.transcript_name)
    }

    pub fn timing(&self) -> PathBuf {
        self.directory.join(&self.timing_name)
    }
}

/// Creates `base/name` with owner-only permissions.
///
/// `base` is created (0700) when missing; an existing `base` keeps its mode.
/// An existing session directory is never reused: appending to another
/// session's files would break the append-only history.
pub fn create_session_directory(base: &Path, name: &str) -> Result<PathBuf> {
    if !base.exists() {
        build_dir(base, true)?;
    }

    let directory = base.join(name);
    match build_dir(&directory, false) {
        Ok(()) => {}
        Err(RtlogError::Io { source, .. })
            if source.kind() == std::io::ErrorKind::AlreadyExists =>
        {
            return Err(RtlogError::AlreadyExists(directory));
        }
        Err(e) => return Err(e),
    }
    harden(&directory, DIR_MODE)?;

    tracing::debug!(path = %directory.display(), "Created session directory");
    Ok(directory)
}

/// Creates `path` (and missing parents) with owner-only permissions.
pub fn create_private_dir_all(path: &Path) -> Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    build_dir(path, true)
}

/// Creates an empty owner-only file. Existing content is left untouched.
pub fn touch_secure(path: &Path) -> Result<()> {
    open_append(path)?;
    harden(path, FILE_MODE)
}

pub fn append_audit_event(directory: &Path, kind: AuditKind, details: Value) -> Result<()> {
    let event = AuditEvent::new(kind, details);
    let line = event
        .to_json_line()
        .map_err(|e| RtlogError::json("serialize audit event", e))?;
    append_line(&directory.join(AUDIT_LOG), &line)?;
    tracing::debug!(event = ?kind, dir = %directory.display(), "Audit event appended");
    Ok(())
}

pub fn append_command_event(directory: &Path, event: &CommandEvent) -> Result<()> {
    let line = event
        .to_json_line()
        .map_err(|e| RtlogError::json("serialize command event", e))?;
    append_line(&directory.join(COMMANDS_JSONL), &line)
}

pub fn append_log_block(directory: &Path, block: &str) -> Result<()> {
    append_line(&directory.join(COMMANDS_LOG), block)
}

/// Reads every audit event of a session. Unlike the command stream this is
/// strict: the audit log is only written by rtlog itself.
pub fn read_audit_events(directory: &Path) -> Result<Vec<AuditEvent>> {
    let path = directory.join(AUDIT_LOG);
    let content = fs::read_to_string(&path).map_err(|e| RtlogError::io("read audit log", e))?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(index, line)| {
            serde_json::from_str(line).map_err(|source| line_error(index + 1, source))
        })
        .collect()
}

/// Opens a command event stream for lazy, typed, line-by-line reading.
pub fn read_command_events(path: &Path) -> Result<CommandEventReader> {
    JsonLines::open(path)
}

/// Opens a JSON-lines file without imposing the command event schema.
///
/// Used by the exporter so records from older writers (e.g. `ppid` stored as
/// a string) still travel through unchanged.
pub fn read_json_lines(path: &Path) -> Result<JsonLines<Value>> {
    JsonLines::open(path)
}

pub type CommandEventReader = JsonLines<CommandEvent>;

/// Iterator over a JSON-lines stream such as `commands.jsonl`.
///
/// A line that is not JSON yields [`RtlogError::Parse`]; a JSON line that does
/// not fit `T` yields [`RtlogError::Schema`]. Both carry the 1-based line
/// number and reading continues with the next line. Blank lines are skipped.
/// An I/O error ends the stream after it is yielded. The reader is
/// single-pass; open the file again to replay.
pub struct JsonLines<T> {
    lines: std::io::Split<BufReader<fs::File>>,
    line_no: usize,
    done: bool,
    _record: PhantomData<fn() -> T>,
}

impl<T> JsonLines<T> {
    /// 1-based number of the line most recently read.
    pub fn line(&self) -> usize {
        self.line_no
    }

    fn open(path: &Path) -> Result<Self> {
        let file = fs::File::open(path).map_err(|e| RtlogError::io("open JSON lines", e))?;
        Ok(Self {
            lines: BufReader::new(file).split(b'\n'),
            line_no: 0,
            done: false,
            _record: PhantomData,
        })
    }
}

impl<T: DeserializeOwned> Iterator for JsonLines<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let bytes = match self.lines.next()? {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.done = true;
                    return Some(Err(RtlogError::io("read JSON lines", e)));
                }
            };
            self.line_no += 1;

            if bytes.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let line = self.line_no;
            return Some(
                serde_json::from_slice::<T>(&bytes).map_err(|source| line_error(line, source)),
            );
        }
    }
}

fn line_error(line: usize, source: serde_json::Error) -> RtlogError {
    if source.classify() == Category::Data {
        RtlogError::Schema { line, source }
    } else {
        RtlogError::Parse { line, source }
    }
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut file = open_append(path)?;
    file.write_all(line.as_bytes())
        .map_err(|e| RtlogError::io(format!("append to {}", path.display()), e))?;
    harden(path, FILE_MODE)
}

fn open_append(path: &Path) -> Result<std::fs::File> {
    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(FILE_MODE);
    }
    options
        .open(path)
        .map_err(|e| RtlogError::io(format!("open {}", path.display()), e))
}

fn build_dir(path: &Path, recursive: bool) -> Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(recursive);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }
    builder
        .create(path)
        .map_err(|e| RtlogError::io(format!("create directory {}", path.display()), e))
}

/// Forces `mode` on `path`, whatever the umask did at creation time.
pub fn harden(path: &Path, mode: u32) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
            .map_err(|e| RtlogError::io("set permissions", e))?;
    }
    #[cfg(not(unix))]
    {
        let _ = (path, mode);
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::BTreeMap;

    use chrono::TimeZone;
    use rtlog_schema::{CommandEvent, CommandEventInput};

    pub fn sample_event(command: &str, exit_status: i32) -> CommandEvent {
        CommandEvent::from_input(CommandEventInput {
            timestamp: chrono::Utc
                .with_ymd_and_hms(2025, 5, 14, 14, 31, 5)
                .unwrap(),
            duration: 0.042,
            user: "op".to_string(),
            cwd: "/home/op".to_string(),
            command: command.to_string(),
            exit_status,
            session_id: "6f0c2c1e-0000-4000-8000-000000000001".to_string(),
            tty: "/dev/pts/3".to_string(),
            ppid: 4242,
            env: BTreeMap::from([("SHELL".to_string(), "/bin/zsh".to_string())]),
            ttp_tag: Some("T1190_Exploit".to_string()),
            transcript: "/tmp/rt/20250514T143000Z_T1190_Exploit.log".to_string(),
        })
    }
}
