//! Session creation and guaranteed teardown.
//!
//! [`Session::create`] performs every step of `start` that leaves something on
//! disk, in an order where a failure never leaves a state record pointing at a
//! half-built session:
//!
//! 1. Pre-flight: refuse if a live session is recorded
//! 2. Create the hardened session directory
//! 3. `session_start` audit event
//! 4. Empty `commands.jsonl` / `commands.log`
//! 5. Active-session state record
//!
//! Once the record exists the caller holds a [`SessionGuard`]. Dropping it
//! writes `session_end` and removes the record, whether the shell exited, the
//! capture failed, or a signal interrupted the wait.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rtlog_schema::{AuditKind, NO_TAG};
use serde_json::json;

use crate::artifacts::{
    append_audit_event, create_session_directory, touch_secure, SessionLayout,
};
use crate::error::{Result, RtlogError};
use crate::ids::{new_session_id, sanitize_name, session_dir_name};
use crate::shell::ShellEnv;
use crate::state::{ProcessControl, SessionTracker, StateBackend};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOptions {
    pub outdir: PathBuf,
    /// Raw tag as typed by the operator; sanitized during create.
    pub name: Option<String>,
    pub color: bool,
}

/// Host facts baked into the session directory name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub now: DateTime<Utc>,
    pub hostname: String,
    pub user: String,
}

impl SessionContext {
    pub fn detect() -> Self {
        Self {
            now: Utc::now(),
            hostname: hostname(),
            user: current_user(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub layout: SessionLayout,
    /// Sanitized tag; `None` when absent or empty after sanitizing.
    pub tag: Option<String>,
    pub started_at: DateTime<Utc>,
    pub owner_pid: u32,
    pub color: bool,
}

impl Session {
    pub fn create<S, P>(
        tracker: &SessionTracker<S, P>,
        options: &StartOptions,
        context: &SessionContext,
        owner_pid: u32,
    ) -> Result<Session>
    where
        S: StateBackend,
        P: ProcessControl,
    {
        tracker.ensure_idle()?;

        let sanitized = options
            .name
            .as_deref()
            .map(sanitize_name)
            .unwrap_or_default();
        let dir_name = session_dir_name(context.now, &context.hostname, &context.user, &sanitized);
        let base = absolute(&options.outdir)?;
        let directory = create_session_directory(&base, &dir_name)?;

        let id = new_session_id();
        let layout = SessionLayout::new(directory, context.now, &sanitized);

        append_audit_event(
            layout.directory(),
            AuditKind::SessionStart,
            json!({
                "name": options.name.as_deref().unwrap_or(NO_TAG),
                "use_color": options.color,
                "session_id": id,
                "hostname": context.hostname,
                "user": context.user,
            }),
        )?;
        touch_secure(&layout.commands_jsonl())?;
        touch_secure(&layout.commands_log())?;

        tracker.begin(layout.directory(), &id, owner_pid)?;

        tracing::info!(
            session_id = %id,
            dir = %layout.directory().display(),
            "Session created"
        );

        Ok(Session {
            id,
            layout,
            tag: (!sanitized.is_empty()).then_some(sanitized),
            started_at: context.now,
            owner_pid,
            color: options.color,
        })
    }

    pub fn directory(&self) -> &Path {
        self.layout.directory()
    }

    /// Tag as recorded in command events.
    pub fn ttp_tag(&self) -> &str {
        self.tag.as_deref().unwrap_or(NO_TAG)
    }

    pub fn shell_env(&self, rtlog_bin: PathBuf) -> ShellEnv {
        ShellEnv {
            session_dir: self.directory().to_path_buf(),
            session_id: self.id.clone(),
            ttp_tag: self.ttp_tag().to_string(),
            transcript: self.layout.transcript(),
            color: self.color,
            rtlog_bin,
        }
    }

    pub fn guard<'a, S, P>(&'a self, tracker: &'a SessionTracker<S, P>) -> SessionGuard<'a, S, P>
    where
        S: StateBackend,
        P: ProcessControl,
    {
        SessionGuard {
            session: self,
            tracker,
        }
    }
}

/// Ends the session when dropped.
pub struct SessionGuard<'a, S: StateBackend, P: ProcessControl> {
    session: &'a Session,
    tracker: &'a SessionTracker<S, P>,
}

impl<S: StateBackend, P: ProcessControl> Drop for SessionGuard<'_, S, P> {
    fn drop(&mut self) {
        let layout = &self.session.layout;
        if let Err(e) = append_audit_event(
            layout.directory(),
            AuditKind::SessionEnd,
            json!({
                "transcript": layout.transcript().to_string_lossy(),
                "timing": layout.timing().to_string_lossy(),
            }),
        ) {
            tracing::warn!(error = %e, "Failed to append session_end audit event");
        }

        match self.tracker.end_if(&self.session.id) {
            Ok(true) => tracing::info!(session_id = %self.session.id, "Session ended"),
            Ok(false) => {
                tracing::debug!(session_id = %self.session.id, "State record already cleared")
            }
            Err(e) => tracing::warn!(error = %e, "Failed to clear active session record"),
        }
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| RtlogError::io("resolve output directory", e))?;
    Ok(cwd.join(path))
}

fn hostname() -> String {
    let mut buf = [0u8; 256];
    // SAFETY: buf is writable for its full length; gethostname NUL-terminates
    // on success when the name fits.
    #[allow(unsafe_code)]
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len()) };
    if rc != 0 {
        return "unknown".to_string();
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    let name = String::from_utf8_lossy(&buf[..end]).trim().to_string();
    if name.is_empty() {
        "unknown".to_string()
    } else {
        name
    }
}

fn current_user() -> String {
    ["USER", "LOGNAME"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
