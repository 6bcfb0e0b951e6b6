//! Session shell integration.
//!
//! The user's `~/.zshrc` is never modified. Instead each session gets a
//! throwaway `ZDOTDIR` whose `.zshrc` sources the user's file and then installs
//! two hooks:
//!
//! - `preexec` remembers the command line and its start time
//! - `precmd` reports the finished command to `rtlog record`
//!
//! The hooks only gather what the shell knows (command text, exit status,
//! duration, tty, `$PPID`); building and storing the event is left to
//! `rtlog record` so there is a single writer implementation.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::artifacts::{harden, FILE_MODE};
use crate::error::{Result, RtlogError};

pub const ENV_SESSION_DIR: &str = "RT_SESSION_DIR";
pub const ENV_SESSION_ID: &str = "RT_SESSION_ID";
pub const ENV_TTP_TAG: &str = "RT_TTP_TAG";
pub const ENV_TRANSCRIPT: &str = "RT_TRANSCRIPT_FILE";
pub const ENV_USE_COLOR: &str = "RT_USE_COLOR";

const RC_TEMPLATE: &str = r#"# rtlog session zshrc (generated; removed when the session ends)
typeset -g POWERLEVEL9K_INSTANT_PROMPT=quiet
export HISTFILE="$HOME/.zsh_history"

[[ -f "$HOME/.zshrc" ]] && source "$HOME/.zshrc"

zmodload zsh/datetime
autoload -Uz add-zsh-hook

export RT_SESSION_DIR=@SESSION_DIR@
export RT_SESSION_ID=@SESSION_ID@
export RT_TTP_TAG=@TTP_TAG@
export RT_TRANSCRIPT_FILE=@TRANSCRIPT@
export RT_USE_COLOR=@USE_COLOR@
typeset -gi RT_COMMAND_COUNT=0
typeset -g RTLOG_BIN=@RTLOG_BIN@

rtlog_preexec() {
    typeset -g RTLOG_CMD="$1"
    typeset -gF RTLOG_START=$EPOCHREALTIME
    (( RT_COMMAND_COUNT++ ))
}

rtlog_precmd() {
    local exit_status=$?
    [[ -z ${RTLOG_CMD+x} ]] && return
    local duration=$(( EPOCHREALTIME - RTLOG_START ))
    "$RTLOG_BIN" record \
        "--command=$RTLOG_CMD" \
        --exit-status "$exit_status" \
        --duration "$duration" \
        --index "$RT_COMMAND_COUNT" \
        --tty "$(tty)" \
        --ppid "$PPID"
    unset RTLOG_CMD
}

add-zsh-hook preexec rtlog_preexec
add-zsh-hook precmd rtlog_precmd

PS1="[RTLOG:$RT_SESSION_ID] $PS1"
"#;

/// Values exported into the session shell.
#[derive(Debug, Clone)]
pub struct ShellEnv {
    pub session_dir: PathBuf,
    pub session_id: String,
    pub ttp_tag: String,
    pub transcript: PathBuf,
    pub color: bool,
    pub rtlog_bin: PathBuf,
}

impl ShellEnv {
    pub fn render_rc(&self) -> String {
        RC_TEMPLATE
            .replace("@SESSION_DIR@", &shell_quote(&self.session_dir.to_string_lossy()))
            .replace("@SESSION_ID@", &shell_quote(&self.session_id))
            .replace("@TTP_TAG@", &shell_quote(&self.ttp_tag))
            .replace("@TRANSCRIPT@", &shell_quote(&self.transcript.to_string_lossy()))
            .replace("@USE_COLOR@", if self.color { "1" } else { "''" })
            .replace("@RTLOG_BIN@", &shell_quote(&self.rtlog_bin.to_string_lossy()))
    }
}

/// Temporary ZDOTDIR, deleted on drop.
pub struct ZdotDir {
    dir: TempDir,
}

impl ZdotDir {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Creates a private temp directory under `parent` holding the session `.zshrc`.
pub fn write_zdotdir(parent: &Path, env: &ShellEnv) -> Result<ZdotDir> {
    let dir = tempfile::Builder::new()
        .prefix("rtlog_")
        .tempdir_in(parent)
        .map_err(|e| RtlogError::io("create temporary ZDOTDIR", e))?;

    let rc_path = dir.path().join(".zshrc");
    let mut file = fs_err::File::create(&rc_path).map_err(|e| RtlogError::io("create .zshrc", e))?;
    file.write_all(env.render_rc().as_bytes())
        .map_err(|e| RtlogError::io("write .zshrc", e))?;
    harden(&rc_path, FILE_MODE)?;

    tracing::debug!(zdotdir = %dir.path().display(), "Session rc written");
    Ok(ZdotDir { dir })
}

/// Single-quotes `value` for zsh.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r#"'\''"#))
}
