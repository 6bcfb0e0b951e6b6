//! `rtlog start`: run one logged zsh session in the foreground.
//!
//! The session's state record and `session_end` audit event are owned by a
//! guard that lives for the whole function, so every return path (shell exit,
//! capture failure, forwarded signal) ends the session.

use std::path::PathBuf;

use rtlog_core::capture::{run_foreground, CaptureCommand};
use rtlog_core::session::{Session, SessionContext, StartOptions};
use rtlog_core::setup::{check_user_zshrc, require_dependencies};
use rtlog_core::shell::write_zdotdir;
use rtlog_core::{FileStateStore, RtlogError, SessionTracker, StorageConfig};

pub struct StartArgs {
    pub outdir: Option<PathBuf>,
    pub name: Option<String>,
    pub verbose: bool,
    pub color: bool,
}

pub fn run(storage: &StorageConfig, args: StartArgs) -> Result<(), RtlogError> {
    require_dependencies()?;
    let home = dirs::home_dir().ok_or(RtlogError::HomeDirNotFound)?;
    check_user_zshrc(&home);

    let tracker = SessionTracker::new(FileStateStore::new(storage.state_file()));
    let options = StartOptions {
        outdir: args.outdir.unwrap_or_else(|| storage.default_outdir()),
        name: args.name,
        color: args.color,
    };
    let session = Session::create(
        &tracker,
        &options,
        &SessionContext::detect(),
        std::process::id(),
    )?;
    let _guard = session.guard(&tracker);

    let rtlog_bin = std::env::current_exe()
        .map_err(|e| RtlogError::Capture(format!("cannot locate the rtlog binary: {}", e)))?;
    let zdotdir = write_zdotdir(&home, &session.shell_env(rtlog_bin))?;

    if args.verbose {
        println!("Session directory: {}", session.directory().display());
        println!("Session ID: {}", session.id);
        println!("TTP Tag: {}", session.ttp_tag());
        println!("Transcript: {}", session.layout.transcript().display());
        println!("Timing file: {}", session.layout.timing().display());
        println!("ZDOTDIR: {}", zdotdir.path().display());
        println!(
            "ANSI colors in commands.log: {}",
            if session.color { "enabled" } else { "disabled" }
        );
    }
    println!(
        "Starting logged session in: {} (Session ID: {})",
        session.directory().display(),
        session.id
    );
    println!("Type 'exit', Ctrl-D, or run 'rtlog stop' to end the session.");

    let capture = CaptureCommand {
        transcript: session.layout.transcript(),
        timing: session.layout.timing(),
        shell: "zsh".to_string(),
        zdotdir: zdotdir.path().to_path_buf(),
    };
    let outcome = run_foreground(capture.to_command())?;

    if outcome.interrupted {
        println!("\nSession interrupted.");
    } else if !outcome.status.success() {
        tracing::warn!(status = %outcome.status, "Capture process exited abnormally");
    }
    println!("Session ended. Logs in: {}", session.directory().display());
    Ok(())
}
