//! `rtlog stop` and `rtlog status`.
//!
//! Both run from a terminal other than the session's own and only touch the
//! state record (plus a `session_stop` audit line on stop).

use rtlog_core::{
    FileStateStore, RtlogError, SessionStatus, SessionTracker, StopOutcome, StorageConfig,
};

fn tracker(storage: &StorageConfig) -> SessionTracker<FileStateStore> {
    SessionTracker::new(FileStateStore::new(storage.state_file()))
}

pub fn run_stop(storage: &StorageConfig, force: bool) -> Result<(), RtlogError> {
    let tracker = tracker(storage);
    match tracker.stop() {
        Ok(StopOutcome::NoActiveSession) => println!("No active session found."),
        Ok(StopOutcome::Stopped { record, signalled }) => {
            println!(
                "Stopped session: {} (Session ID: {})",
                record.directory.display(),
                record.session_id
            );
            if !signalled {
                println!("Owner process {} had already exited.", record.owner_pid);
            }
        }
        Err(RtlogError::Corrupt { location, details }) if force => {
            tracing::warn!(location = %location, details = %details, "Clearing corrupt session record");
            tracker.end()?;
            println!("Cleared corrupt session record at {}.", location);
        }
        Err(e @ RtlogError::Corrupt { .. }) => {
            eprintln!("Run `rtlog stop --force` to clear the record.");
            return Err(e);
        }
        Err(e) => return Err(e),
    }
    Ok(())
}

pub fn run_status(storage: &StorageConfig) -> Result<(), RtlogError> {
    match tracker(storage).status() {
        Ok(SessionStatus::Idle) => println!("No active session."),
        Ok(SessionStatus::Active {
            record,
            owner_alive,
        }) => {
            println!("Active session:");
            println!("  Directory: {}", record.directory.display());
            println!("  Session ID: {}", record.session_id);
            if owner_alive {
                println!("  PID: {}", record.owner_pid);
            } else {
                println!("  PID: {} (not running; stale record)", record.owner_pid);
            }
        }
        Err(RtlogError::Corrupt { location, details }) => {
            tracing::warn!(location = %location, details = %details, "Session record is corrupt");
            println!("Session record is corrupt. Run `rtlog stop --force` to clear it.");
        }
        Err(e) => return Err(e),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn stop_and_status_without_session_succeed() {
        let temp = tempdir().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        run_stop(&storage, false).unwrap();
        run_status(&storage).unwrap();
    }

    #[test]
    fn corrupt_record_needs_force() {
        let temp = tempdir().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        std::fs::write(storage.state_file(), "garbage").unwrap();

        run_status(&storage).unwrap();
        assert!(matches!(
            run_stop(&storage, false),
            Err(RtlogError::Corrupt { .. })
        ));
        assert!(storage.state_file().exists());

        run_stop(&storage, true).unwrap();
        assert!(!storage.state_file().exists());
    }
}
