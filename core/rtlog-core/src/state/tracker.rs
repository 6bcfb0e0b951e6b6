//! Single-active-session tracking.
//!
//! `SessionTracker` answers "is a session running, and who owns it?" using
//! only the state record in its [`StateBackend`]. The record's presence is the
//! sole source of truth; process liveness is consulted to decide whether a
//! record left behind by a crash may be reclaimed.
//!
//! # Stale Records
//!
//! A record whose owner PID no longer exists (or that cannot be parsed) cannot
//! belong to a running session. `begin` and `ensure_idle` reclaim such records
//! with a warning instead of failing with `StateConflict` forever.

use std::path::Path;

use rtlog_schema::AuditKind;
use serde_json::json;

use crate::artifacts::append_audit_event;
use crate::error::{Result, RtlogError};

use super::process::{ProcessControl, SystemProcesses};
use super::store::StateBackend;
use super::types::StateRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    NoActiveSession,
    Stopped {
        record: StateRecord,
        /// False when the owner had already exited.
        signalled: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Active {
        record: StateRecord,
        owner_alive: bool,
    },
}

pub struct SessionTracker<S, P = SystemProcesses> {
    store: S,
    processes: P,
}

impl<S: StateBackend> SessionTracker<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            processes: SystemProcesses,
        }
    }
}

impl<S: StateBackend, P: ProcessControl> SessionTracker<S, P> {
    pub fn with_processes(store: S, processes: P) -> Self {
        Self { store, processes }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn processes(&self) -> &P {
        &self.processes
    }

    /// Records `directory`/`session_id`/`owner_pid` as the active session.
    pub fn begin(&self, directory: &Path, session_id: &str, owner_pid: u32) -> Result<StateRecord> {
        let record = StateRecord::new(directory.to_path_buf(), session_id, owner_pid);
        record.validate()?;

        self.ensure_idle()?;

        if !self.store.create(&record.render())? {
            // Another invocation won the race between ensure_idle and create.
            return Err(match self.current()? {
                Some(existing) => conflict(existing),
                None => RtlogError::Corrupt {
                    location: self.store.location(),
                    details: "record appeared and vanished during begin".to_string(),
                },
            });
        }

        tracing::info!(
            session_id = %record.session_id,
            dir = %record.directory.display(),
            pid = record.owner_pid,
            "Active session recorded"
        );
        Ok(record)
    }

    /// Fails with `StateConflict` if a live session is recorded. Stale or
    /// corrupt records are removed.
    pub fn ensure_idle(&self) -> Result<()> {
        match self.current() {
            Ok(None) => Ok(()),
            Ok(Some(existing)) if self.processes.is_alive(existing.owner_pid) => {
                Err(conflict(existing))
            }
            Ok(Some(existing)) => {
                tracing::warn!(
                    session_id = %existing.session_id,
                    pid = existing.owner_pid,
                    dir = %existing.directory.display(),
                    "Reclaiming stale session record (owner process is gone)"
                );
                self.store.remove()
            }
            Err(RtlogError::Corrupt { location, details }) => {
                tracing::warn!(
                    location = %location,
                    details = %details,
                    "Reclaiming corrupt session record"
                );
                self.store.remove()
            }
            Err(e) => Err(e),
        }
    }

    pub fn current(&self) -> Result<Option<StateRecord>> {
        match self.store.read()? {
            None => Ok(None),
            Some(content) => StateRecord::parse(&content, &self.store.location()).map(Some),
        }
    }

    pub fn end(&self) -> Result<()> {
        self.store.remove()
    }

    /// Removes the record only if it still names `session_id`.
    ///
    /// Returns whether a record was removed. Used by a session's own cleanup
    /// so it never deletes a record a later session has written.
    pub fn end_if(&self, session_id: &str) -> Result<bool> {
        match self.current() {
            Ok(Some(record)) if record.session_id == session_id => {
                self.store.remove()?;
                Ok(true)
            }
            Ok(_) => Ok(false),
            Err(RtlogError::Corrupt { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn status(&self) -> Result<SessionStatus> {
        Ok(match self.current()? {
            None => SessionStatus::Idle,
            Some(record) => SessionStatus::Active {
                owner_alive: self.processes.is_alive(record.owner_pid),
                record,
            },
        })
    }

    /// Terminates the owner of `record`, clears the state record and audits
    /// the stop in the session directory.
    ///
    /// An owner that has already exited is the goal state, not an error.
    pub fn request_stop(&self, record: &StateRecord) -> Result<StopOutcome> {
        let signalled = match self.processes.terminate(record.owner_pid) {
            Ok(()) => true,
            Err(RtlogError::NoSuchProcess(pid)) => {
                tracing::debug!(pid, "Session owner already exited");
                false
            }
            Err(e) => return Err(e),
        };

        self.end()?;

        if let Err(e) = append_audit_event(
            &record.directory,
            AuditKind::SessionStop,
            json!({ "session_id": record.session_id }),
        ) {
            tracing::warn!(
                error = %e,
                dir = %record.directory.display(),
                "Failed to append session_stop audit event"
            );
        }

        tracing::info!(
            session_id = %record.session_id,
            pid = record.owner_pid,
            signalled,
            "Session stopped"
        );
        Ok(StopOutcome::Stopped {
            record: record.clone(),
            signalled,
        })
    }

    pub fn stop(&self) -> Result<StopOutcome> {
        match self.current()? {
            None => Ok(StopOutcome::NoActiveSession),
            Some(record) => self.request_stop(&record),
        }
    }
}

fn conflict(existing: StateRecord) -> RtlogError {
    RtlogError::StateConflict {
        directory: existing.directory,
        session_id: existing.session_id,
        pid: existing.owner_pid,
    }
}

#[cfg(test)]
mod tests {
    use super::super::process::FakeProcesses;
    use super::super::store::{FileStateStore, MemoryStateStore};
    use super::*;
    use crate::artifacts::read_audit_events;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn tracker(alive: &[u32]) -> SessionTracker<MemoryStateStore, FakeProcesses> {
        SessionTracker::with_processes(MemoryStateStore::new(), FakeProcesses::with_alive(alive))
    }

    #[test]
    fn begin_then_current_returns_same_fields() {
        let tracker = tracker(&[100]);
        tracker
            .begin(Path::new("/tmp/rt/session"), "id-1", 100)
            .unwrap();

        let record = tracker.current().unwrap().unwrap();
        assert_eq!(record.directory, PathBuf::from("/tmp/rt/session"));
        assert_eq!(record.session_id, "id-1");
        assert_eq!(record.owner_pid, 100);
    }

    #[test]
    fn end_clears_current() {
        let tracker = tracker(&[100]);
        tracker.begin(Path::new("/tmp/rt/s"), "id-1", 100).unwrap();
        tracker.end().unwrap();
        assert_eq!(tracker.current().unwrap(), None);
        tracker.end().unwrap();
    }

    #[test]
    fn second_begin_conflicts() {
        let tracker = tracker(&[100, 200]);
        tracker.begin(Path::new("/tmp/rt/a"), "id-1", 100).unwrap();

        let err = tracker
            .begin(Path::new("/tmp/rt/b"), "id-2", 200)
            .unwrap_err();
        match err {
            RtlogError::StateConflict {
                directory,
                session_id,
                pid,
            } => {
                assert_eq!(directory, PathBuf::from("/tmp/rt/a"));
                assert_eq!(session_id, "id-1");
                assert_eq!(pid, 100);
            }
            other => panic!("expected StateConflict, got {:?}", other),
        }
        assert_eq!(tracker.current().unwrap().unwrap().session_id, "id-1");
    }

    #[test]
    fn begin_reclaims_stale_record() {
        let tracker = tracker(&[200]);
        tracker.begin(Path::new("/tmp/rt/a"), "id-1", 100).unwrap();

        // pid 100 is not alive, so the record is stale.
        tracker.begin(Path::new("/tmp/rt/b"), "id-2", 200).unwrap();
        assert_eq!(tracker.current().unwrap().unwrap().session_id, "id-2");
    }

    #[test]
    fn begin_reclaims_corrupt_record() {
        let tracker = SessionTracker::with_processes(
            MemoryStateStore::with_contents("garbage"),
            FakeProcesses::with_alive(&[200]),
        );
        tracker.begin(Path::new("/tmp/rt/b"), "id-2", 200).unwrap();
        assert_eq!(tracker.current().unwrap().unwrap().owner_pid, 200);
    }

    #[test]
    fn begin_rejects_invalid_record() {
        let tracker = tracker(&[]);
        assert!(matches!(
            tracker.begin(Path::new("/tmp/rt/a"), "id", 0),
            Err(RtlogError::InvalidRecord(_))
        ));
        assert_eq!(tracker.current().unwrap(), None);
    }

    #[test]
    fn current_reports_corrupt_record() {
        let tracker = SessionTracker::new(MemoryStateStore::with_contents("only\ntwo"));
        assert!(matches!(
            tracker.current(),
            Err(RtlogError::Corrupt { .. })
        ));
        assert!(tracker.status().is_err());
    }

    #[test]
    fn status_marks_dead_owner() {
        let tracker = tracker(&[]);
        tracker
            .store()
            .create("/tmp/rt/a\nid-1\n100")
            .unwrap();
        match tracker.status().unwrap() {
            SessionStatus::Active {
                record,
                owner_alive,
            } => {
                assert_eq!(record.session_id, "id-1");
                assert!(!owner_alive);
            }
            SessionStatus::Idle => panic!("expected active status"),
        }
    }

    #[test]
    fn stop_without_session_is_not_an_error() {
        let tracker = tracker(&[]);
        assert_eq!(tracker.stop().unwrap(), StopOutcome::NoActiveSession);
    }

    #[test]
    fn stop_signals_owner_and_audits() {
        let temp = tempdir().unwrap();
        let tracker = tracker(&[100]);
        tracker.begin(temp.path(), "id-1", 100).unwrap();

        let outcome = tracker.stop().unwrap();
        assert!(matches!(
            outcome,
            StopOutcome::Stopped { signalled: true, .. }
        ));
        assert_eq!(tracker.processes().terminated(), vec![100]);
        assert_eq!(tracker.current().unwrap(), None);

        let events = read_audit_events(temp.path()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, AuditKind::SessionStop);
        assert_eq!(events[0].details["session_id"], "id-1");
    }

    #[test]
    fn stop_tolerates_exited_owner() {
        let temp = tempdir().unwrap();
        let tracker = tracker(&[]);
        let record = StateRecord::new(temp.path().to_path_buf(), "id-1", 100);
        tracker.store().create(&record.render()).unwrap();

        let outcome = tracker.request_stop(&record).unwrap();
        assert_eq!(
            outcome,
            StopOutcome::Stopped {
                record,
                signalled: false
            }
        );
        assert_eq!(tracker.current().unwrap(), None);
        assert_eq!(read_audit_events(temp.path()).unwrap().len(), 1);
    }

    #[test]
    fn stop_with_missing_session_directory_still_clears_record() {
        let tracker = tracker(&[100]);
        tracker
            .begin(Path::new("/nonexistent/rtlog/session"), "id-1", 100)
            .unwrap();
        assert!(matches!(
            tracker.stop().unwrap(),
            StopOutcome::Stopped { .. }
        ));
        assert_eq!(tracker.current().unwrap(), None);
    }

    #[test]
    fn end_if_only_removes_matching_session() {
        let tracker = tracker(&[100]);
        tracker.begin(Path::new("/tmp/rt/a"), "id-1", 100).unwrap();

        assert!(!tracker.end_if("id-other").unwrap());
        assert!(tracker.current().unwrap().is_some());
        assert!(tracker.end_if("id-1").unwrap());
        assert_eq!(tracker.current().unwrap(), None);
    }

    #[test]
    fn file_backed_tracker_round_trip() {
        let temp = tempdir().unwrap();
        let tracker = SessionTracker::new(FileStateStore::new(temp.path().join(".rtlog_state")));
        let pid = std::process::id();

        tracker.begin(temp.path(), "id-file", pid).unwrap();
        let record = tracker.current().unwrap().unwrap();
        assert_eq!(record.owner_pid, pid);
        assert_eq!(record.directory, temp.path());

        // Our own process is alive, so a second begin conflicts.
        assert!(matches!(
            tracker.begin(temp.path(), "id-two", pid),
            Err(RtlogError::StateConflict { .. })
        ));

        tracker.end().unwrap();
        assert_eq!(tracker.current().unwrap(), None);
    }
}
