//! The active-session state record.
//!
//! On disk the record is three newline-separated fields and nothing else:
//!
//! ```text
//! /Users/op/.rt_command_logger/20250514T143000Z_mac1_op_T1190_Exploit
//! 0b6d3f0e-2f4c-4c8e-9a57-54d1f5f2a0c1
//! 48213
//! ```

use std::path::PathBuf;

use crate::error::{Result, RtlogError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateRecord {
    pub directory: PathBuf,
    pub session_id: String,
    pub owner_pid: u32,
}

impl StateRecord {
    pub fn new(directory: PathBuf, session_id: impl Into<String>, owner_pid: u32) -> Self {
        Self {
            directory,
            session_id: session_id.into(),
            owner_pid,
        }
    }

    /// Checks that the record survives a render/parse round trip.
    pub fn validate(&self) -> Result<()> {
        let directory = self.directory.to_string_lossy();
        if directory.trim().is_empty() || directory.contains('\n') {
            return Err(RtlogError::InvalidRecord(format!(
                "directory {:?} cannot be stored",
                directory
            )));
        }
        if self.session_id.trim().is_empty() || self.session_id.contains('\n') {
            return Err(RtlogError::InvalidRecord(format!(
                "session id {:?} cannot be stored",
                self.session_id
            )));
        }
        if !is_signalable_pid(self.owner_pid) {
            return Err(RtlogError::InvalidRecord(format!(
                "owner pid {} is not a valid process id",
                self.owner_pid
            )));
        }
        Ok(())
    }

    pub fn render(&self) -> String {
        format!(
            "{}\n{}\n{}",
            self.directory.display(),
            self.session_id,
            self.owner_pid
        )
    }

    /// Parses persisted record content. `location` is only used in errors.
    pub fn parse(content: &str, location: &str) -> Result<Self> {
        let corrupt = |details: String| RtlogError::Corrupt {
            location: location.to_string(),
            details,
        };

        let fields: Vec<&str> = content.trim().split('\n').map(str::trim).collect();
        let [directory, session_id, pid] = fields.as_slice() else {
            return Err(corrupt(format!("expected 3 fields, found {}", fields.len())));
        };

        if directory.is_empty() || session_id.is_empty() {
            return Err(corrupt("empty field".to_string()));
        }

        let owner_pid: u32 = pid
            .parse()
            .map_err(|_| corrupt(format!("invalid pid {:?}", pid)))?;
        if !is_signalable_pid(owner_pid) {
            return Err(corrupt(format!("invalid pid {}", owner_pid)));
        }

        Ok(Self {
            directory: PathBuf::from(directory),
            session_id: session_id.to_string(),
            owner_pid,
        })
    }
}

// pid 0 and anything that wraps negative in kill(2) would address process groups.
fn is_signalable_pid(pid: u32) -> bool {
    pid > 0 && i32::try_from(pid).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> StateRecord {
        StateRecord::new(PathBuf::from("/tmp/rt/session"), "abc-123", 4242)
    }

    #[test]
    fn render_parse_round_trip() {
        let parsed = StateRecord::parse(&record().render(), "mem").unwrap();
        assert_eq!(parsed, record());
    }

    #[test]
    fn parse_tolerates_trailing_newline() {
        let parsed = StateRecord::parse("/tmp/rt/session\nabc-123\n4242\n", "mem").unwrap();
        assert_eq!(parsed, record());
    }

    #[test]
    fn parse_rejects_wrong_field_count() {
        for content in ["", "/tmp/rt/session\nabc-123", "/a\nb\n1\nextra"] {
            let err = StateRecord::parse(content, "mem").unwrap_err();
            assert!(matches!(err, RtlogError::Corrupt { .. }), "{:?}", content);
        }
    }

    #[test]
    fn parse_rejects_bad_pids() {
        for pid in ["zero", "0", "-5", "4294967295", ""] {
            let content = format!("/tmp/rt/session\nabc-123\n{}", pid);
            assert!(
                matches!(
                    StateRecord::parse(&content, "mem"),
                    Err(RtlogError::Corrupt { .. })
                ),
                "pid {:?} accepted",
                pid
            );
        }
    }

    #[test]
    fn validate_rejects_unstorable_fields() {
        let mut bad = record();
        bad.directory = PathBuf::from("/tmp/evil\nline");
        assert!(bad.validate().is_err());

        let mut bad = record();
        bad.owner_pid = 0;
        assert!(bad.validate().is_err());

        assert!(record().validate().is_ok());
    }
}
