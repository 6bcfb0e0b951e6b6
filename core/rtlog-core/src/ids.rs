//! Session identifiers and artifact naming.
//!
//! Names embed a compact UTC timestamp (`YYYYMMDDTHHMMSSZ`) first so that a
//! plain lexicographic sort of session directories is also chronological.
//!
//! ```text
//! <outdir>/20250514T143000Z_mac1_op_T1190_Exploit/
//! ├── 20250514T143000Z_T1190_Exploit.log    transcript
//! └── 20250514T143000Z_T1190_Exploit.time   timing
//! ```

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Longest sanitized tag kept in names.
pub const MAX_NAME_LEN: usize = 50;

const NAME_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Fresh random (v4) session ID in canonical hyphenated form.
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format(NAME_TIMESTAMP_FORMAT).to_string()
}

/// Reduces a user-supplied tag to `[A-Za-z0-9_-]{0,50}`.
///
/// Spaces, path separators and colons become `_`; every other character
/// outside the allowed set is dropped. Names longer than [`MAX_NAME_LEN`] are
/// truncated with a warning.
pub fn sanitize_name(name: &str) -> String {
    let mut sanitized: String = name
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' | ':' => '_',
            other => other,
        })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();

    if sanitized.len() > MAX_NAME_LEN {
        tracing::warn!(
            name = %sanitized,
            max = MAX_NAME_LEN,
            "Session name is too long; truncating to avoid filesystem issues"
        );
        sanitized.truncate(MAX_NAME_LEN);
    }

    sanitized
}

/// `<timestamp>_<hostname>_<user>[_<name>]`
pub fn session_dir_name(
    timestamp: DateTime<Utc>,
    hostname: &str,
    user: &str,
    name: &str,
) -> String {
    let mut dir_name = format!(
        "{}_{}_{}",
        format_timestamp(timestamp),
        path_component(hostname),
        path_component(user)
    );
    if !name.is_empty() {
        dir_name.push('_');
        dir_name.push_str(name);
    }
    dir_name
}

/// `<timestamp>[_<name>].<suffix>`
pub fn artifact_file_name(timestamp: DateTime<Utc>, name: &str, suffix: &str) -> String {
    if name.is_empty() {
        format!("{}.{}", format_timestamp(timestamp), suffix)
    } else {
        format!("{}_{}.{}", format_timestamp(timestamp), name, suffix)
    }
}

// Hostnames and user names are kept readable (dots survive) but may not
// introduce extra path components.
fn path_component(value: &str) -> String {
    let cleaned: String = value
        .trim()
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c == ':' || c.is_whitespace() || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "unknown".to_string(),
        _ => cleaned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use regex::Regex;
    use std::collections::HashSet;

    fn at_1430() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 14, 14, 30, 0).unwrap()
    }

    #[test]
    fn sanitize_replaces_separators_and_strips_symbols() {
        assert_eq!(sanitize_name("T1190 Exploit!!"), "T1190_Exploit");
        assert_eq!(sanitize_name("a/b:c\\d"), "a_b_c_d");
        assert_eq!(sanitize_name("  padded  "), "padded");
        assert_eq!(sanitize_name("keep-dash_under"), "keep-dash_under");
    }

    #[test]
    fn sanitize_empty_is_empty() {
        assert_eq!(sanitize_name(""), "");
        assert_eq!(sanitize_name("!!!"), "");
    }

    #[test]
    fn sanitize_truncates_long_names() {
        let long = "A".repeat(80);
        assert_eq!(sanitize_name(&long).len(), MAX_NAME_LEN);
    }

    #[test]
    fn sanitize_output_always_matches_safe_pattern() {
        let pattern = Regex::new(r"^[A-Za-z0-9_-]{0,50}$").unwrap();
        let inputs = [
            "T1190 Exploit Public Facing Application With A Very Long Suffix Indeed",
            "../../etc/passwd",
            "ünïcödé täg",
            "tab\tand\nnewline",
            "emoji 🚀 launch",
            "C:\\Windows\\System32",
            "$(rm -rf ~)",
            "",
            " ",
            "日本語",
        ];
        for input in inputs {
            let sanitized = sanitize_name(input);
            assert!(
                pattern.is_match(&sanitized),
                "{:?} sanitized to {:?}",
                input,
                sanitized
            );
        }
    }

    #[test]
    fn session_dir_name_matches_documented_layout() {
        let name = sanitize_name("T1190 Exploit!!");
        assert_eq!(
            session_dir_name(at_1430(), "mac1", "op", &name),
            "20250514T143000Z_mac1_op_T1190_Exploit"
        );
        assert_eq!(
            session_dir_name(at_1430(), "mac1", "op", ""),
            "20250514T143000Z_mac1_op"
        );
    }

    #[test]
    fn session_dir_name_keeps_a_single_component() {
        let name = session_dir_name(at_1430(), "evil/../host", "us er", "");
        assert!(!name.contains('/'));
        assert_eq!(name, "20250514T143000Z_evil_.._host_us_er");
        assert_eq!(
            session_dir_name(at_1430(), "..", "", ""),
            "20250514T143000Z_unknown_unknown"
        );
    }

    #[test]
    fn artifact_names() {
        assert_eq!(
            artifact_file_name(at_1430(), "T1190_Exploit", "log"),
            "20250514T143000Z_T1190_Exploit.log"
        );
        assert_eq!(
            artifact_file_name(at_1430(), "", "time"),
            "20250514T143000Z.time"
        );
    }

    #[test]
    fn timestamps_sort_chronologically() {
        let earlier = format_timestamp(Utc.with_ymd_and_hms(2025, 5, 14, 9, 59, 59).unwrap());
        let later = format_timestamp(Utc.with_ymd_and_hms(2025, 5, 14, 10, 0, 0).unwrap());
        let next_year = format_timestamp(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
        assert!(earlier < later);
        assert!(later < next_year);
    }

    #[test]
    fn session_ids_are_unique_uuids() {
        let ids: HashSet<_> = (0..1000).map(|_| new_session_id()).collect();
        assert_eq!(ids.len(), 1000);
        for id in ids.iter().take(5) {
            assert!(Uuid::parse_str(id).is_ok());
            assert_eq!(id.len(), 36);
        }
    }
}
