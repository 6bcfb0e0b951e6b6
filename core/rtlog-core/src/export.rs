//! Evidence export.
//!
//! Converts a session's `commands.jsonl` into a single JSON document for
//! import into a case-management system (VECTR):
//!
//! ```json
//! {
//!   "events": [
//!     { "timestamp": "2025-05-14T14:31:05Z", "command": "whoami", ... }
//!   ]
//! }
//! ```
//!
//! Malformed lines are skipped and reported, never fatal. The document is
//! built in memory and installed with temp file + rename, so the output path
//! either keeps its previous content or holds the complete new document.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{json, Value};
use tempfile::NamedTempFile;

use crate::artifacts::{create_private_dir_all, harden, read_json_lines, FILE_MODE};
use crate::error::{Result, RtlogError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub output: PathBuf,
    pub exported: usize,
    pub skipped: Vec<SkippedLine>,
}

#[derive(Serialize)]
struct EvidenceDocument {
    events: Vec<Value>,
}

/// Exports `input` to `output`.
///
/// Every JSON object line is exported as-is, whether or not it matches the
/// current command event schema, so streams from older writers keep working.
/// Lines that are not JSON, or JSON that is not an object, are skipped.
///
/// `template` reserves a mapping hook: when present, each event is wrapped as
/// `{"mapped": <event>}`. The template file itself is not interpreted yet.
pub fn export(input: &Path, output: &Path, template: Option<&Path>) -> Result<ExportReport> {
    if !input.exists() {
        return Err(RtlogError::InputNotFound(input.to_path_buf()));
    }
    if !input.is_file() {
        return Err(RtlogError::NotAFile(input.to_path_buf()));
    }

    let mut events = Vec::new();
    let mut skipped = Vec::new();

    let mut lines = read_json_lines(input)?;
    while let Some(item) = lines.next() {
        match item {
            Ok(Value::Object(record)) => {
                let value = Value::Object(record);
                events.push(if template.is_some() {
                    json!({ "mapped": value })
                } else {
                    value
                });
            }
            Ok(other) => {
                let line = lines.line();
                tracing::warn!(line, kind = json_kind(&other), "Skipping JSON line that is not an object");
                skipped.push(SkippedLine {
                    line,
                    reason: format!("expected a JSON object, found {}", json_kind(&other)),
                });
            }
            Err(RtlogError::Parse { line, source }) => {
                tracing::warn!(line, error = %source, "Skipping malformed JSON line");
                skipped.push(SkippedLine {
                    line,
                    reason: source.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    let exported = events.len();
    let document = serde_json::to_string_pretty(&EvidenceDocument { events })
        .map_err(|e| RtlogError::json("serialize evidence document", e))?;
    write_document(output, &document)?;

    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        exported,
        skipped = skipped.len(),
        "Evidence export complete"
    );

    Ok(ExportReport {
        output: output.to_path_buf(),
        exported,
        skipped,
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn write_document(output: &Path, document: &str) -> Result<()> {
    let write_error = |source: std::io::Error| RtlogError::WriteError {
        path: output.to_path_buf(),
        source,
    };

    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    create_private_dir_all(&parent).map_err(|e| match e {
        RtlogError::Io { source, .. } => write_error(source),
        other => other,
    })?;

    let mut temp_file = NamedTempFile::new_in(&parent).map_err(write_error)?;
    temp_file
        .write_all(document.as_bytes())
        .map_err(write_error)?;
    temp_file.write_all(b"\n").map_err(write_error)?;
    temp_file.flush().map_err(write_error)?;
    temp_file.persist(output).map_err(|e| write_error(e.error))?;

    harden(output, FILE_MODE).map_err(|e| match e {
        RtlogError::Io { source, .. } => write_error(source),
        other => other,
    })
}
