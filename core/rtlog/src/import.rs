//! `rtlog import`: commands.jsonl → VECTR JSON.

use std::path::Path;

use rtlog_core::{export, RtlogError};

pub fn run(input: &Path, output: &Path, template: Option<&Path>) -> Result<(), RtlogError> {
    // Each skipped line is already reported as a warning by the exporter.
    let report = export(input, output, template)?;
    println!(
        "Exported {} events to {}.",
        report.exported,
        report.output.display()
    );
    if !report.skipped.is_empty() {
        println!("Skipped {} malformed line(s).", report.skipped.len());
    }
    Ok(())
}
