//! Human-readable `commands.log` blocks.
//!
//! Derived entirely from a [`CommandEvent`]; nothing here is machine-parsed.

use std::fmt::Write as _;

use rtlog_schema::CommandEvent;

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const MAGENTA: &str = "\x1b[35m";
const CYAN: &str = "\x1b[36m";

struct Palette {
    color: bool,
}

impl Palette {
    fn paint(&self, style: &str, text: &str) -> String {
        if self.color {
            format!("{}{}{}", style, text, RESET)
        } else {
            text.to_string()
        }
    }
}

/// Renders one `=== Command #N ===` block, terminated by a blank line.
pub fn render_block(index: u64, event: &CommandEvent, color: bool) -> String {
    let p = Palette { color };
    let exit_style = if event.exit_status == 0 { GREEN } else { RED };
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(
        out,
        "{}",
        p.paint(&format!("{}{}", MAGENTA, BOLD), &format!("=== Command #{} ===", index))
    );
    let _ = writeln!(
        out,
        "{} {} (Duration: {:.3}s)",
        p.paint(YELLOW, "Timestamp:"),
        event.timestamp.format(rtlog_schema::TIMESTAMP_FORMAT),
        event.duration
    );
    let _ = writeln!(out, "{} {}", p.paint(BOLD, "Command:  "), event.command);
    let _ = writeln!(out, "Args:      {}", event.args);
    let _ = writeln!(
        out,
        "{}",
        p.paint(
            exit_style,
            &format!("Exit:      {} ({})", event.exit_status, event.exit_desc)
        )
    );
    let _ = writeln!(
        out,
        "{} {}@{}",
        p.paint(YELLOW, "User@CWD: "),
        event.user,
        event.cwd
    );
    let _ = writeln!(out, "{} {}", p.paint(CYAN, "TTP Tag:  "), event.ttp_tag);
    let _ = writeln!(out, "{}", p.paint(DIM, "Details:"));
    for (label, value) in [
        ("TTY:       ", event.tty.clone()),
        ("PPID:      ", event.ppid.to_string()),
        ("Hash:      ", event.command_hash.clone()),
        ("Transcript:", event.transcript.clone()),
    ] {
        let _ = writeln!(out, "{}", p.paint(DIM, &format!("  {} {}", label, value)));
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::test_support::sample_event;

    #[test]
    fn plain_block_has_no_escape_codes() {
        let block = render_block(3, &sample_event("nmap -sV 10.0.0.1", 0), false);
        assert!(!block.contains('\x1b'));
        assert!(block.starts_with("=== Command #3 ===\n"));
        assert!(block.contains("Command:   nmap -sV 10.0.0.1\n"));
        assert!(block.contains("Args:      -sV 10.0.0.1\n"));
        assert!(block.contains("Exit:      0 (Success)\n"));
        assert!(block.contains("Timestamp: 2025-05-14T14:31:05Z (Duration: 0.042s)\n"));
        assert!(block.ends_with("\n\n"));
    }

    #[test]
    fn colored_block_styles_failures_red() {
        let block = render_block(1, &sample_event("false", 1), true);
        assert!(block.contains(&format!("{}Exit:      1 (Error (code 1)){}", RED, RESET)));
        assert!(block.contains(MAGENTA));
    }
}
