//! `rtlog help --topic <start|import|all>`.

use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Topic {
    Start,
    Import,
    All,
}

const OVERVIEW: &str = "\
rtlog - Red Team Session Logger

OVERVIEW:
  rtlog records zsh sessions for red team operations: every command with its
  metadata, plus a full terminal transcript. Your ~/.zshrc is sourced but never
  modified. Sessions can be tagged with a MITRE ATT&CK technique and exported
  for VECTR.

SUBCOMMANDS:
  start [--outdir DIR] [--name NAME] [--verbose] [--no-color]
    Launch a logged zsh session.

  stop [--force]
    Stop the active session. --force also clears a corrupt session record.

  status
    Show the active session (directory, session ID, PID).

  import --input FILE --output FILE [--template FILE]
    Convert commands.jsonl to VECTR JSON.

  help [--topic start|import|all]
    Show help for a topic (default: all).

FILES PRODUCED (per session directory, owner-only permissions):
  commands.jsonl              One JSON object per command
  commands.log                Human-readable summary (ANSI colors optional)
  <timestamp>[_<name>].log    Terminal transcript
  <timestamp>[_<name>].time   Timing data for replay
  audit.log                   Session start/stop/end events

ENVIRONMENT:
  RTLOG_HOME         Storage root (default: ~/.rt_command_logger)
  RTLOG_DEBUG_LOG=1  Debug logging to stderr and <root>/rtlog-debug.log

TROUBLESHOOTING:
  - Check <SESSION_DIR>/audit.log and ~/.rt_command_logger/rtlog-debug.log
  - Ensure zsh and script are installed: `zsh --version`
  - A stale session left by a crash is reclaimed by the next `start`
";

const START: &str = "\
rtlog start - Launch a Logged Zsh Session

PURPOSE:
  Starts an interactive zsh under `script`, recording the transcript and timing
  data, while shell hooks append per-command metadata to the session directory.
  Blocks until the shell exits or `rtlog stop` is run from another terminal.

OPTIONS:
  --outdir, -o DIR    Output directory (default: ~/.rt_command_logger)
  --name, -n NAME     Session tag, e.g. T1190_Exploit (optional)
  --verbose, -v       Show session details and informational logs
  --no-color          Disable ANSI colors in commands.log

EXAMPLES:
  rtlog start --outdir ~/rt_logs --name T1190_Exploit_Public_Facing_Application
  rtlog start -o ~/rt_logs -n T1059 --no-color

NOTES:
  - Session directory: <outdir>/<timestamp>_<hostname>_<user>[_<name>]
  - Names keep only letters, digits, '_' and '-' (max 50 characters)
  - Variables starting with API_ or TOKEN_ are removed from the session shell
  - Only one session may be active at a time
";

const IMPORT: &str = "\
rtlog import - Convert Logs to VECTR JSON

PURPOSE:
  Converts a session's commands.jsonl into a single JSON document of the form
  { \"events\": [ ... ] } for importing attack evidence.

OPTIONS:
  --input, -i FILE     Path to commands.jsonl from a session
  --output, -O FILE    Output path for the VECTR JSON document
  --template, -t FILE  Custom VECTR template (reserved; events are wrapped as
                       { \"mapped\": <event> })

EXAMPLES:
  rtlog import -i ~/rt_logs/20250514T143000Z_mac1_op_T1190_Exploit/commands.jsonl -O vectr_events.json

NOTES:
  - Malformed lines are skipped with a warning; the rest are exported
  - The output file is replaced atomically and readable only by you
";

pub fn text(topic: Topic) -> &'static str {
    match topic {
        Topic::Start => START,
        Topic::Import => IMPORT,
        Topic::All => OVERVIEW,
    }
}

pub fn run(topic: Topic) {
    println!("{}", text(topic).trim_end());
}
