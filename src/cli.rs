//! Command-line interface for codetick.

use std::io::BufRead;

use clap::Parser;
use std::path::PathBuf;

use crate::api::{ApiClient, SendOutcome};
use crate::config::Settings;
use crate::heartbeat::{Heartbeat, RawHeartbeat};
use crate::logs;

/// Exit codes. These are part of the agent's contract with editor plugins
/// and must stay stable across releases.
pub const SUCCESS: i32 = 0;
pub const API_ERROR: i32 = 102;
pub const CONFIG_FILE_PARSE_ERROR: i32 = 103;
pub const AUTH_ERROR: i32 = 104;
pub const UNKNOWN_ERROR: i32 = 105;
pub const MALFORMED_HEARTBEAT_ERROR: i32 = 106;
pub const CONNECTION_ERROR: i32 = 107;

/// Common interface for the CodeTick api.
///
/// Editor plugins invoke this binary once per activity event. The agent
/// builds a heartbeat from the arguments, sends it to the api, and exits.
#[derive(Parser, Debug)]
#[command(name = "codetick")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Absolute path to file for the heartbeat. Can also be a url, domain
    /// or app when --entity-type is not file.
    #[arg(long, value_name = "FILE")]
    pub entity: Option<String>,

    /// Entity type for this heartbeat. Can be "file", "domain" or "app".
    /// Defaults to "file".
    #[arg(long, value_name = "TYPE")]
    pub entity_type: Option<String>,

    /// Category of this heartbeat activity, for example "coding",
    /// "building", "debugging" or "code reviewing". Defaults to "coding".
    #[arg(long, value_name = "CATEGORY")]
    pub category: Option<String>,

    /// Optional floating-point unix epoch timestamp. Uses current time by
    /// default.
    #[arg(long, value_name = "EPOCH")]
    pub time: Option<f64>,

    /// When set, tells the api this heartbeat was triggered from writing
    /// to a file.
    #[arg(long = "write")]
    pub is_write: bool,

    /// Your codetick api key; uses api_key from ~/.codetick.toml by default.
    #[arg(long, value_name = "API_KEY")]
    pub key: Option<String>,

    /// Optional text editor plugin name and version for the User-Agent
    /// header.
    #[arg(long, value_name = "PLUGIN")]
    pub plugin: Option<String>,

    /// Optional line number. This is the current line being edited.
    #[arg(long, value_name = "INT")]
    pub lineno: Option<u32>,

    /// Optional cursor position in the current file.
    #[arg(long, value_name = "INT")]
    pub cursorpos: Option<u32>,

    /// Optional project name.
    #[arg(long, value_name = "PROJECT")]
    pub project: Option<String>,

    /// Optional alternate project name. Auto-discovered project takes
    /// priority.
    #[arg(long, value_name = "PROJECT")]
    pub alternate_project: Option<String>,

    /// Optional language name. If valid, takes priority over auto-detected
    /// language.
    #[arg(long, value_name = "LANGUAGE")]
    pub language: Option<String>,

    #[arg(long, value_name = "LANGUAGE", hide = true)]
    pub alternate_language: Option<String>,

    /// Absolute path to local file for the heartbeat. When --entity is a
    /// remote file, this local file is used for stats and just the value
    /// of --entity is sent with the heartbeat.
    #[arg(long, value_name = "FILE")]
    pub local_file: Option<String>,

    /// Hostname of the current machine.
    #[arg(long, value_name = "HOSTNAME")]
    pub hostname: Option<String>,

    /// Filename patterns to exclude from logging. POSIX regex syntax. Can
    /// be used more than once.
    #[arg(long, value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// Filename patterns to log. When used in combination with --exclude,
    /// files matching include will still be logged. POSIX regex syntax.
    /// Can be used more than once.
    #[arg(long, value_name = "PATTERN")]
    pub include: Vec<String>,

    /// Disables tracking folders unless they contain a .codetick-project
    /// file. Defaults to false.
    #[arg(long)]
    pub include_only_with_project_file: bool,

    /// When set, any activity where the project cannot be detected is
    /// ignored.
    #[arg(long)]
    pub exclude_unknown_project: bool,

    /// Obfuscate filenames. Will not send file names to the api.
    #[arg(long)]
    pub hide_file_names: bool,

    /// Obfuscate project names. When a project folder is detected, a
    /// .codetick-project file is created with a random project name
    /// instead of sending the folder name.
    #[arg(long)]
    pub hide_project_names: bool,

    /// Obfuscate branch names. Will not send revision control branch
    /// names to the api.
    #[arg(long)]
    pub hide_branch_names: bool,

    /// Disables offline time logging instead of queuing logged time.
    #[arg(long = "disable-offline")]
    pub disable_offline: bool,

    /// Reads extra heartbeats from STDIN as a JSON array until EOF.
    #[arg(long)]
    pub extra_heartbeats: bool,

    /// Amount of offline activity to sync from the local ~/.codetick.db
    /// file before exiting. Can be "none" or a positive integer. Defaults
    /// to 100. Can be used without --entity to only sync offline activity.
    #[arg(long, value_name = "AMOUNT")]
    pub sync_offline_activity: Option<String>,

    /// Heartbeats api url. For debugging with a local server.
    #[arg(long, value_name = "URL")]
    pub api_url: Option<String>,

    /// Number of seconds to wait when sending heartbeats to the api.
    /// Defaults to 60 seconds.
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Defaults to ~/.codetick.toml.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Defaults to ~/.codetick.log.
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Turns on debug messages in the log file.
    #[arg(long)]
    pub verbose: bool,
}

/// Run one agent invocation and return the process exit code.
pub fn run(cli: &Cli) -> anyhow::Result<i32> {
    let settings = match Settings::from_cli(cli) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(e.exit_code());
        }
    };

    logs::setup(&settings);
    crate::init();

    let mut malformed_input = false;
    let mut heartbeats: Vec<Heartbeat> = Vec::new();

    if cli.entity.is_some() {
        let raw = RawHeartbeat::from_cli(cli);
        match Heartbeat::build(raw, &settings) {
            Ok(hb) => heartbeats.push(hb),
            Err(skip) => tracing::debug!("{}", skip),
        }
    }

    if cli.extra_heartbeats {
        match read_extra_heartbeats() {
            Ok(raws) => {
                for raw in raws {
                    match Heartbeat::build(raw, &settings) {
                        Ok(hb) => heartbeats.push(hb),
                        Err(skip) => tracing::debug!("{}", skip),
                    }
                }
            }
            Err(e) => {
                tracing::warn!("malformed extra heartbeats json: {}", e);
                malformed_input = true;
            }
        }
    }

    let client = ApiClient::new(&settings)?;

    let mut outcome = client.send_all(&heartbeats);
    if outcome == SendOutcome::Sent {
        outcome = client.drain_offline_queue();
    }

    if outcome == SendOutcome::Sent && malformed_input {
        return Ok(MALFORMED_HEARTBEAT_ERROR);
    }
    Ok(outcome.exit_code())
}

/// Read one line of JSON-encoded heartbeats from stdin.
///
/// Editors pass extra heartbeats as a single JSON array on the first line
/// of stdin when invoking with `--extra-heartbeats`.
fn read_extra_heartbeats() -> anyhow::Result<Vec<RawHeartbeat>> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let raws: Vec<RawHeartbeat> = serde_json::from_str(&line)?;
    Ok(raws)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_basic_flags() {
        let cli = Cli::parse_from([
            "codetick",
            "--entity",
            "/tmp/main.rs",
            "--write",
            "--plugin",
            "vim/8.2 vim-codetick/0.4",
            "--lineno",
            "42",
        ]);
        assert_eq!(cli.entity.as_deref(), Some("/tmp/main.rs"));
        assert!(cli.is_write);
        assert_eq!(cli.lineno, Some(42));
        assert!(!cli.extra_heartbeats);
    }

    #[test]
    fn test_cli_repeatable_patterns() {
        let cli = Cli::parse_from([
            "codetick",
            "--exclude",
            "^/tmp/",
            "--exclude",
            "\\.secret$",
            "--include",
            "^/tmp/keep/",
        ]);
        assert_eq!(cli.exclude.len(), 2);
        assert_eq!(cli.include.len(), 1);
    }
}
