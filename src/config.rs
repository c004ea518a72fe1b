//! Runtime settings merged from command-line arguments and the
//! `~/.codetick.toml` config file.
//!
//! Command-line arguments take precedence over config file values. A
//! missing config file is fine; an unreadable or unparseable one is a
//! fatal error surfaced to the user, as is a missing or malformed api key.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::cli::{Cli, AUTH_ERROR, CONFIG_FILE_PARSE_ERROR};

/// Default bulk heartbeats endpoint.
pub const DEFAULT_API_URL: &str = "https://api.codetick.dev/api/v1/users/current/heartbeats.bulk";

/// Number of heartbeats per api request. Even when sending more
/// heartbeats, this is the number sent per individual https request.
pub const HEARTBEATS_PER_REQUEST: usize = 25;

/// Default limit of offline heartbeats to sync before exiting.
pub const DEFAULT_SYNC_OFFLINE_ACTIVITY: usize = 100;

/// Default number of seconds to wait on api requests.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

lazy_static! {
    static ref API_KEY_RE: Regex = Regex::new(
        r"(?i)^[a-f0-9]{8}-[a-f0-9]{4}-4[a-f0-9]{3}-[89ab][a-f0-9]{3}-[a-f0-9]{12}$"
    )
    .unwrap();
}

/// Fatal configuration problems. Everything else in the agent degrades
/// silently; these are the only errors surfaced to the user.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not parse config file: {0}")]
    Parse(String),
    #[error("missing api key; find yours at codetick.dev/settings/api-key")]
    MissingApiKey,
    #[error("invalid api key; find yours at codetick.dev/settings/api-key")]
    InvalidApiKey,
}

impl ConfigError {
    /// The process exit code for this configuration error.
    pub fn exit_code(&self) -> i32 {
        match self {
            ConfigError::Parse(_) => CONFIG_FILE_PARSE_ERROR,
            ConfigError::MissingApiKey | ConfigError::InvalidApiKey => AUTH_ERROR,
        }
    }
}

/// A config value that is either a boolean toggle or a list of regex
/// patterns. `true` means "always" and is normalized to `[".*"]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BoolOrPatterns {
    Flag(bool),
    Patterns(Vec<String>),
}

impl BoolOrPatterns {
    fn into_patterns(self) -> Vec<String> {
        match self {
            BoolOrPatterns::Flag(true) => vec![".*".to_string()],
            BoolOrPatterns::Flag(false) => Vec::new(),
            BoolOrPatterns::Patterns(p) => p,
        }
    }
}

/// The sync amount is either an integer or the word "none".
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum SyncAmount {
    Count(usize),
    Word(String),
}

/// On-disk layout of `~/.codetick.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    settings: FileSettings,
    /// Maps path prefixes to project names, consulted before revision
    /// control probes.
    #[serde(default)]
    projectmap: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileSettings {
    api_key: Option<String>,
    api_url: Option<String>,
    hostname: Option<String>,
    timeout: Option<u64>,
    offline: Option<bool>,
    #[serde(default)]
    exclude: Vec<String>,
    /// Older name for `exclude`, still honored.
    #[serde(default)]
    ignore: Vec<String>,
    #[serde(default)]
    include: Vec<String>,
    exclude_unknown_project: Option<bool>,
    include_only_with_project_file: Option<bool>,
    hide_file_names: Option<BoolOrPatterns>,
    hide_project_names: Option<BoolOrPatterns>,
    hide_branch_names: Option<BoolOrPatterns>,
    sync_offline_activity: Option<SyncAmount>,
    debug: Option<bool>,
    log_file: Option<PathBuf>,
}

/// Merged runtime settings for one invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: String,
    pub api_url: String,
    pub plugin: Option<String>,
    pub hostname: Option<String>,
    pub timeout: Duration,
    pub offline: bool,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub include_only_with_project_file: bool,
    pub exclude_unknown_project: bool,
    pub hide_file_names: Vec<String>,
    pub hide_project_names: Vec<String>,
    /// `None` means unset: branch hiding follows filename/project hiding.
    /// `Some(empty)` means explicitly disabled.
    pub hide_branch_names: Option<Vec<String>>,
    pub project: Option<String>,
    pub alternate_project: Option<String>,
    pub sync_offline_activity: usize,
    /// Lowercased path prefix -> project name, longest prefix wins.
    pub project_map: Vec<(String, String)>,
    pub verbose: bool,
    pub log_file: PathBuf,
    pub db_file: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        let home = home_dir();
        Settings {
            api_key: String::new(),
            api_url: DEFAULT_API_URL.to_string(),
            plugin: None,
            hostname: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            offline: true,
            include: Vec::new(),
            exclude: Vec::new(),
            include_only_with_project_file: false,
            exclude_unknown_project: false,
            hide_file_names: Vec::new(),
            hide_project_names: Vec::new(),
            hide_branch_names: None,
            project: None,
            alternate_project: None,
            sync_offline_activity: DEFAULT_SYNC_OFFLINE_ACTIVITY,
            project_map: Vec::new(),
            verbose: false,
            log_file: home.join(".codetick.log"),
            db_file: home.join(".codetick.db"),
        }
    }
}

impl Settings {
    /// Merge command-line arguments with the config file.
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let home = home_dir();
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| home.join(".codetick.toml"));

        let file = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::Parse(e.to_string()))?;
            toml::from_str::<ConfigFile>(&content)
                .map_err(|e| ConfigError::Parse(e.to_string()))?
        } else {
            ConfigFile::default()
        };

        let api_key = cli
            .key
            .clone()
            .or_else(|| file.settings.api_key.clone())
            .ok_or(ConfigError::MissingApiKey)?;
        if !API_KEY_RE.is_match(&api_key) {
            return Err(ConfigError::InvalidApiKey);
        }

        let mut exclude = cli.exclude.clone();
        exclude.extend(file.settings.ignore.iter().cloned());
        exclude.extend(file.settings.exclude.iter().cloned());
        let mut include = cli.include.clone();
        include.extend(file.settings.include.iter().cloned());

        let sync_offline_activity = match (&cli.sync_offline_activity, &file.settings.sync_offline_activity) {
            (Some(arg), _) => parse_sync_amount(arg)?,
            (None, Some(SyncAmount::Count(n))) => *n,
            (None, Some(SyncAmount::Word(w))) => parse_sync_amount(w)?,
            (None, None) => DEFAULT_SYNC_OFFLINE_ACTIVITY,
        };

        let mut project_map: Vec<(String, String)> = file
            .projectmap
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v.clone()))
            .collect();
        // Longest prefix first so the most specific mapping wins.
        project_map.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        Ok(Settings {
            api_key,
            api_url: cli
                .api_url
                .clone()
                .or_else(|| file.settings.api_url.clone())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            plugin: cli.plugin.clone(),
            hostname: cli.hostname.clone().or_else(|| file.settings.hostname.clone()),
            timeout: Duration::from_secs(
                cli.timeout
                    .or(file.settings.timeout)
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            offline: !cli.disable_offline && file.settings.offline.unwrap_or(true),
            include,
            exclude,
            include_only_with_project_file: cli.include_only_with_project_file
                || file.settings.include_only_with_project_file.unwrap_or(false),
            exclude_unknown_project: cli.exclude_unknown_project
                || file.settings.exclude_unknown_project.unwrap_or(false),
            hide_file_names: merge_hide(cli.hide_file_names, file.settings.hide_file_names.clone())
                .unwrap_or_default(),
            hide_project_names: merge_hide(
                cli.hide_project_names,
                file.settings.hide_project_names.clone(),
            )
            .unwrap_or_default(),
            hide_branch_names: merge_hide(
                cli.hide_branch_names,
                file.settings.hide_branch_names.clone(),
            ),
            project: cli.project.clone(),
            alternate_project: cli.alternate_project.clone(),
            sync_offline_activity,
            project_map,
            verbose: cli.verbose || file.settings.debug.unwrap_or(false),
            log_file: cli
                .log_file
                .clone()
                .or_else(|| file.settings.log_file.clone())
                .unwrap_or_else(|| home.join(".codetick.log")),
            db_file: home.join(".codetick.db"),
        })
    }
}

/// Merge a command-line toggle with a config file bool-or-patterns value.
///
/// `None` means the setting was never mentioned anywhere.
fn merge_hide(cli_flag: bool, file_value: Option<BoolOrPatterns>) -> Option<Vec<String>> {
    if cli_flag {
        return Some(vec![".*".to_string()]);
    }
    file_value.map(BoolOrPatterns::into_patterns)
}

fn parse_sync_amount(raw: &str) -> Result<usize, ConfigError> {
    if raw.trim().eq_ignore_ascii_case("none") {
        return Ok(0);
    }
    raw.trim().parse::<usize>().map_err(|_| {
        ConfigError::Parse(format!(
            "sync_offline_activity must be \"none\" or a positive integer, got {:?}",
            raw
        ))
    })
}

/// The directory holding the agent's config, log, and database files.
///
/// `CODETICK_HOME` overrides the real home directory, mainly for tests and
/// sandboxed editor installs.
pub fn home_dir() -> PathBuf {
    if let Ok(home) = std::env::var("CODETICK_HOME") {
        if !home.trim().is_empty() {
            return PathBuf::from(home);
        }
    }
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}
