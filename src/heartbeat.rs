//! The heartbeat record: validation, enrichment, and sanitization.
//!
//! A heartbeat is built once per activity event. Construction either
//! finalizes the record or rejects it with a human-readable skip reason;
//! skips are normal outcomes and never fail the process. A finalized
//! heartbeat is immutable; `sanitize` returns a redacted copy and never
//! mutates in place.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cli::Cli;
use crate::config::Settings;
use crate::project::{self, PROJECT_MARKER_FILE};
use crate::stats::{self, StatsRequest};

/// Activity categories accepted by the api; anything else is dropped and
/// the api falls back to "coding".
pub const CATEGORIES: &[&str] = &[
    "coding",
    "building",
    "indexing",
    "debugging",
    "running tests",
    "manual testing",
    "browsing",
    "code reviewing",
    "designing",
];

lazy_static! {
    static ref SEPARATOR_RE: Regex = Regex::new(r"[\\/]+").unwrap();
    static ref WINDOWS_DRIVE_RE: Regex = Regex::new(r"^[a-z]:/").unwrap();
}

/// Signal that a heartbeat should be dropped, with the reason.
///
/// This is a normal outcome (excluded path, nonexistent file, unknown
/// project, ambiguous language) and always maps to a successful exit.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct SkipHeartbeat(pub String);

impl SkipHeartbeat {
    pub fn new(reason: impl Into<String>) -> Self {
        SkipHeartbeat(reason.into())
    }
}

/// Raw heartbeat input, from the command line or the `--extra-heartbeats`
/// JSON stream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawHeartbeat {
    pub entity: Option<String>,
    #[serde(alias = "timestamp")]
    pub time: Option<f64>,
    #[serde(rename = "type", alias = "entity_type")]
    pub entity_type: Option<String>,
    pub category: Option<String>,
    pub is_write: Option<bool>,
    pub project: Option<String>,
    pub alternate_project: Option<String>,
    pub language: Option<String>,
    pub lineno: Option<u32>,
    pub cursorpos: Option<u32>,
    pub user_agent: Option<String>,
    pub local_file: Option<String>,
}

impl RawHeartbeat {
    /// The primary heartbeat described by the command-line arguments.
    pub fn from_cli(cli: &Cli) -> Self {
        RawHeartbeat {
            entity: cli.entity.clone(),
            time: cli.time,
            entity_type: cli.entity_type.clone(),
            category: cli.category.clone(),
            is_write: Some(cli.is_write),
            project: cli.project.clone(),
            alternate_project: cli.alternate_project.clone(),
            language: cli.language.clone().or_else(|| cli.alternate_language.clone()),
            lineno: cli.lineno,
            cursorpos: cli.cursorpos,
            user_agent: None,
            local_file: cli.local_file.clone(),
        }
    }
}

/// One finalized activity record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub time: f64,
    pub entity: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub category: Option<String>,
    pub is_write: bool,
    pub project: Option<String>,
    pub branch: Option<String>,
    pub language: Option<String>,
    pub dependencies: Option<Vec<String>>,
    pub lines: Option<u32>,
    pub lineno: Option<u32>,
    pub cursorpos: Option<u32>,
    pub user_agent: String,
    /// Detected project root, kept for persisting a project codename.
    /// Never serialized.
    #[serde(skip)]
    pub project_folder: Option<PathBuf>,
}

impl Heartbeat {
    /// Validate and enrich a raw heartbeat.
    pub fn build(raw: RawHeartbeat, settings: &Settings) -> Result<Heartbeat, SkipHeartbeat> {
        let Some(entity) = raw.entity else {
            return Err(SkipHeartbeat::new(
                "Skipping because heartbeat entity is missing.",
            ));
        };

        let entity_type = match raw.entity_type.as_deref() {
            Some("domain") => "domain",
            Some("app") => "app",
            _ => "file",
        }
        .to_string();

        let category = raw
            .category
            .filter(|c| CATEGORIES.contains(&c.as_str()));

        let mut entity = entity;
        if entity_type == "file" {
            entity = format_file_path(&entity);

            if let Some(pattern) = should_exclude(&entity, &settings.include, &settings.exclude) {
                return Err(SkipHeartbeat::new(format!(
                    "Skipping because matches exclude pattern: {}",
                    pattern
                )));
            }

            let exists = Path::new(&entity).is_file()
                || raw
                    .local_file
                    .as_deref()
                    .is_some_and(|p| Path::new(p).is_file());
            if !exists {
                return Err(SkipHeartbeat::new(
                    "File does not exist; ignoring this heartbeat.",
                ));
            }

            if settings.include_only_with_project_file
                && project::find_project_file(Path::new(&entity)).is_none()
            {
                return Err(SkipHeartbeat::new(format!(
                    "Skipping because missing {} file in parent path.",
                    PROJECT_MARKER_FILE
                )));
            }
        }

        let info = project::resolve(
            &entity,
            &entity_type,
            raw.project.as_deref(),
            raw.alternate_project.as_deref(),
            settings,
        );

        if entity_type == "file" && settings.exclude_unknown_project && info.name.is_none() {
            return Err(SkipHeartbeat::new("Skipping because project unknown."));
        }

        let file_stats = stats::file_stats(&StatsRequest {
            file_name: &entity,
            entity_type: &entity_type,
            lineno: raw.lineno,
            cursorpos: raw.cursorpos,
            plugin: settings.plugin.as_deref(),
            language: raw.language.as_deref(),
            local_file: raw.local_file.as_deref(),
        })?;

        Ok(Heartbeat {
            time: raw.time.unwrap_or_else(current_time),
            entity,
            entity_type,
            category,
            is_write: raw.is_write.unwrap_or(false),
            project: info.name,
            branch: info.branch,
            language: file_stats.language,
            dependencies: file_stats.dependencies,
            lines: file_stats.lines,
            lineno: file_stats.lineno,
            cursorpos: file_stats.cursorpos,
            user_agent: raw
                .user_agent
                .unwrap_or_else(|| user_agent(settings.plugin.as_deref())),
            project_folder: info.folder,
        })
    }

    /// The composite id keying this heartbeat in the offline queue.
    pub fn id(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}|{}",
            self.time,
            self.entity_type,
            self.category.as_deref().unwrap_or("none"),
            self.project.as_deref().unwrap_or("none"),
            self.branch.as_deref().unwrap_or("none"),
            self.entity,
            self.is_write,
        )
    }

    /// Serialize for queueing or sending.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Deserialize a queued heartbeat. Queued records were validated when
    /// first built, so this never re-runs the pipeline.
    pub fn from_json(raw: &str) -> Option<Heartbeat> {
        serde_json::from_str(raw).ok()
    }

    /// Return a redacted copy according to the obfuscation settings.
    ///
    /// The three modes are mutually exclusive with fixed precedence:
    /// filename hiding, then project hiding, then branch hiding.
    /// Sanitizing an already-sanitized heartbeat is a no-op.
    pub fn sanitize(&self, settings: &Settings) -> Heartbeat {
        let mut hb = self.clone();

        // branch hiding defaults on when another mode fires, unless
        // explicitly disabled with an empty pattern list
        let hide_branch_too = !matches!(&settings.hide_branch_names, Some(p) if p.is_empty());

        if self.entity_type == "file" && any_matches(&settings.hide_file_names, &self.entity) {
            let extension = Path::new(&self.entity)
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default();
            hb.entity = format!("HIDDEN{}", extension);
            hb.dependencies = None;
            hb.lines = None;
            hb.lineno = None;
            hb.cursorpos = None;
            if hide_branch_too {
                hb.branch = None;
            }
            return hb;
        }

        if self.entity_type == "file" && any_matches(&settings.hide_project_names, &self.entity) {
            if let Some(folder) = &self.project_folder {
                hb.project = codename_for(folder);
            }
            hb.dependencies = None;
            hb.lines = None;
            hb.lineno = None;
            hb.cursorpos = None;
            if hide_branch_too {
                hb.branch = None;
            }
            return hb;
        }

        if let Some(patterns) = &settings.hide_branch_names {
            if any_matches(patterns, &self.entity) {
                hb.branch = None;
            }
        }

        hb
    }
}

/// Read the project codename pinned in the folder's marker file, creating
/// and persisting a fresh one if none exists yet. Returns None when the
/// codename cannot be persisted, since an unpinned random name would
/// change on every heartbeat.
fn codename_for(folder: &Path) -> Option<String> {
    let marker = folder.join(PROJECT_MARKER_FILE);
    if let Ok(content) = std::fs::read_to_string(&marker) {
        if let Some(first) = content.lines().next() {
            let name = first.trim();
            if !name.is_empty() {
                return Some(name.to_string());
            }
        }
    }

    let name = project::generate_project_name();
    match std::fs::write(&marker, format!("{}\n", name)) {
        Ok(()) => Some(name),
        Err(e) => {
            tracing::debug!("could not persist project codename: {}", e);
            None
        }
    }
}

/// Check an entity against include and exclude patterns. An include match
/// always wins; the exclude pattern is only consulted when no include
/// pattern matches. Returns the matching exclude pattern.
pub fn should_exclude(entity: &str, include: &[String], exclude: &[String]) -> Option<String> {
    if entity.trim().is_empty() {
        return None;
    }
    for pattern in include {
        if let Some(re) = compile(pattern) {
            if re.is_match(entity) {
                return None;
            }
        }
    }
    for pattern in exclude {
        if let Some(re) = compile(pattern) {
            if re.is_match(entity) {
                return Some(pattern.clone());
            }
        }
    }
    None
}

fn any_matches(patterns: &[String], text: &str) -> bool {
    patterns
        .iter()
        .filter_map(|p| compile(p))
        .any(|re| re.is_match(text))
}

fn compile(pattern: &str) -> Option<Regex> {
    match regex::RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!("regex error ({}) for pattern: {}", e, pattern);
            None
        }
    }
}

/// Format a path as absolute with forward slashes and a capitalized
/// Windows drive letter.
pub fn format_file_path(path: &str) -> String {
    let p = Path::new(path);
    let absolute = p.canonicalize().unwrap_or_else(|_| {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(p))
                .unwrap_or_else(|_| p.to_path_buf())
        }
    });

    let mut formatted = SEPARATOR_RE
        .replace_all(&absolute.to_string_lossy(), "/")
        .into_owned();
    if WINDOWS_DRIVE_RE.is_match(&formatted) {
        let mut chars = formatted.chars();
        if let Some(first) = chars.next() {
            formatted = first.to_ascii_uppercase().to_string() + chars.as_str();
        }
    }
    formatted
}

/// Build the User-Agent header value.
pub fn user_agent(plugin: Option<&str>) -> String {
    format!(
        "codetick/{} ({}-{}) {}",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH,
        plugin.unwrap_or("Unknown/0"),
    )
}

fn current_time() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn test_heartbeat(entity: &str) -> Heartbeat {
        Heartbeat {
            time: 1712345678.25,
            entity: entity.to_string(),
            entity_type: "file".to_string(),
            category: Some("coding".to_string()),
            is_write: true,
            project: Some("myproject".to_string()),
            branch: Some("main".to_string()),
            language: Some("Go".to_string()),
            dependencies: Some(vec!["cobra".to_string()]),
            lines: Some(120),
            lineno: Some(7),
            cursorpos: Some(32),
            user_agent: user_agent(None),
            project_folder: None,
        }
    }

    #[test]
    fn test_build_clamps_type_and_category() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("app.py");
        fs::write(&file, "import flask\n").unwrap();

        crate::dependencies::init();
        let raw = RawHeartbeat {
            entity: Some(file.to_string_lossy().into_owned()),
            entity_type: Some("bogus".to_string()),
            category: Some("yodeling".to_string()),
            ..Default::default()
        };
        let hb = Heartbeat::build(raw, &Settings::default()).unwrap();
        assert_eq!(hb.entity_type, "file");
        assert_eq!(hb.category, None);
        assert_eq!(hb.language.as_deref(), Some("Python"));
        assert_eq!(hb.dependencies, Some(vec!["flask".to_string()]));
    }

    #[test]
    fn test_build_missing_file_skips() {
        let raw = RawHeartbeat {
            entity: Some("/definitely/not/here.py".to_string()),
            ..Default::default()
        };
        let err = Heartbeat::build(raw, &Settings::default()).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_build_exclude_pattern_skips() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("secret.py");
        fs::write(&file, "").unwrap();

        let settings = Settings {
            exclude: vec!["secret".to_string()],
            ..Default::default()
        };
        let raw = RawHeartbeat {
            entity: Some(file.to_string_lossy().into_owned()),
            ..Default::default()
        };
        let err = Heartbeat::build(raw, &settings).unwrap_err();
        assert!(err.to_string().contains("exclude pattern"));
    }

    #[test]
    fn test_include_overrides_exclude() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("secret.py");
        fs::write(&file, "").unwrap();

        crate::dependencies::init();
        let settings = Settings {
            exclude: vec!["secret".to_string()],
            include: vec!["\\.py$".to_string()],
            ..Default::default()
        };
        let raw = RawHeartbeat {
            entity: Some(file.to_string_lossy().into_owned()),
            ..Default::default()
        };
        // matched by both include and exclude: never skipped
        assert!(Heartbeat::build(raw, &settings).is_ok());
    }

    #[test]
    fn test_build_missing_marker_skips() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("main.py");
        fs::write(&file, "").unwrap();

        let settings = Settings {
            include_only_with_project_file: true,
            ..Default::default()
        };
        let raw = RawHeartbeat {
            entity: Some(file.to_string_lossy().into_owned()),
            ..Default::default()
        };
        let err = Heartbeat::build(raw, &settings).unwrap_err();
        assert!(err.to_string().contains(PROJECT_MARKER_FILE));
    }

    #[test]
    fn test_build_unknown_project_skips() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("main.py");
        fs::write(&file, "").unwrap();

        let settings = Settings {
            exclude_unknown_project: true,
            ..Default::default()
        };
        let raw = RawHeartbeat {
            entity: Some(file.to_string_lossy().into_owned()),
            ..Default::default()
        };
        let err = Heartbeat::build(raw, &settings).unwrap_err();
        assert!(err.to_string().contains("project unknown"));
    }

    #[test]
    fn test_id_composition() {
        let hb = test_heartbeat("/projects/app/main.go");
        assert_eq!(
            hb.id(),
            "1712345678.25|file|coding|myproject|main|/projects/app/main.go|true"
        );
    }

    #[test]
    fn test_json_round_trip() {
        let hb = test_heartbeat("/projects/app/main.go");
        let parsed = Heartbeat::from_json(&hb.to_json()).unwrap();
        assert_eq!(parsed, hb);
    }

    #[test]
    fn test_json_field_names() {
        let hb = test_heartbeat("/projects/app/main.go");
        let value: serde_json::Value = serde_json::from_str(&hb.to_json()).unwrap();
        assert_eq!(value["type"], "file");
        assert_eq!(value["is_write"], true);
        // nullable fields serialize as null, not missing
        let hidden = Heartbeat {
            branch: None,
            ..hb
        };
        let value: serde_json::Value = serde_json::from_str(&hidden.to_json()).unwrap();
        assert!(value.get("branch").is_some_and(|v| v.is_null()));
    }

    #[test]
    fn test_sanitize_hidden_filename() {
        let hb = test_heartbeat("/projects/app/main.go");
        let settings = Settings {
            hide_file_names: vec![".*".to_string()],
            ..Default::default()
        };
        let sanitized = hb.sanitize(&settings);

        assert_eq!(sanitized.entity, "HIDDEN.go");
        assert_eq!(sanitized.dependencies, None);
        assert_eq!(sanitized.lines, None);
        assert_eq!(sanitized.lineno, None);
        assert_eq!(sanitized.cursorpos, None);
        assert_eq!(sanitized.branch, None);
        // untouched fields survive
        assert_eq!(sanitized.project.as_deref(), Some("myproject"));
        assert_eq!(sanitized.language.as_deref(), Some("Go"));
        // the original is never mutated
        assert_eq!(hb.entity, "/projects/app/main.go");
    }

    #[test]
    fn test_sanitize_branch_hiding_explicitly_disabled() {
        let hb = test_heartbeat("/projects/app/main.go");
        let settings = Settings {
            hide_file_names: vec![".*".to_string()],
            hide_branch_names: Some(Vec::new()),
            ..Default::default()
        };
        let sanitized = hb.sanitize(&settings);
        assert_eq!(sanitized.entity, "HIDDEN.go");
        assert_eq!(sanitized.branch.as_deref(), Some("main"));
    }

    #[test]
    fn test_sanitize_branch_only() {
        let hb = test_heartbeat("/projects/app/main.go");
        let settings = Settings {
            hide_branch_names: Some(vec![".*".to_string()]),
            ..Default::default()
        };
        let sanitized = hb.sanitize(&settings);
        assert_eq!(sanitized.branch, None);
        // everything else intact
        assert_eq!(sanitized.entity, "/projects/app/main.go");
        assert_eq!(sanitized.dependencies, Some(vec!["cobra".to_string()]));
    }

    #[test]
    fn test_sanitize_noop_without_settings() {
        let hb = test_heartbeat("/projects/app/main.go");
        assert_eq!(hb.sanitize(&Settings::default()), hb);
    }

    #[test]
    fn test_sanitize_idempotent() {
        let hb = test_heartbeat("/projects/app/main.go");
        let settings = Settings {
            hide_file_names: vec![".*".to_string()],
            ..Default::default()
        };
        let once = hb.sanitize(&settings);
        let twice = once.sanitize(&settings);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_sanitize_hidden_project_persists_codename() {
        let temp = TempDir::new().unwrap();
        let mut hb = test_heartbeat("/projects/app/main.go");
        hb.project_folder = Some(temp.path().to_path_buf());

        let settings = Settings {
            hide_project_names: vec![".*".to_string()],
            ..Default::default()
        };
        let sanitized = hb.sanitize(&settings);

        let codename = sanitized.project.clone().unwrap();
        assert_ne!(codename, "myproject");
        // entity itself is unchanged in project-hiding mode
        assert_eq!(sanitized.entity, "/projects/app/main.go");
        assert_eq!(sanitized.dependencies, None);
        // the marker file pins the codename for later invocations
        let marker = temp.path().join(PROJECT_MARKER_FILE);
        let pinned = fs::read_to_string(marker).unwrap();
        assert_eq!(pinned.trim(), codename);

        // idempotent thanks to the marker
        let twice = sanitized.sanitize(&settings);
        assert_eq!(twice.project.as_deref(), Some(codename.as_str()));
        assert_eq!(sanitized, twice);
    }

    #[test]
    fn test_sanitize_filename_beats_project() {
        let temp = TempDir::new().unwrap();
        let mut hb = test_heartbeat("/projects/app/main.go");
        hb.project_folder = Some(temp.path().to_path_buf());

        let settings = Settings {
            hide_file_names: vec![".*".to_string()],
            hide_project_names: vec![".*".to_string()],
            ..Default::default()
        };
        let sanitized = hb.sanitize(&settings);
        assert_eq!(sanitized.entity, "HIDDEN.go");
        // project mode did not run: no marker was written
        assert!(!temp.path().join(PROJECT_MARKER_FILE).exists());
        assert_eq!(sanitized.project.as_deref(), Some("myproject"));
    }

    #[test]
    fn test_should_exclude_reports_pattern() {
        let exclude = vec!["^/tmp/".to_string(), "\\.log$".to_string()];
        assert_eq!(
            should_exclude("/tmp/scratch.py", &[], &exclude),
            Some("^/tmp/".to_string())
        );
        assert_eq!(should_exclude("/home/me/app.py", &[], &exclude), None);
    }

    #[test]
    fn test_should_exclude_invalid_pattern_ignored() {
        let exclude = vec!["[unclosed".to_string()];
        assert_eq!(should_exclude("/any/file.py", &[], &exclude), None);
    }

    #[test]
    fn test_format_file_path_separators() {
        let formatted = format_file_path("/a\\b\\c.py");
        assert!(!formatted.contains('\\'));
        assert!(formatted.starts_with('/'));

        // duplicate separators collapse
        assert_eq!(format_file_path("/a//b///c.py"), "/a/b/c.py");

        // relative paths become absolute
        assert!(Path::new(&format_file_path("relative.py")).is_absolute());
    }

    #[test]
    fn test_user_agent_shape() {
        let ua = user_agent(Some("emacs/29 emacs-codetick/1.0"));
        assert!(ua.starts_with("codetick/"));
        assert!(ua.ends_with("emacs/29 emacs-codetick/1.0"));
        assert!(user_agent(None).ends_with("Unknown/0"));
    }
}
