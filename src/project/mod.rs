//! Project and branch detection for a heartbeat's entity.
//!
//! Probe order: the `.codetick-project` marker file, the `[projectmap]`
//! config table, the explicit `--project` argument, revision control
//! folders (git, then mercurial), and finally `--alternate-project`.
//! Probes fill the project name and branch independently; all probe I/O
//! errors degrade to "not found".

pub mod git;
pub mod mercurial;
pub mod projectfile;

use std::path::{Path, PathBuf};

use crate::config::Settings;

/// Name of the per-directory file pinning an explicit project (first
/// line) and branch (second line).
pub const PROJECT_MARKER_FILE: &str = ".codetick-project";

/// What a probe found. `folder` is the detected project root, used later
/// when a project codename needs to be persisted.
#[derive(Debug, Clone, Default)]
pub struct ProjectInfo {
    pub name: Option<String>,
    pub branch: Option<String>,
    pub folder: Option<PathBuf>,
}

/// Find the project and branch for an entity.
pub fn resolve(
    entity: &str,
    entity_type: &str,
    raw_project: Option<&str>,
    raw_alternate: Option<&str>,
    settings: &Settings,
) -> ProjectInfo {
    if entity_type != "file" {
        let name = raw_project
            .map(str::to_string)
            .or_else(|| settings.project.clone())
            .or_else(|| raw_alternate.map(str::to_string))
            .or_else(|| settings.alternate_project.clone());
        return ProjectInfo {
            name,
            branch: None,
            folder: None,
        };
    }

    let path = Path::new(entity);
    let mut info = ProjectInfo::default();

    if let Some(found) = projectfile::probe(path) {
        info = found;
    }

    if info.name.is_none() {
        info.name = from_project_map(entity, settings);
    }

    if info.name.is_none() {
        info.name = raw_project
            .map(str::to_string)
            .or_else(|| settings.project.clone());
    }

    if info.name.is_none() || info.branch.is_none() {
        let vcs = git::probe(path).or_else(|| mercurial::probe(path));
        if let Some(found) = vcs {
            if info.name.is_none() {
                info.name = found.name;
            }
            if info.branch.is_none() {
                info.branch = found.branch;
            }
            if info.folder.is_none() {
                info.folder = found.folder;
            }
        }
    }

    if info.name.is_none() {
        info.name = raw_alternate
            .map(str::to_string)
            .or_else(|| settings.alternate_project.clone());
    }

    info
}

/// Longest-prefix match of the lowercased entity path against the
/// `[projectmap]` config table.
fn from_project_map(entity: &str, settings: &Settings) -> Option<String> {
    let lowered = entity.to_lowercase();
    settings
        .project_map
        .iter()
        .find(|(prefix, _)| lowered.starts_with(prefix.as_str()))
        .map(|(_, name)| name.clone())
}

/// Walk up from a path looking for the project marker file.
pub fn find_project_file(path: &Path) -> Option<PathBuf> {
    let start = if path.is_file() { path.parent()? } else { path };
    let mut dir = Some(start);
    while let Some(current) = dir {
        let marker = current.join(PROJECT_MARKER_FILE);
        if marker.is_file() {
            return Some(marker);
        }
        dir = current.parent();
    }
    None
}

const ADJECTIVES: &[&str] = &[
    "Ancient", "Billowing", "Bitter", "Bold", "Broken", "Crimson", "Damp", "Divine", "Falling",
    "Fragrant", "Frosty", "Hidden", "Lingering", "Misty", "Nameless", "Patient", "Polished",
    "Restless", "Shy", "Silent", "Snowy", "Twilight", "Wandering", "Withered",
];

const NOUNS: &[&str] = &[
    "Breeze", "Brook", "Butterfly", "Cherry", "Darkness", "Dew", "Feather", "Firefly", "Glade",
    "Haze", "Meadow", "Moon", "Morning", "Paper", "Pine", "Resonance", "Shadow", "Silence",
    "Smoke", "Sound", "Thunder", "Violet", "Waterfall", "Wildflower",
];

/// Generate a random project codename like "Silent Waterfall 42".
pub fn generate_project_name() -> String {
    let bytes = *uuid::Uuid::new_v4().as_bytes();
    format!(
        "{} {} {}{}",
        ADJECTIVES[bytes[0] as usize % ADJECTIVES.len()],
        NOUNS[bytes[1] as usize % NOUNS.len()],
        bytes[2] % 10,
        bytes[3] % 10,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_generate_project_name_shape() {
        let name = generate_project_name();
        let parts: Vec<&str> = name.split(' ').collect();
        assert_eq!(parts.len(), 3);
        assert!(ADJECTIVES.contains(&parts[0]));
        assert!(NOUNS.contains(&parts[1]));
        assert_eq!(parts[2].len(), 2);
        assert!(parts[2].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_find_project_file_walks_up() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("a/b/c");
        fs::create_dir_all(&nested).unwrap();
        fs::write(temp.path().join(PROJECT_MARKER_FILE), "My Project\n").unwrap();
        let file = nested.join("main.rs");
        fs::write(&file, "").unwrap();

        let marker = find_project_file(&file).unwrap();
        assert_eq!(marker, temp.path().join(PROJECT_MARKER_FILE));
    }

    #[test]
    fn test_find_project_file_missing() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("main.rs");
        fs::write(&file, "").unwrap();
        // may still find a marker above the tempdir in rare setups, so
        // only assert it is not inside the tempdir
        if let Some(marker) = find_project_file(&file) {
            assert!(!marker.starts_with(temp.path()));
        }
    }

    #[test]
    fn test_project_map_longest_prefix() {
        let settings = Settings {
            project_map: vec![
                ("/home/me/work/client".to_string(), "Client".to_string()),
                ("/home/me/work".to_string(), "Work".to_string()),
            ],
            ..Default::default()
        };
        assert_eq!(
            from_project_map("/home/me/work/client/app.py", &settings),
            Some("Client".to_string())
        );
        assert_eq!(
            from_project_map("/home/me/work/other/app.py", &settings),
            Some("Work".to_string())
        );
        assert_eq!(from_project_map("/elsewhere/app.py", &settings), None);
    }

    #[test]
    fn test_resolve_marker_beats_git() {
        let temp = TempDir::new().unwrap();
        let repo = temp.path().join("repo");
        fs::create_dir_all(repo.join(".git")).unwrap();
        fs::write(repo.join(".git/config"), "[core]\n").unwrap();
        fs::write(repo.join(".git/HEAD"), "ref: refs/heads/main\n").unwrap();
        fs::write(repo.join(PROJECT_MARKER_FILE), "Pinned Name\n").unwrap();
        let file = repo.join("src.py");
        fs::write(&file, "").unwrap();

        let settings = Settings::default();
        let info = resolve(file.to_str().unwrap(), "file", None, None, &settings);
        assert_eq!(info.name.as_deref(), Some("Pinned Name"));
        // branch comes from git since the marker has no second line
        assert_eq!(info.branch.as_deref(), Some("main"));
    }

    #[test]
    fn test_resolve_non_file_uses_args_only() {
        let settings = Settings {
            alternate_project: Some("Fallback".to_string()),
            ..Default::default()
        };
        let info = resolve("codetick.dev", "domain", None, None, &settings);
        assert_eq!(info.name.as_deref(), Some("Fallback"));
        assert!(info.branch.is_none());
    }

    #[test]
    fn test_resolve_alternate_project_is_last() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("lonely.py");
        fs::write(&file, "").unwrap();

        let settings = Settings::default();
        let info = resolve(
            file.to_str().unwrap(),
            "file",
            None,
            Some("Alternate"),
            &settings,
        );
        assert_eq!(info.name.as_deref(), Some("Alternate"));
    }
}
