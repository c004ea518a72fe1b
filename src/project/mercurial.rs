//! Information about the mercurial project for a given file.

use std::path::Path;

use super::ProjectInfo;

/// Walk up from the entity looking for a `.hg` directory.
pub fn probe(path: &Path) -> Option<ProjectInfo> {
    let start = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let start = if start.is_file() {
        start.parent()?.to_path_buf()
    } else {
        start
    };

    let mut dir: Option<&Path> = Some(&start);
    while let Some(current) = dir {
        let config_dir = current.join(".hg");
        if config_dir.is_dir() {
            return Some(ProjectInfo {
                name: current.file_name().map(|n| n.to_string_lossy().into_owned()),
                branch: Some(branch(&config_dir)),
                folder: Some(current.to_path_buf()),
            });
        }
        dir = current.parent();
    }
    None
}

/// The current branch, defaulting to "default" like hg itself.
fn branch(config_dir: &Path) -> String {
    std::fs::read_to_string(config_dir.join("branch"))
        .ok()
        .and_then(|content| {
            content
                .lines()
                .next()
                .map(|l| l.trim().rsplit('/').next().unwrap_or(l).to_string())
        })
        .filter(|b| !b.is_empty())
        .unwrap_or_else(|| "default".to_string())
}
