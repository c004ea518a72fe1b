//! Project information from a `.codetick-project` marker file.
//!
//! The first line sets the project name, the optional second line sets
//! the branch name.

use std::path::Path;

use super::{find_project_file, ProjectInfo};

/// Look for a marker file above the entity.
pub fn probe(path: &Path) -> Option<ProjectInfo> {
    let marker = find_project_file(path)?;
    let content = std::fs::read_to_string(&marker).unwrap_or_default();
    let mut lines = content.lines();

    let name = lines
        .next()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string);
    let branch = lines
        .next()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string);

    Some(ProjectInfo {
        name,
        branch,
        folder: marker.parent().map(Path::to_path_buf),
    })
}
