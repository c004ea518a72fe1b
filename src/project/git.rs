//! Information about the git project for a given file.
//!
//! Reads repository metadata directly from disk: `.git/config` marks a
//! repository root, `HEAD` supplies the branch, and `.git` link files are
//! followed for worktrees and submodules.

use std::path::{Path, PathBuf};

use super::ProjectInfo;

/// Walk up from the entity looking for a git repository.
pub fn probe(path: &Path) -> Option<ProjectInfo> {
    let start = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let start = if start.is_file() {
        start.parent()?.to_path_buf()
    } else {
        start
    };

    let mut dir: Option<&Path> = Some(&start);
    while let Some(current) = dir {
        if current.join(".git").join("config").is_file() {
            return Some(ProjectInfo {
                name: dir_name(current),
                branch: branch_from_head(&current.join(".git").join("HEAD")),
                folder: Some(current.to_path_buf()),
            });
        }

        if let Some(link) = gitdir_link(current) {
            if is_worktree(&link) {
                return Some(ProjectInfo {
                    name: project_from_worktree(&link),
                    branch: branch_from_head(&link.join("HEAD")),
                    folder: Some(current.to_path_buf()),
                });
            }
            // a submodule keeps its own folder name
            return Some(ProjectInfo {
                name: dir_name(current),
                branch: branch_from_head(&link.join("HEAD")),
                folder: Some(current.to_path_buf()),
            });
        }

        dir = current.parent();
    }
    None
}

fn dir_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

/// Extract the branch from a `HEAD` file. A missing or unreadable file
/// defaults to "master"; a detached head yields no branch.
fn branch_from_head(head: &Path) -> Option<String> {
    match first_line(head) {
        None => Some("master".to_string()),
        Some(line) => line
            .strip_prefix("ref: ")
            .and_then(|r| r.trim().rsplit('/').next().map(str::to_string)),
    }
}

/// Follow a `.git` link file containing `gitdir: <path>`. Returns the
/// linked directory when it holds a `HEAD` file.
fn gitdir_link(dir: &Path) -> Option<PathBuf> {
    let link = dir.join(".git");
    if !link.is_file() {
        return None;
    }
    let line = first_line(&link)?;
    let subpath = line.strip_prefix("gitdir: ")?.trim();
    let target = dir.join(subpath);
    if target.join("HEAD").is_file() {
        target.canonicalize().ok()
    } else {
        None
    }
}

fn is_worktree(link: &Path) -> bool {
    link.parent()
        .and_then(Path::file_name)
        .is_some_and(|n| n == "worktrees")
}

/// For a worktree, recover the main repository's folder name via the
/// `commondir` file.
fn project_from_worktree(link: &Path) -> Option<String> {
    let line = first_line(&link.join("commondir"))?;
    let gitdir = link.join(line.trim());
    let gitdir = gitdir.canonicalize().unwrap_or(gitdir);
    if gitdir.file_name().is_some_and(|n| n == ".git") {
        gitdir.parent().and_then(dir_name)
    } else {
        None
    }
}

fn first_line(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    content.lines().next().map(|l| l.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn make_repo(root: &Path, branch: &str) {
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join(".git/config"), "[core]\n").unwrap();
        fs::write(
            root.join(".git/HEAD"),
            format!("ref: refs/heads/{}\n", branch),
        )
        .unwrap();
    }

    #[test]
    fn test_repository_root() {
        let temp = TempDir::new().unwrap();
        let repo = temp.path().join("myproject");
        make_repo(&repo, "main");
        let nested = repo.join("src/deep");
        fs::create_dir_all(&nested).unwrap();
        let file = nested.join("main.rs");
        fs::write(&file, "").unwrap();

        let info = probe(&file).unwrap();
        assert_eq!(info.name.as_deref(), Some("myproject"));
        assert_eq!(info.branch.as_deref(), Some("main"));
        assert!(info.folder.is_some());
    }

    #[test]
    fn test_branch_with_slashes_keeps_last_segment() {
        let temp = TempDir::new().unwrap();
        let repo = temp.path().join("proj");
        make_repo(&repo, "feature/offline-queue");
        let file = repo.join("lib.rs");
        fs::write(&file, "").unwrap();

        let info = probe(&file).unwrap();
        assert_eq!(info.branch.as_deref(), Some("offline-queue"));
    }

    #[test]
    fn test_detached_head_has_no_branch() {
        let temp = TempDir::new().unwrap();
        let repo = temp.path().join("proj");
        make_repo(&repo, "main");
        fs::write(
            repo.join(".git/HEAD"),
            "4f2b1c8de9157ab12cd3456789abcdef01234567\n",
        )
        .unwrap();
        let file = repo.join("lib.rs");
        fs::write(&file, "").unwrap();

        let info = probe(&file).unwrap();
        assert_eq!(info.name.as_deref(), Some("proj"));
        assert!(info.branch.is_none());
    }

    #[test]
    fn test_submodule_uses_own_folder_name() {
        let temp = TempDir::new().unwrap();
        let parent = temp.path().join("parent");
        make_repo(&parent, "main");
        let modules = parent.join(".git/modules/child");
        fs::create_dir_all(&modules).unwrap();
        fs::write(modules.join("HEAD"), "ref: refs/heads/develop\n").unwrap();

        let child = parent.join("child");
        fs::create_dir_all(&child).unwrap();
        fs::write(child.join(".git"), "gitdir: ../.git/modules/child\n").unwrap();
        let file = child.join("mod.rs");
        fs::write(&file, "").unwrap();

        let info = probe(&file).unwrap();
        assert_eq!(info.name.as_deref(), Some("child"));
        assert_eq!(info.branch.as_deref(), Some("develop"));
    }

    #[test]
    fn test_no_repository() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("orphan.rs");
        fs::write(&file, "").unwrap();
        // a tempdir is not normally inside a git repo; tolerate the rare
        // case where it is by only requiring no crash
        let _ = probe(&file);
    }
}
