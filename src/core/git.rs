//! Git workspace operations.
//!
//! The pipeline's first step resolves the repository the run operates on:
//! its root directory, current branch, and head commit.

use crate::core::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// The Git repository a run operates on.
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Root directory of the repository (where .git is).
    root: PathBuf,
}

impl Workspace {
    /// Discovers the workspace from the current directory.
    pub fn discover() -> Result<Self> {
        Self::discover_from(&std::env::current_dir().map_err(|e| Error::io("get current dir", e))?)
    }

    /// Discovers the workspace from a specific path.
    pub fn discover_from(path: &Path) -> Result<Self> {
        let output = Command::new("git")
            .args(["rev-parse", "--show-toplevel"])
            .current_dir(path)
            .output()
            .map_err(|e| Error::io("run git rev-parse", e))?;

        if !output.status.success() {
            return Err(Error::NotGitRepo);
        }

        let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if root.is_empty() {
            return Err(Error::NotGitRepo);
        }

        Ok(Self {
            root: PathBuf::from(root),
        })
    }

    /// Returns the root directory of the repository.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the current branch name.
    ///
    /// Works on a freshly initialized repository with no commits; fails on
    /// a detached HEAD, which has no branch to report.
    pub fn current_branch(&self) -> Result<String> {
        let output = Command::new("git")
            .args(["branch", "--show-current"])
            .current_dir(&self.root)
            .output()
            .map_err(|e| Error::io("get current branch", e))?;

        if !output.status.success() {
            return Err(Error::git("branch", "Failed to get current branch"));
        }

        let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if branch.is_empty() {
            return Err(Error::git("branch", "Detached HEAD has no branch"));
        }

        Ok(branch)
    }

    /// Returns the head commit hash, or None for a repository with no commits.
    pub fn head_commit(&self) -> Option<String> {
        self.rev_parse(&["HEAD"], "get head commit").ok()
    }

    fn rev_parse(&self, args: &[&str], what: &str) -> Result<String> {
        let output = Command::new("git")
            .arg("rev-parse")
            .args(args)
            .current_dir(&self.root)
            .output()
            .map_err(|e| Error::io(what, e))?;

        if !output.status.success() {
            return Err(Error::git("rev-parse", format!("Failed to {what}")));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn init_repo() -> TempDir {
        let temp = TempDir::new().expect("create temp dir");
        Command::new("git")
            .args(["init", "-b", "main"])
            .current_dir(temp.path())
            .output()
            .expect("init repo");
        temp
    }

    #[test]
    fn test_discover_from_repo() {
        let temp = init_repo();
        let ws = Workspace::discover_from(temp.path()).expect("discover");
        assert_eq!(
            ws.root().canonicalize().expect("canonicalize"),
            temp.path().canonicalize().expect("canonicalize")
        );
    }

    #[test]
    fn test_discover_from_non_repo() {
        let temp = TempDir::new().expect("create temp dir");
        let result = Workspace::discover_from(temp.path());
        assert!(matches!(result, Err(Error::NotGitRepo)));
    }

    #[test]
    fn test_current_branch() {
        let temp = init_repo();
        let ws = Workspace::discover_from(temp.path()).expect("discover");
        let branch = ws.current_branch().expect("branch");
        assert_eq!(branch, "main");
    }

    #[test]
    fn test_head_commit_empty_repo() {
        let temp = init_repo();
        let ws = Workspace::discover_from(temp.path()).expect("discover");
        // No commits yet
        assert!(ws.head_commit().is_none());
    }
}
