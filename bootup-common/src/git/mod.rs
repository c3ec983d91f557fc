//! Git collaborator used by the upgrade workflow.
//!
//! [`GitClient`] is the seam between the workflow and git itself. [`CliGit`]
//! shells out to the `git` binary; [`MockGit`] is a scripted in-memory model
//! for deterministic tests.

mod cli;
mod mock;

pub use cli::CliGit;
pub use mock::{GitCall, MockGit};

use crate::errors::ErrorCode;
use crate::types::CommitRecord;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Fragment git prints when asked to cherry-pick a merge commit without `-m`.
pub const MERGE_COMMIT_MARKER: &str = "is a merge but no -m option was given";

/// Remote-tracking namespace that boot configuration history is fetched into.
pub const HISTORY_NAMESPACE: &str = "refs/remotes/boot-config";

/// Why a single cherry-pick did not apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CherryPickFailure {
    /// The commit has several parents and needs an explicit mainline.
    MergeCommit,
    /// Anything else: conflicts, missing objects, a dirty tree.
    Other { detail: String },
}

impl CherryPickFailure {
    /// Classify cherry-pick stderr.
    pub fn classify(stderr: &str) -> Self {
        if stderr.contains(MERGE_COMMIT_MARKER) {
            Self::MergeCommit
        } else {
            Self::Other {
                detail: stderr.trim().to_string(),
            }
        }
    }
}

impl fmt::Display for CherryPickFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MergeCommit => write!(f, "commit {}", MERGE_COMMIT_MARKER),
            Self::Other { detail } => f.write_str(detail),
        }
    }
}

#[derive(Debug, Error)]
pub enum GitError {
    #[error("git executable not found on PATH")]
    NotInstalled,

    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {}: {stderr}", status.map_or_else(|| "signal".to_string(), |c| format!("status {}", c)))]
    CommandFailed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("failed to clone {url}: {stderr}")]
    CloneFailed { url: String, stderr: String },

    #[error("repository at {dir} has no remote named '{remote}'")]
    RemoteMissing { dir: String, remote: String },

    #[error("cherry-pick of {sha} failed: {failure}")]
    CherryPick {
        sha: String,
        failure: CherryPickFailure,
    },

    #[error("nothing to commit")]
    NothingToCommit,
}

impl GitError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInstalled => ErrorCode::GitNotInstalled,
            Self::Spawn { .. } | Self::CommandFailed { .. } | Self::NothingToCommit => {
                ErrorCode::GitCommandFailed
            }
            Self::CloneFailed { .. } => ErrorCode::GitCloneFailed,
            Self::RemoteMissing { .. } => ErrorCode::GitRemoteMissing,
            Self::CherryPick { .. } => ErrorCode::ReplayCherryPickFailed,
        }
    }

    /// True for the benign "nothing to commit" outcome.
    pub fn is_nothing_to_commit(&self) -> bool {
        matches!(self, Self::NothingToCommit)
    }
}

/// Git operations the upgrade workflow needs.
///
/// Every method blocks until git finishes. Paths passed as `dir` are working
/// trees or bare repositories that the caller owns for the whole call.
pub trait GitClient: Send + Sync {
    /// Clone `url` with a working tree into `dest`.
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), GitError>;

    /// Clone `url` without a working tree into `dest`.
    fn clone_bare(&self, url: &str, dest: &Path) -> Result<(), GitError>;

    /// Resolve a branch, tag or sha to a commit sha; `None` when the ref
    /// does not exist.
    fn commit_for_ref(&self, dir: &Path, git_ref: &str) -> Result<Option<String>, GitError>;

    /// Contents of `path` as of `git_ref`; `None` when the file is absent.
    fn read_file_at(
        &self,
        dir: &Path,
        git_ref: &str,
        path: &str,
    ) -> Result<Option<String>, GitError>;

    /// Import branches and tags of the repository at `source` under
    /// [`HISTORY_NAMESPACE`] so its commits can be cherry-picked into `dir`.
    fn fetch_history(&self, dir: &Path, source: &Path) -> Result<(), GitError>;

    /// URL of the `origin` remote.
    fn remote_url(&self, dir: &Path) -> Result<String, GitError>;

    /// Push `local_branch` to `origin` as `remote_branch`.
    fn push_branch(
        &self,
        dir: &Path,
        local_branch: &str,
        remote_branch: &str,
        force: bool,
    ) -> Result<(), GitError>;

    /// Commits reachable from `to` but not from `from`, newest first.
    fn list_commits(&self, dir: &Path, from: &str, to: &str)
    -> Result<Vec<CommitRecord>, GitError>;

    /// Apply one commit onto the current branch, preferring the incoming side
    /// on conflicting hunks.
    fn cherry_pick(&self, dir: &Path, sha: &str) -> Result<(), GitError>;

    /// Overwrite `paths` in the working tree and index with their content at
    /// `git_ref`.
    fn checkout_paths(&self, dir: &Path, git_ref: &str, paths: &[&str]) -> Result<(), GitError>;

    /// Stage and commit `paths`. Returns [`GitError::NothingToCommit`] when
    /// they carry no changes.
    fn commit_files(&self, dir: &Path, message: &str, paths: &[&str]) -> Result<(), GitError>;

    fn current_branch(&self, dir: &Path) -> Result<String, GitError>;

    /// Create `name` at HEAD and switch to it.
    fn create_branch(&self, dir: &Path, name: &str) -> Result<(), GitError>;

    fn checkout(&self, dir: &Path, name: &str) -> Result<(), GitError>;

    /// Force-delete a local branch that is not checked out.
    fn delete_branch(&self, dir: &Path, name: &str) -> Result<(), GitError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_merge_commit_stderr() {
        let stderr = "error: commit 1a2b3c is a merge but no -m option was given.\n\
                      fatal: cherry-pick failed\n";
        assert_eq!(CherryPickFailure::classify(stderr), CherryPickFailure::MergeCommit);
    }

    #[test]
    fn classify_conflict_stderr() {
        let failure = CherryPickFailure::classify("error: could not apply 1a2b3c... feat\n");
        assert_eq!(
            failure,
            CherryPickFailure::Other {
                detail: "error: could not apply 1a2b3c... feat".to_string()
            }
        );
    }

    #[test]
    fn error_codes() {
        assert_eq!(GitError::NotInstalled.error_code(), ErrorCode::GitNotInstalled);
        assert_eq!(
            GitError::CherryPick {
                sha: "abc".into(),
                failure: CherryPickFailure::MergeCommit
            }
            .error_code(),
            ErrorCode::ReplayCherryPickFailed
        );
        assert!(GitError::NothingToCommit.is_nothing_to_commit());
    }

    #[test]
    fn command_failed_display_includes_status() {
        let err = GitError::CommandFailed {
            command: "git checkout nope".into(),
            status: Some(1),
            stderr: "error: pathspec 'nope' did not match".into(),
        };
        assert_eq!(
            err.to_string(),
            "`git checkout nope` exited with status 1: error: pathspec 'nope' did not match"
        );
    }
}
