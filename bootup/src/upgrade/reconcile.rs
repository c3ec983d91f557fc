//! History Reconciler: replay boot configuration commits onto the working
//! branch, then restore paths that must stay fork-local.

use bootup_common::git::{CherryPickFailure, GitClient, GitError};
use bootup_common::{CommitRecord, ErrorCode};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Paths restored to their pre-upgrade content after every replay.
pub const EXCLUDED_PATHS: &[&str] = &["OWNERS"];

pub const EXCLUDE_COMMIT_MESSAGE: &str = "chore: exclude files from upgrade";

/// Failures replaying boot configuration history.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// The boot config clone's refs could not be fetched into the working repo.
    #[error("failed to import boot config history: {0}")]
    Import(#[source] GitError),

    /// The `(from, to]` range could not be listed.
    #[error("failed to list commits {from}..{to}: {source}")]
    History {
        from: String,
        to: String,
        #[source]
        source: GitError,
    },

    /// A cherry-pick failed for a reason other than a merge commit.
    #[error("failed to cherry-pick {commit}: {source}")]
    CherryPick {
        commit: CommitRecord,
        #[source]
        source: GitError,
    },

    /// Excluded paths could not be restored or committed.
    #[error("failed to restore excluded paths from {from}: {source}")]
    Exclusion {
        from: String,
        #[source]
        source: GitError,
    },
}

impl ReplayError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Import(_) | Self::History { .. } => ErrorCode::ReplayHistoryUnavailable,
            Self::CherryPick { .. } => ErrorCode::ReplayCherryPickFailed,
            Self::Exclusion { .. } => ErrorCode::ReplayExclusionFailed,
        }
    }
}

/// What a successful reconciliation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub applied: Vec<CommitRecord>,
    /// Merge commits that need an explicit mainline and were left out.
    pub skipped: Vec<CommitRecord>,
    /// False when restoring the excluded paths produced no diff.
    pub exclusions_committed: bool,
}

pub struct HistoryReconciler<'a> {
    git: &'a dyn GitClient,
    excluded: &'a [&'a str],
}

impl<'a> HistoryReconciler<'a> {
    pub fn new(git: &'a dyn GitClient) -> Self {
        Self::with_excluded(git, EXCLUDED_PATHS)
    }

    pub fn with_excluded(git: &'a dyn GitClient, excluded: &'a [&'a str]) -> Self {
        Self { git, excluded }
    }

    /// Replay `(from, to]` from the boot config clone onto `work_dir`.
    ///
    /// A failed replay still restores the excluded paths before the error is
    /// returned. Commits applied before the failure stay in place.
    pub fn reconcile(
        &self,
        boot_config_dir: &Path,
        from: &str,
        to: &str,
        work_dir: &Path,
    ) -> Result<ReconcileReport, ReplayError> {
        self.git
            .fetch_history(work_dir, boot_config_dir)
            .map_err(ReplayError::Import)?;

        let mut commits = self
            .git
            .list_commits(boot_config_dir, from, to)
            .map_err(|source| ReplayError::History {
                from: from.to_string(),
                to: to.to_string(),
                source,
            })?;
        // git log lists newest first
        commits.reverse();
        debug!(count = commits.len(), from, to, "replaying boot config commits");

        let replayed = self.replay(work_dir, commits);
        let restored = self.restore_excluded(work_dir, from);

        match (replayed, restored) {
            (Ok((applied, skipped)), Ok(exclusions_committed)) => Ok(ReconcileReport {
                applied,
                skipped,
                exclusions_committed,
            }),
            (Err(replay), Ok(_)) => Err(replay),
            (Err(replay), Err(restore)) => {
                warn!("{}", restore);
                Err(replay)
            }
            (Ok(_), Err(restore)) => Err(restore),
        }
    }

    fn replay(
        &self,
        work_dir: &Path,
        commits: Vec<CommitRecord>,
    ) -> Result<(Vec<CommitRecord>, Vec<CommitRecord>), ReplayError> {
        let mut applied = Vec::with_capacity(commits.len());
        let mut skipped = Vec::new();

        for commit in commits {
            match self.git.cherry_pick(work_dir, &commit.sha) {
                Ok(()) => {
                    info!("{}", commit);
                    applied.push(commit);
                }
                Err(GitError::CherryPick {
                    failure: CherryPickFailure::MergeCommit,
                    ..
                }) => {
                    warn!("skipping merge commit {}", commit);
                    skipped.push(commit);
                }
                Err(source) => return Err(ReplayError::CherryPick { commit, source }),
            }
        }

        Ok((applied, skipped))
    }

    fn restore_excluded(&self, work_dir: &Path, from: &str) -> Result<bool, ReplayError> {
        if self.excluded.is_empty() {
            return Ok(false);
        }
        let exclusion = |source: GitError| ReplayError::Exclusion {
            from: from.to_string(),
            source,
        };

        self.git
            .checkout_paths(work_dir, from, self.excluded)
            .map_err(exclusion)?;
        match self
            .git
            .commit_files(work_dir, EXCLUDE_COMMIT_MESSAGE, self.excluded)
        {
            Ok(()) => Ok(true),
            Err(err) if err.is_nothing_to_commit() => {
                debug!("excluded paths unchanged by the upgrade");
                Ok(false)
            }
            Err(err) => Err(exclusion(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bootup_common::{GitCall, MockGit};
    use std::path::PathBuf;

    const BOOT: &str = "https://github.com/jenkins-x/jenkins-x-boot-config.git";

    fn fixture(commits: &[(&str, &str)]) -> (MockGit, PathBuf, PathBuf) {
        let git = MockGit::default();
        git.add_history(
            BOOT,
            "from",
            "to",
            commits
                .iter()
                .map(|(sha, subject)| CommitRecord::new(*sha, *subject))
                .collect(),
        );
        let boot_dir = PathBuf::from("/scratch/boot");
        git.clone_bare(BOOT, &boot_dir).unwrap();
        (git, boot_dir, PathBuf::from("/work/env"))
    }

    fn replay_order(git: &MockGit) -> Vec<String> {
        git.calls()
            .into_iter()
            .filter_map(|call| match call {
                GitCall::CherryPick { sha } => Some(sha),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn replays_oldest_first() {
        let (git, boot, work) = fixture(&[("c1", "old"), ("c2", "mid"), ("c3", "new")]);
        let report = HistoryReconciler::new(&git)
            .reconcile(&boot, "from", "to", &work)
            .unwrap();

        assert_eq!(replay_order(&git), ["c1", "c2", "c3"]);
        assert_eq!(report.applied.len(), 3);
        assert!(report.skipped.is_empty());
        assert!(report.exclusions_committed);
    }

    #[test]
    fn history_is_imported_before_replay() {
        let (git, boot, work) = fixture(&[("c1", "one")]);
        HistoryReconciler::new(&git)
            .reconcile(&boot, "from", "to", &work)
            .unwrap();

        // the first call is the fixture's own clone
        assert_eq!(
            git.calls().get(1),
            Some(&GitCall::FetchHistory {
                dir: work.clone(),
                source: boot.clone(),
            })
        );
    }

    #[test]
    fn merge_commit_is_skipped() {
        let (git, boot, work) = fixture(&[("c1", "one"), ("m2", "Merge pull request #4"), ("c3", "three")]);
        git.fail_cherry_pick("m2", CherryPickFailure::MergeCommit);

        let report = HistoryReconciler::new(&git)
            .reconcile(&boot, "from", "to", &work)
            .unwrap();
        assert_eq!(git.applied(), ["c1", "c3"]);
        assert_eq!(report.skipped, vec![CommitRecord::new("m2", "Merge pull request #4")]);
    }

    #[test]
    fn other_cherry_pick_failure_aborts_but_restores_exclusions() {
        let (git, boot, work) = fixture(&[("c1", "one"), ("c2", "conflict"), ("c3", "three")]);
        git.fail_cherry_pick(
            "c2",
            CherryPickFailure::Other {
                detail: "error: could not apply c2".to_string(),
            },
        );

        let err = HistoryReconciler::new(&git)
            .reconcile(&boot, "from", "to", &work)
            .unwrap_err();
        assert!(matches!(err, ReplayError::CherryPick { ref commit, .. } if commit.sha == "c2"));
        assert_eq!(err.error_code(), ErrorCode::ReplayCherryPickFailed);
        assert_eq!(replay_order(&git), ["c1", "c2"]);
        assert!(git.calls().contains(&GitCall::CheckoutPaths {
            git_ref: "from".to_string(),
            paths: vec!["OWNERS".to_string()],
        }));
    }

    #[test]
    fn exclusions_restored_from_pre_upgrade_commit_after_replay() {
        let (git, boot, work) = fixture(&[("c1", "touches OWNERS")]);
        HistoryReconciler::new(&git)
            .reconcile(&boot, "from", "to", &work)
            .unwrap();

        let calls = git.calls();
        let pick = calls
            .iter()
            .position(|c| matches!(c, GitCall::CherryPick { .. }))
            .unwrap();
        let restore = calls
            .iter()
            .position(|c| {
                *c == GitCall::CheckoutPaths {
                    git_ref: "from".to_string(),
                    paths: vec!["OWNERS".to_string()],
                }
            })
            .unwrap();
        let commit = calls
            .iter()
            .position(|c| {
                *c == GitCall::CommitFiles {
                    message: EXCLUDE_COMMIT_MESSAGE.to_string(),
                    paths: vec!["OWNERS".to_string()],
                }
            })
            .unwrap();
        assert!(pick < restore && restore < commit);
    }

    #[test]
    fn nothing_to_commit_after_restore_is_success() {
        let (git, boot, work) = fixture(&[]);
        git.nothing_to_commit(EXCLUDE_COMMIT_MESSAGE);

        let report = HistoryReconciler::new(&git)
            .reconcile(&boot, "from", "to", &work)
            .unwrap();
        assert!(!report.exclusions_committed);
        assert!(report.applied.is_empty());
    }

    #[test]
    fn empty_exclusion_list_skips_restore() {
        let (git, boot, work) = fixture(&[("c1", "one")]);
        let report = HistoryReconciler::with_excluded(&git, &[])
            .reconcile(&boot, "from", "to", &work)
            .unwrap();
        assert!(!report.exclusions_committed);
        assert!(!git
            .calls()
            .iter()
            .any(|c| matches!(c, GitCall::CheckoutPaths { .. })));
    }
}
