//! Deterministic in-memory [`GitClient`] for tests.
//!
//! Repositories are keyed by URL. A `clone_*` call binds the destination
//! directory to that URL; directories never cloned are keyed by their path, so
//! the working tree of a test is addressed with `dir.display().to_string()`.

use super::{CherryPickFailure, GitClient, GitError};
use crate::types::CommitRecord;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn append(path: &Path, text: &str) -> std::io::Result<()> {
    use std::io::Write;
    std::fs::OpenOptions::new()
        .append(true)
        .open(path)?
        .write_all(text.as_bytes())
}

/// One recorded call on a [`MockGit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitCall {
    CloneRepo { url: String, dest: PathBuf },
    CloneBare { url: String, dest: PathBuf },
    CommitForRef { repo: String, git_ref: String },
    ReadFileAt { repo: String, git_ref: String, path: String },
    FetchHistory { dir: PathBuf, source: PathBuf },
    RemoteUrl,
    Push { local: String, remote: String, force: bool },
    ListCommits { repo: String, from: String, to: String },
    CherryPick { sha: String },
    CheckoutPaths { git_ref: String, paths: Vec<String> },
    CommitFiles { message: String, paths: Vec<String> },
    CreateBranch { name: String },
    Checkout { name: String },
    DeleteBranch { name: String },
}

#[derive(Debug)]
struct State {
    bindings: HashMap<PathBuf, String>,
    refs: HashMap<(String, String), String>,
    files: HashMap<(String, String, String), String>,
    histories: HashMap<(String, String, String), Vec<CommitRecord>>,
    cherry_pick_failures: HashMap<String, CherryPickFailure>,
    cherry_pick_edits: HashMap<String, Vec<(PathBuf, String)>>,
    clone_failures: HashSet<String>,
    clean_commits: HashSet<String>,
    push_error: Option<String>,
    remote: Option<String>,
    branches: BTreeSet<String>,
    current: String,
    applied: Vec<String>,
    calls: Vec<GitCall>,
}

/// Scripted git double. Clones share state, so a test can keep a handle
/// while the code under test owns another.
#[derive(Debug, Clone)]
pub struct MockGit {
    state: Arc<Mutex<State>>,
}

impl Default for MockGit {
    fn default() -> Self {
        Self::new("master")
    }
}

impl MockGit {
    /// A working repository checked out on `trunk`.
    pub fn new(trunk: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                bindings: HashMap::new(),
                refs: HashMap::new(),
                files: HashMap::new(),
                histories: HashMap::new(),
                cherry_pick_failures: HashMap::new(),
                cherry_pick_edits: HashMap::new(),
                clone_failures: HashSet::new(),
                clean_commits: HashSet::new(),
                push_error: None,
                remote: None,
                branches: BTreeSet::from([trunk.to_string()]),
                current: trunk.to_string(),
                applied: Vec::new(),
                calls: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `git_ref` resolve to `sha` in the repository `repo`.
    pub fn add_ref(&self, repo: &str, git_ref: &str, sha: &str) -> &Self {
        self.lock()
            .refs
            .insert((repo.to_string(), git_ref.to_string()), sha.to_string());
        self
    }

    /// Serve `contents` for `path` at `git_ref` in `repo`.
    pub fn add_file(&self, repo: &str, git_ref: &str, path: &str, contents: &str) -> &Self {
        self.lock().files.insert(
            (repo.to_string(), git_ref.to_string(), path.to_string()),
            contents.to_string(),
        );
        self
    }

    /// Commits between `from` and `to` in `repo`, given oldest first. They
    /// are served newest first, as `git log` does.
    pub fn add_history(&self, repo: &str, from: &str, to: &str, oldest_first: Vec<CommitRecord>) -> &Self {
        let mut newest_first = oldest_first;
        newest_first.reverse();
        self.lock().histories.insert(
            (repo.to_string(), from.to_string(), to.to_string()),
            newest_first,
        );
        self
    }

    pub fn fail_cherry_pick(&self, sha: &str, failure: CherryPickFailure) -> &Self {
        self.lock()
            .cherry_pick_failures
            .insert(sha.to_string(), failure);
        self
    }

    /// Applying `sha` appends `text` to the real file at `path`.
    pub fn edit_on_cherry_pick(&self, sha: &str, path: &Path, text: &str) -> &Self {
        self.lock()
            .cherry_pick_edits
            .entry(sha.to_string())
            .or_default()
            .push((path.to_path_buf(), text.to_string()));
        self
    }

    pub fn fail_clone(&self, url: &str) -> &Self {
        self.lock().clone_failures.insert(url.to_string());
        self
    }

    /// Commits with this message report "nothing to commit".
    pub fn nothing_to_commit(&self, message: &str) -> &Self {
        self.lock().clean_commits.insert(message.to_string());
        self
    }

    pub fn fail_push(&self, stderr: &str) -> &Self {
        self.lock().push_error = Some(stderr.to_string());
        self
    }

    pub fn set_remote(&self, url: &str) -> &Self {
        self.lock().remote = Some(url.to_string());
        self
    }

    /// Snapshot of every call received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<GitCall> {
        self.lock().calls.clone()
    }

    /// Shas successfully cherry-picked, in application order.
    #[must_use]
    pub fn applied(&self) -> Vec<String> {
        self.lock().applied.clone()
    }

    #[must_use]
    pub fn branches(&self) -> BTreeSet<String> {
        self.lock().branches.clone()
    }

    #[must_use]
    pub fn head(&self) -> String {
        self.lock().current.clone()
    }
}

impl State {
    fn repo_key(&self, dir: &Path) -> String {
        self.bindings
            .get(dir)
            .cloned()
            .unwrap_or_else(|| dir.display().to_string())
    }

    fn clone_into(&mut self, url: &str, dest: &Path, bare: bool) -> Result<(), GitError> {
        self.calls.push(if bare {
            GitCall::CloneBare {
                url: url.to_string(),
                dest: dest.to_path_buf(),
            }
        } else {
            GitCall::CloneRepo {
                url: url.to_string(),
                dest: dest.to_path_buf(),
            }
        });
        if self.clone_failures.contains(url) {
            return Err(GitError::CloneFailed {
                url: url.to_string(),
                stderr: "fatal: repository not found".to_string(),
            });
        }
        self.bindings.insert(dest.to_path_buf(), url.to_string());
        Ok(())
    }

    fn failed(command: String, stderr: String) -> GitError {
        GitError::CommandFailed {
            command,
            status: Some(1),
            stderr,
        }
    }
}

impl GitClient for MockGit {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), GitError> {
        self.lock().clone_into(url, dest, false)
    }

    fn clone_bare(&self, url: &str, dest: &Path) -> Result<(), GitError> {
        self.lock().clone_into(url, dest, true)
    }

    fn commit_for_ref(&self, dir: &Path, git_ref: &str) -> Result<Option<String>, GitError> {
        let mut state = self.lock();
        let repo = state.repo_key(dir);
        state.calls.push(GitCall::CommitForRef {
            repo: repo.clone(),
            git_ref: git_ref.to_string(),
        });
        Ok(state.refs.get(&(repo, git_ref.to_string())).cloned())
    }

    fn read_file_at(
        &self,
        dir: &Path,
        git_ref: &str,
        path: &str,
    ) -> Result<Option<String>, GitError> {
        let mut state = self.lock();
        let repo = state.repo_key(dir);
        state.calls.push(GitCall::ReadFileAt {
            repo: repo.clone(),
            git_ref: git_ref.to_string(),
            path: path.to_string(),
        });
        Ok(state
            .files
            .get(&(repo, git_ref.to_string(), path.to_string()))
            .cloned())
    }

    fn fetch_history(&self, dir: &Path, source: &Path) -> Result<(), GitError> {
        self.lock().calls.push(GitCall::FetchHistory {
            dir: dir.to_path_buf(),
            source: source.to_path_buf(),
        });
        Ok(())
    }

    fn remote_url(&self, dir: &Path) -> Result<String, GitError> {
        let mut state = self.lock();
        state.calls.push(GitCall::RemoteUrl);
        state.remote.clone().ok_or_else(|| GitError::RemoteMissing {
            dir: dir.display().to_string(),
            remote: "origin".to_string(),
        })
    }

    fn push_branch(
        &self,
        _dir: &Path,
        local_branch: &str,
        remote_branch: &str,
        force: bool,
    ) -> Result<(), GitError> {
        let mut state = self.lock();
        state.calls.push(GitCall::Push {
            local: local_branch.to_string(),
            remote: remote_branch.to_string(),
            force,
        });
        match &state.push_error {
            Some(stderr) => Err(State::failed(
                format!("git push origin {}:refs/heads/{}", local_branch, remote_branch),
                stderr.clone(),
            )),
            None => Ok(()),
        }
    }

    fn list_commits(
        &self,
        dir: &Path,
        from: &str,
        to: &str,
    ) -> Result<Vec<CommitRecord>, GitError> {
        let mut state = self.lock();
        let repo = state.repo_key(dir);
        state.calls.push(GitCall::ListCommits {
            repo: repo.clone(),
            from: from.to_string(),
            to: to.to_string(),
        });
        Ok(state
            .histories
            .get(&(repo, from.to_string(), to.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn cherry_pick(&self, _dir: &Path, sha: &str) -> Result<(), GitError> {
        let mut state = self.lock();
        state.calls.push(GitCall::CherryPick {
            sha: sha.to_string(),
        });
        match state.cherry_pick_failures.get(sha).cloned() {
            Some(failure) => Err(GitError::CherryPick {
                sha: sha.to_string(),
                failure,
            }),
            None => {
                for (path, text) in state.cherry_pick_edits.get(sha).into_iter().flatten() {
                    append(path, text).map_err(|source| GitError::Spawn {
                        command: format!("cherry-pick {}", sha),
                        source,
                    })?;
                }
                state.applied.push(sha.to_string());
                Ok(())
            }
        }
    }

    fn checkout_paths(&self, _dir: &Path, git_ref: &str, paths: &[&str]) -> Result<(), GitError> {
        self.lock().calls.push(GitCall::CheckoutPaths {
            git_ref: git_ref.to_string(),
            paths: paths.iter().map(ToString::to_string).collect(),
        });
        Ok(())
    }

    fn commit_files(&self, _dir: &Path, message: &str, paths: &[&str]) -> Result<(), GitError> {
        let mut state = self.lock();
        state.calls.push(GitCall::CommitFiles {
            message: message.to_string(),
            paths: paths.iter().map(ToString::to_string).collect(),
        });
        if state.clean_commits.contains(message) {
            return Err(GitError::NothingToCommit);
        }
        Ok(())
    }

    fn current_branch(&self, _dir: &Path) -> Result<String, GitError> {
        Ok(self.lock().current.clone())
    }

    fn create_branch(&self, _dir: &Path, name: &str) -> Result<(), GitError> {
        let mut state = self.lock();
        state.calls.push(GitCall::CreateBranch {
            name: name.to_string(),
        });
        if !state.branches.insert(name.to_string()) {
            return Err(State::failed(
                format!("git checkout -b {}", name),
                format!("fatal: a branch named '{}' already exists", name),
            ));
        }
        state.current = name.to_string();
        Ok(())
    }

    fn checkout(&self, _dir: &Path, name: &str) -> Result<(), GitError> {
        let mut state = self.lock();
        state.calls.push(GitCall::Checkout {
            name: name.to_string(),
        });
        if !state.branches.contains(name) {
            return Err(State::failed(
                format!("git checkout {}", name),
                format!("error: pathspec '{}' did not match any file(s) known to git", name),
            ));
        }
        state.current = name.to_string();
        Ok(())
    }

    fn delete_branch(&self, _dir: &Path, name: &str) -> Result<(), GitError> {
        let mut state = self.lock();
        state.calls.push(GitCall::DeleteBranch {
            name: name.to_string(),
        });
        if state.current == name {
            return Err(State::failed(
                format!("git branch -D {}", name),
                format!("error: Cannot delete branch '{}' checked out", name),
            ));
        }
        if !state.branches.remove(name) {
            return Err(State::failed(
                format!("git branch -D {}", name),
                format!("error: branch '{}' not found.", name),
            ));
        }
        Ok(())
    }
}
