//! [`GitClient`] backed by the `git` executable.

use super::{CherryPickFailure, GitClient, GitError, HISTORY_NAMESPACE};
use crate::types::CommitRecord;
use crate::util::{mask_sensitive_command, render_command};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::debug;

/// Field separator for `git log` output; cannot appear in a subject line.
const FIELD_SEP: char = '\u{1f}';

/// Shells out to `git` for every operation.
#[derive(Debug, Clone)]
pub struct CliGit {
    program: PathBuf,
}

impl CliGit {
    /// Locate `git` on `PATH`.
    pub fn locate() -> Result<Self, GitError> {
        which::which("git")
            .map(|program| Self { program })
            .map_err(|_| GitError::NotInstalled)
    }

    /// Use a specific git binary.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn raw(&self, dir: Option<&Path>, args: &[&str]) -> Result<(String, Output), GitError> {
        let rendered = render_command("git", args);
        match dir {
            Some(dir) => debug!(dir = %dir.display(), "{}", rendered),
            None => debug!("{}", rendered),
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(args).env("GIT_TERMINAL_PROMPT", "0");
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }
        let output = cmd.output().map_err(|source| GitError::Spawn {
            command: rendered.clone(),
            source,
        })?;
        Ok((rendered, output))
    }

    /// Run git and return trimmed stdout, failing on a non-zero exit.
    fn run(&self, dir: Option<&Path>, args: &[&str]) -> Result<String, GitError> {
        let (command, output) = self.raw(dir, args)?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(GitError::CommandFailed {
                command,
                status: output.status.code(),
                stderr: stderr_of(&output),
            })
        }
    }

    /// Run git and report only whether it exited zero.
    fn succeeds(&self, dir: &Path, args: &[&str]) -> Result<bool, GitError> {
        let (_, output) = self.raw(Some(dir), args)?;
        Ok(output.status.success())
    }

    fn clone_with(&self, url: &str, dest: &Path, bare: bool) -> Result<(), GitError> {
        let dest_str = dest.to_string_lossy();
        let mut args = vec!["clone", "--quiet"];
        if bare {
            args.push("--bare");
        }
        args.push(url);
        args.push(&dest_str);

        self.run(None, &args).map(drop).map_err(|err| match err {
            GitError::CommandFailed { stderr, .. } => GitError::CloneFailed {
                url: crate::util::mask_url_credentials(url),
                stderr,
            },
            other => other,
        })
    }
}

fn stderr_of(output: &Output) -> String {
    mask_sensitive_command(String::from_utf8_lossy(&output.stderr).trim())
}

impl GitClient for CliGit {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), GitError> {
        self.clone_with(url, dest, false)
    }

    fn clone_bare(&self, url: &str, dest: &Path) -> Result<(), GitError> {
        self.clone_with(url, dest, true)
    }

    fn commit_for_ref(&self, dir: &Path, git_ref: &str) -> Result<Option<String>, GitError> {
        let remote_ref = format!("origin/{}", git_ref);
        for candidate in [git_ref, remote_ref.as_str()] {
            let spec = format!("{}^{{commit}}", candidate);
            let (_, output) = self.raw(Some(dir), &["rev-parse", "--verify", "--quiet", &spec])?;
            if output.status.success() {
                let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !sha.is_empty() {
                    return Ok(Some(sha));
                }
            }
        }
        Ok(None)
    }

    fn read_file_at(
        &self,
        dir: &Path,
        git_ref: &str,
        path: &str,
    ) -> Result<Option<String>, GitError> {
        let object = format!("{}:{}", git_ref, path);
        if !self.succeeds(dir, &["cat-file", "-e", &object])? {
            return Ok(None);
        }
        self.run(Some(dir), &["show", &object]).map(Some)
    }

    fn fetch_history(&self, dir: &Path, source: &Path) -> Result<(), GitError> {
        let source = source.to_string_lossy();
        let heads = format!("+refs/heads/*:{}/heads/*", HISTORY_NAMESPACE);
        let tags = format!("+refs/tags/*:{}/tags/*", HISTORY_NAMESPACE);
        self.run(
            Some(dir),
            &["fetch", "--quiet", "--no-tags", &source, &heads, &tags],
        )
        .map(drop)
    }

    fn remote_url(&self, dir: &Path) -> Result<String, GitError> {
        match self.run(Some(dir), &["remote", "get-url", "origin"]) {
            Ok(url) if !url.is_empty() => Ok(url),
            Ok(_) | Err(GitError::CommandFailed { .. }) => Err(GitError::RemoteMissing {
                dir: dir.display().to_string(),
                remote: "origin".to_string(),
            }),
            Err(other) => Err(other),
        }
    }

    fn push_branch(
        &self,
        dir: &Path,
        local_branch: &str,
        remote_branch: &str,
        force: bool,
    ) -> Result<(), GitError> {
        let refspec = format!("{}:refs/heads/{}", local_branch, remote_branch);
        let mut args = vec!["push", "--quiet"];
        if force {
            args.push("--force");
        }
        args.push("origin");
        args.push(&refspec);
        self.run(Some(dir), &args).map(drop)
    }

    fn list_commits(
        &self,
        dir: &Path,
        from: &str,
        to: &str,
    ) -> Result<Vec<CommitRecord>, GitError> {
        let range = format!("{}..{}", from, to);
        let format = format!("--format=%H{}%s", FIELD_SEP);
        let stdout = self.run(Some(dir), &["log", &format, &range, "--"])?;
        Ok(stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| match line.split_once(FIELD_SEP) {
                Some((sha, subject)) => CommitRecord::new(sha, subject),
                None => CommitRecord::new(line, ""),
            })
            .collect())
    }

    fn cherry_pick(&self, dir: &Path, sha: &str) -> Result<(), GitError> {
        let (_, output) = self.raw(
            Some(dir),
            &["cherry-pick", "--strategy=recursive", "-X", "theirs", sha],
        )?;
        if output.status.success() {
            return Ok(());
        }
        Err(GitError::CherryPick {
            sha: sha.to_string(),
            failure: CherryPickFailure::classify(&stderr_of(&output)),
        })
    }

    fn checkout_paths(&self, dir: &Path, git_ref: &str, paths: &[&str]) -> Result<(), GitError> {
        let mut args = vec!["checkout", git_ref, "--"];
        args.extend_from_slice(paths);
        self.run(Some(dir), &args).map(drop)
    }

    fn commit_files(&self, dir: &Path, message: &str, paths: &[&str]) -> Result<(), GitError> {
        let mut add = vec!["add", "--"];
        add.extend_from_slice(paths);
        self.run(Some(dir), &add)?;

        let mut staged = vec!["diff", "--cached", "--quiet", "--"];
        staged.extend_from_slice(paths);
        if self.succeeds(dir, &staged)? {
            return Err(GitError::NothingToCommit);
        }

        let mut commit = vec!["commit", "--quiet", "-m", message, "--"];
        commit.extend_from_slice(paths);
        let (command, output) = self.raw(Some(dir), &commit)?;
        if output.status.success() {
            return Ok(());
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.contains("nothing to commit") {
            return Err(GitError::NothingToCommit);
        }
        Err(GitError::CommandFailed {
            command,
            status: output.status.code(),
            stderr: stderr_of(&output),
        })
    }

    fn current_branch(&self, dir: &Path) -> Result<String, GitError> {
        self.run(Some(dir), &["rev-parse", "--abbrev-ref", "HEAD"])
    }

    fn create_branch(&self, dir: &Path, name: &str) -> Result<(), GitError> {
        self.run(Some(dir), &["checkout", "--quiet", "-b", name])
            .map(drop)
    }

    fn checkout(&self, dir: &Path, name: &str) -> Result<(), GitError> {
        self.run(Some(dir), &["checkout", "--quiet", name]).map(drop)
    }

    fn delete_branch(&self, dir: &Path, name: &str) -> Result<(), GitError> {
        self.run(Some(dir), &["branch", "-D", name]).map(drop)
    }
}
