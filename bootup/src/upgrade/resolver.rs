//! Reference Resolver: symbolic refs and pinned versions to commits.

use bootup_common::git::{GitClient, GitError};
use bootup_common::versions::{VersionLock, release_tag};
use bootup_common::{ErrorCode, ResolvedCommit};
use std::path::Path;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: GitError,
    },

    #[error("ref '{git_ref}' not found in {url}")]
    RefNotFound { url: String, git_ref: String },

    #[error("no version pinned for {component} in {lock_path} at {url}@{git_ref}")]
    ComponentMissing {
        url: String,
        git_ref: String,
        component: String,
        lock_path: String,
    },

    #[error("unreadable version lock {lock_path}: {reason}")]
    LockUnreadable { lock_path: String, reason: String },

    #[error("tag {tag} not found in {url}")]
    TagMissing { url: String, tag: String },

    #[error("failed to create scratch directory: {0}")]
    Scratch(#[source] std::io::Error),

    #[error(transparent)]
    Git(#[from] GitError),
}

impl ResolutionError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Fetch { .. } => ErrorCode::GitCloneFailed,
            Self::RefNotFound { .. } => ErrorCode::ResolutionRefNotFound,
            Self::ComponentMissing { .. } | Self::LockUnreadable { .. } => {
                ErrorCode::ResolutionComponentMissing
            }
            Self::TagMissing { .. } => ErrorCode::ResolutionTagMissing,
            Self::Scratch(_) => ErrorCode::InternalTempDir,
            Self::Git(err) => err.error_code(),
        }
    }
}

/// A bare clone in a temporary directory, removed on [`ScratchClone::discard`]
/// or, silently, on drop.
#[derive(Debug)]
pub struct ScratchClone {
    url: String,
    dir: TempDir,
}

impl ScratchClone {
    pub fn bare(git: &dyn GitClient, url: &str) -> Result<Self, ResolutionError> {
        let dir = tempfile::Builder::new()
            .prefix("bootup-")
            .tempdir()
            .map_err(ResolutionError::Scratch)?;
        git.clone_bare(url, dir.path())
            .map_err(|source| ResolutionError::Fetch {
                url: url.to_string(),
                source,
            })?;
        Ok(Self {
            url: url.to_string(),
            dir,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Remove the clone; failures are logged, never returned.
    pub fn discard(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(err) = self.dir.close() {
            warn!(path = %path.display(), "failed to remove scratch clone: {}", err);
        }
    }
}

pub struct ReferenceResolver<'a> {
    git: &'a dyn GitClient,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(git: &'a dyn GitClient) -> Self {
        Self { git }
    }

    pub fn git(&self) -> &'a dyn GitClient {
        self.git
    }

    /// Clone `repo_url` and resolve `git_ref` to a commit.
    pub fn resolve_ref(&self, repo_url: &str, git_ref: &str) -> Result<String, ResolutionError> {
        let clone = ScratchClone::bare(self.git, repo_url)?;
        let resolved = self.commit_in(&clone, git_ref);
        clone.discard();
        resolved
    }

    /// Resolve `git_ref` inside an existing clone.
    pub fn commit_in(&self, clone: &ScratchClone, git_ref: &str) -> Result<String, ResolutionError> {
        let sha = self
            .git
            .commit_for_ref(clone.path(), git_ref)?
            .ok_or_else(|| ResolutionError::RefNotFound {
                url: clone.url().to_string(),
                git_ref: git_ref.to_string(),
            })?;
        debug!(url = clone.url(), git_ref, %sha, "resolved ref");
        Ok(sha)
    }

    /// Version of `component_url` pinned by the version stream at `git_ref`.
    pub fn resolve_version(
        &self,
        version_lock_url: &str,
        git_ref: &str,
        component_url: &str,
    ) -> Result<String, ResolutionError> {
        let clone = ScratchClone::bare(self.git, version_lock_url)?;
        let version = self.version_in(&clone, git_ref, component_url);
        clone.discard();
        version
    }

    /// [`Self::resolve_version`] against an existing version stream clone.
    pub fn version_in(
        &self,
        version_stream: &ScratchClone,
        git_ref: &str,
        component_url: &str,
    ) -> Result<String, ResolutionError> {
        let lock_path = VersionLock::path_for(component_url);
        let missing = || ResolutionError::ComponentMissing {
            url: version_stream.url().to_string(),
            git_ref: git_ref.to_string(),
            component: component_url.to_string(),
            lock_path: lock_path.clone(),
        };

        let contents = self
            .git
            .read_file_at(version_stream.path(), git_ref, &lock_path)?
            .ok_or_else(missing)?;
        let lock = VersionLock::parse(&contents).map_err(|e| ResolutionError::LockUnreadable {
            lock_path: lock_path.clone(),
            reason: e.to_string(),
        })?;
        let version = lock.pinned_version().ok_or_else(missing)?.to_string();
        debug!(component = component_url, git_ref, %version, "resolved pinned version");
        Ok(version)
    }

    /// Map `version` to the commit tagged `v<version>` in `repo_dir`.
    pub fn resolve_tag(
        &self,
        repo_dir: &Path,
        repo_url: &str,
        version: &str,
    ) -> Result<ResolvedCommit, ResolutionError> {
        let tag = release_tag(version);
        let sha = self
            .git
            .commit_for_ref(repo_dir, &tag)?
            .ok_or_else(|| ResolutionError::TagMissing {
                url: repo_url.to_string(),
                tag,
            })?;
        Ok(ResolvedCommit {
            sha,
            display_version: version.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bootup_common::MockGit;

    const STREAM: &str = "https://github.com/jenkins-x/jenkins-x-versions.git";
    const BOOT: &str = "https://github.com/jenkins-x/jenkins-x-boot-config.git";
    const LOCK: &str = "git/github.com/jenkins-x/jenkins-x-boot-config.yml";

    #[test]
    fn resolves_ref_through_scratch_clone() {
        let git = MockGit::default();
        git.add_ref(STREAM, "master", "def456");
        let resolver = ReferenceResolver::new(&git);

        assert_eq!(resolver.resolve_ref(STREAM, "master").unwrap(), "def456");
        let err = resolver.resolve_ref(STREAM, "release").unwrap_err();
        assert!(matches!(err, ResolutionError::RefNotFound { .. }));
        assert_eq!(err.error_code(), ErrorCode::ResolutionRefNotFound);
    }

    #[test]
    fn clone_failure_is_fetch_error() {
        let git = MockGit::default();
        git.fail_clone(STREAM);
        let err = ReferenceResolver::new(&git)
            .resolve_ref(STREAM, "master")
            .unwrap_err();
        assert!(matches!(err, ResolutionError::Fetch { .. }));
    }

    #[test]
    fn resolves_pinned_version() {
        let git = MockGit::default();
        git.add_file(STREAM, "abc123", LOCK, "version: 1.0.42\n");
        let resolver = ReferenceResolver::new(&git);

        assert_eq!(
            resolver.resolve_version(STREAM, "abc123", BOOT).unwrap(),
            "1.0.42"
        );
    }

    #[test]
    fn absent_or_blank_lock_is_component_missing() {
        let git = MockGit::default();
        git.add_file(STREAM, "blank", LOCK, "gitUrl: x\n");
        let resolver = ReferenceResolver::new(&git);

        for git_ref in ["absent", "blank"] {
            let err = resolver.resolve_version(STREAM, git_ref, BOOT).unwrap_err();
            assert!(
                matches!(err, ResolutionError::ComponentMissing { .. }),
                "{git_ref}: {err}"
            );
        }
    }

    #[test]
    fn resolves_release_tag() {
        let git = MockGit::default();
        git.add_ref(BOOT, "v1.0.42", "bc1");
        let resolver = ReferenceResolver::new(&git);
        let clone = ScratchClone::bare(&git, BOOT).unwrap();

        assert_eq!(
            resolver.resolve_tag(clone.path(), BOOT, "1.0.42").unwrap(),
            ResolvedCommit {
                sha: "bc1".to_string(),
                display_version: "1.0.42".to_string(),
            }
        );
        let err = resolver.resolve_tag(clone.path(), BOOT, "9.9.9").unwrap_err();
        assert!(matches!(err, ResolutionError::TagMissing { ref tag, .. } if tag == "v9.9.9"));
        clone.discard();
    }

    #[test]
    fn scratch_clone_is_removed_on_discard() {
        let git = MockGit::default();
        let clone = ScratchClone::bare(&git, BOOT).unwrap();
        let path = clone.path().to_path_buf();
        assert!(path.exists());
        clone.discard();
        assert!(!path.exists());
    }
}
