//! Branch Lifecycle Manager.

use bootup_common::git::{GitClient, GitError};
use bootup_common::ErrorCode;
use std::path::Path;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Failures creating or removing the working branch.
#[derive(Debug, Error)]
pub enum BranchError {
    /// The uniquely named branch could not be created or checked out.
    #[error("failed to create working branch {name}: {source}")]
    Create {
        name: String,
        #[source]
        source: GitError,
    },

    /// Returning to trunk failed; the working branch is still checked out.
    #[error("failed to check out {trunk}: {source}")]
    Checkout {
        trunk: String,
        #[source]
        source: GitError,
    },

    /// Trunk is checked out but the working branch could not be deleted.
    #[error("failed to delete working branch {name}: {source}")]
    Delete {
        name: String,
        #[source]
        source: GitError,
    },
}

impl BranchError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Create { .. } => ErrorCode::BranchCreateFailed,
            Self::Checkout { .. } | Self::Delete { .. } => ErrorCode::BranchCleanupFailed,
        }
    }
}

/// Fresh collision-resistant branch name.
pub fn new_branch_name() -> String {
    Uuid::new_v4().to_string()
}

/// Creates the ephemeral working branch and returns the tree to trunk.
pub struct BranchLifecycle<'a> {
    git: &'a dyn GitClient,
    dir: &'a Path,
    trunk: &'a str,
}

impl<'a> BranchLifecycle<'a> {
    pub fn new(git: &'a dyn GitClient, dir: &'a Path, trunk: &'a str) -> Self {
        Self { git, dir, trunk }
    }

    /// Create and check out a uniquely named branch.
    pub fn begin(&self) -> Result<String, BranchError> {
        let name = new_branch_name();
        self.git
            .create_branch(self.dir, &name)
            .map_err(|source| BranchError::Create {
                name: name.clone(),
                source,
            })?;
        info!(branch = %name, "created working branch");
        Ok(name)
    }

    /// Check out trunk and delete `name`.
    pub fn end(&self, name: &str) -> Result<(), BranchError> {
        self.git
            .checkout(self.dir, self.trunk)
            .map_err(|source| BranchError::Checkout {
                trunk: self.trunk.to_string(),
                source,
            })?;
        self.git
            .delete_branch(self.dir, name)
            .map_err(|source| BranchError::Delete {
                name: name.to_string(),
                source,
            })?;
        info!(branch = name, trunk = self.trunk, "deleted working branch");
        Ok(())
    }
}
