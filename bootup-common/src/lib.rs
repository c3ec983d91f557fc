//! Shared types, collaborators and utilities for bootup.
//!
//! The upgrade core in the `bootup` binary talks to the outside world only
//! through the abstractions in this crate:
//! - [`git::GitClient`] for local git operations
//! - [`provider::GitProvider`] for the source-control provider API
//! - [`requirements::RequirementsDocument`] for the pinned version stream
//! - [`versions::VersionLock`] for component version lookups

pub mod config;
pub mod errors;
pub mod git;
pub mod logging;
pub mod provider;
pub mod requirements;
pub mod types;
pub mod util;
pub mod versions;

pub use config::{ConfigError, SecretToken, UpgradeConfig};
pub use errors::{ErrorCategory, ErrorCode, ErrorEntry};
pub use git::{CherryPickFailure, CliGit, GitCall, GitClient, GitError, MockGit};
pub use logging::{LogConfig, LogFormat, LoggingGuards, init_logging};
pub use provider::{
    GitKind, GitProvider, MockProvider, ProviderCall, ProviderError, ProviderFactory,
    ProviderSource, PullRequestFilter, PullRequestInfo, RepositoryRecord,
};
pub use requirements::{REQUIREMENTS_FILE_NAME, RequirementsDocument, RequirementsError};
pub use types::{
    CommitRecord, GitRepositoryInfo, GitUrlError, PullRequestSpec, ResolvedCommit,
    VersionStreamRef,
};
pub use versions::{VersionLock, release_tag};
