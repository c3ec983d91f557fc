//! Error Catalog for bootup
//!
//! Every failure the upgrade workflow can surface maps to a stable code in
//! the `BU-Exxx` format, with a message and remediation steps for the
//! operator.
//!
//! # Error Code Ranges
//!
//! | Range      | Category     | Description                                  |
//! |------------|--------------|----------------------------------------------|
//! | E001-E099  | Config       | Configuration and requirements document      |
//! | E100-E199  | Git          | Local git invocation errors                  |
//! | E200-E299  | Resolution   | Ref, version lock and tag lookups            |
//! | E300-E399  | Replay       | History replay and branch lifecycle          |
//! | E400-E499  | Publish      | Push and source-control provider API         |
//! | E500-E599  | Internal     | Internal/unexpected errors                   |

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error code enumeration covering all bootup error scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorCode {
    // =========================================================================
    // Config Errors (E001-E099)
    // =========================================================================
    /// Configuration file could not be read
    ConfigReadError,
    /// Configuration file contains invalid TOML syntax
    ConfigParseError,
    /// Configuration contains invalid values
    ConfigValidationError,
    /// Environment variable has invalid value
    ConfigEnvError,
    /// Requirements document not found in the working directory
    RequirementsNotFound,
    /// Requirements document is not valid YAML or lacks a version stream
    RequirementsParseError,
    /// Requirements document could not be written back
    RequirementsWriteError,
    /// The dev environment repository could not be located or cloned
    DevEnvironmentUnavailable,

    // =========================================================================
    // Git Errors (E100-E199)
    // =========================================================================
    /// git executable not found on PATH
    GitNotInstalled,
    /// A git command exited unsuccessfully
    GitCommandFailed,
    /// Cloning a repository failed
    GitCloneFailed,
    /// The working directory has no usable origin remote
    GitRemoteMissing,

    // =========================================================================
    // Resolution Errors (E200-E299)
    // =========================================================================
    /// Ref could not be fetched or resolved to a commit
    ResolutionRefNotFound,
    /// Component is absent from the version stream's lock files
    ResolutionComponentMissing,
    /// The `v<version>` tag does not exist in the component repository
    ResolutionTagMissing,

    // =========================================================================
    // Replay Errors (E300-E399)
    // =========================================================================
    /// A cherry-pick failed for a reason other than a merge commit
    ReplayCherryPickFailed,
    /// Restoring excluded paths failed
    ReplayExclusionFailed,
    /// Listing the commit range failed
    ReplayHistoryUnavailable,
    /// The ephemeral working branch could not be created
    BranchCreateFailed,
    /// Returning to trunk or deleting the ephemeral branch failed
    BranchCleanupFailed,

    // =========================================================================
    // Publish Errors (E400-E499)
    // =========================================================================
    /// Remote URL could not be parsed into a repository identity
    PublishRemoteUnparseable,
    /// No credentials available for the provider
    PublishAuthMissing,
    /// Pushing the branch failed
    PublishPushFailed,
    /// The provider API rejected a request
    PublishProviderApi,

    // =========================================================================
    // Internal Errors (E500-E599)
    // =========================================================================
    /// Temporary directory could not be created
    InternalTempDir,
    /// Logging could not be initialized
    InternalLoggingError,
}

impl ErrorCode {
    /// Returns the numeric error code (without prefix).
    #[must_use]
    pub const fn code_number(&self) -> u16 {
        match self {
            // Config (001-099)
            Self::ConfigReadError => 1,
            Self::ConfigParseError => 2,
            Self::ConfigValidationError => 3,
            Self::ConfigEnvError => 4,
            Self::RequirementsNotFound => 10,
            Self::RequirementsParseError => 11,
            Self::RequirementsWriteError => 12,
            Self::DevEnvironmentUnavailable => 20,

            // Git (100-199)
            Self::GitNotInstalled => 100,
            Self::GitCommandFailed => 101,
            Self::GitCloneFailed => 102,
            Self::GitRemoteMissing => 103,

            // Resolution (200-299)
            Self::ResolutionRefNotFound => 200,
            Self::ResolutionComponentMissing => 201,
            Self::ResolutionTagMissing => 202,

            // Replay (300-399)
            Self::ReplayCherryPickFailed => 300,
            Self::ReplayExclusionFailed => 301,
            Self::ReplayHistoryUnavailable => 302,
            Self::BranchCreateFailed => 310,
            Self::BranchCleanupFailed => 311,

            // Publish (400-499)
            Self::PublishRemoteUnparseable => 400,
            Self::PublishAuthMissing => 401,
            Self::PublishPushFailed => 402,
            Self::PublishProviderApi => 403,

            // Internal (500-599)
            Self::InternalTempDir => 500,
            Self::InternalLoggingError => 501,
        }
    }

    /// Returns the formatted error code string (e.g., "BU-E001").
    #[must_use]
    pub fn code_string(&self) -> String {
        format!("BU-E{:03}", self.code_number())
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self.code_number() {
            1..=99 => ErrorCategory::Config,
            100..=199 => ErrorCategory::Git,
            200..=299 => ErrorCategory::Resolution,
            300..=399 => ErrorCategory::Replay,
            400..=499 => ErrorCategory::Publish,
            _ => ErrorCategory::Internal,
        }
    }

    /// Returns the full error entry with all metadata.
    #[must_use]
    pub fn entry(&self) -> ErrorEntry {
        ErrorEntry {
            code: self.code_string(),
            category: self.category(),
            message: self.message().to_string(),
            remediation: self
                .remediation()
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }

    /// Returns the error message template.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::ConfigReadError => "Failed to read configuration file",
            Self::ConfigParseError => "Configuration file contains invalid TOML syntax",
            Self::ConfigValidationError => "Configuration contains invalid values",
            Self::ConfigEnvError => "Environment variable has invalid value",
            Self::RequirementsNotFound => "Requirements document not found",
            Self::RequirementsParseError => "Requirements document could not be parsed",
            Self::RequirementsWriteError => "Requirements document could not be written",
            Self::DevEnvironmentUnavailable => "Dev environment repository is unavailable",

            Self::GitNotInstalled => "git is not installed or not on PATH",
            Self::GitCommandFailed => "A git command failed",
            Self::GitCloneFailed => "Failed to clone repository",
            Self::GitRemoteMissing => "Working directory has no origin remote",

            Self::ResolutionRefNotFound => "Ref could not be resolved to a commit",
            Self::ResolutionComponentMissing => "Component is not pinned in the version stream",
            Self::ResolutionTagMissing => "Version tag does not exist in the repository",

            Self::ReplayCherryPickFailed => "Replaying an upstream commit failed",
            Self::ReplayExclusionFailed => "Restoring excluded paths failed",
            Self::ReplayHistoryUnavailable => "Upstream commit range could not be listed",
            Self::BranchCreateFailed => "Failed to create the upgrade working branch",
            Self::BranchCleanupFailed => "Failed to clean up the upgrade working branch",

            Self::PublishRemoteUnparseable => "Remote URL is not a recognised repository URL",
            Self::PublishAuthMissing => "No credentials available for the git provider",
            Self::PublishPushFailed => "Failed to push the upgrade branch",
            Self::PublishProviderApi => "Git provider API request failed",

            Self::InternalTempDir => "Failed to create a temporary directory",
            Self::InternalLoggingError => "Failed to initialize logging",
        }
    }

    /// Returns remediation steps for this error.
    #[must_use]
    pub const fn remediation(&self) -> &'static [&'static str] {
        match self {
            Self::ConfigReadError => &[
                "Check that the config file exists and is readable",
                "Pass an explicit path with --config",
            ],
            Self::ConfigParseError => &[
                "Validate the file with a TOML linter",
                "Compare against the documented keys in the README",
            ],
            Self::ConfigValidationError => &[
                "Branch names and labels must be non-empty",
                "The trunk branch must differ from the pull request branch",
            ],
            Self::ConfigEnvError => &[
                "Check BOOTUP_* environment variables for typos",
                "Unset the variable to fall back to the default",
            ],
            Self::RequirementsNotFound => &[
                "Run the command inside a GitOps clone of the dev environment",
                "Pass the clone directory with --dir",
            ],
            Self::RequirementsParseError => &[
                "Ensure the file is valid YAML",
                "Ensure it has a versionStream section with url and ref",
            ],
            Self::RequirementsWriteError => &[
                "Check file permissions in the working directory",
            ],
            Self::DevEnvironmentUnavailable => &[
                "Pass the dev environment clone URL with --dev-env-url",
                "Check kubectl access to the dev environment namespace",
            ],
            Self::GitNotInstalled => &["Install git and make sure it is on PATH"],
            Self::GitCommandFailed => &[
                "Re-run with --verbose to see the failing git command",
                "Inspect the working directory with git status",
            ],
            Self::GitCloneFailed => &[
                "Check the repository URL and network access",
                "Check git credentials for private repositories",
            ],
            Self::GitRemoteMissing => &["Add an origin remote pointing at the hosted repository"],
            Self::ResolutionRefNotFound => &[
                "Check that the recorded version stream ref exists upstream",
                "Check network access to the version stream repository",
            ],
            Self::ResolutionComponentMissing => &[
                "Check that the version stream pins the boot configuration repository",
                "Override the boot configuration URL with --boot-config-url",
            ],
            Self::ResolutionTagMissing => &[
                "Check that the boot configuration repository publishes v<version> tags",
            ],
            Self::ReplayCherryPickFailed => &[
                "The upgrade branch was left in place for inspection",
                "Resolve the conflict manually or abort with git cherry-pick --abort",
            ],
            Self::ReplayExclusionFailed => &[
                "Check that the excluded paths exist at the pre-upgrade revision",
            ],
            Self::ReplayHistoryUnavailable => &[
                "Check that both boot configuration revisions exist in the clone",
            ],
            Self::BranchCreateFailed => &[
                "Commit or stash local changes in the working directory",
            ],
            Self::BranchCleanupFailed => &[
                "Check out the trunk branch and delete the working branch manually",
            ],
            Self::PublishRemoteUnparseable => &[
                "Use an https://host/owner/repo or git@host:owner/repo origin URL",
            ],
            Self::PublishAuthMissing => &[
                "Set BOOTUP_GIT_TOKEN (or GITHUB_TOKEN / GITLAB_TOKEN)",
            ],
            Self::PublishPushFailed => &[
                "Check push permissions for the origin remote",
                "The upgrade branch was left in place; push it manually",
            ],
            Self::PublishProviderApi => &[
                "Check that the token has pull request permissions",
                "Override the API endpoint with BOOTUP_GIT_API_URL for self-hosted servers",
            ],
            Self::InternalTempDir => &["Check free space and permissions of the temp directory"],
            Self::InternalLoggingError => &["Check the BOOTUP_LOG_* environment variables"],
        }
    }

    /// Returns all error codes.
    #[must_use]
    pub const fn all() -> &'static [ErrorCode] {
        &[
            Self::ConfigReadError,
            Self::ConfigParseError,
            Self::ConfigValidationError,
            Self::ConfigEnvError,
            Self::RequirementsNotFound,
            Self::RequirementsParseError,
            Self::RequirementsWriteError,
            Self::DevEnvironmentUnavailable,
            Self::GitNotInstalled,
            Self::GitCommandFailed,
            Self::GitCloneFailed,
            Self::GitRemoteMissing,
            Self::ResolutionRefNotFound,
            Self::ResolutionComponentMissing,
            Self::ResolutionTagMissing,
            Self::ReplayCherryPickFailed,
            Self::ReplayExclusionFailed,
            Self::ReplayHistoryUnavailable,
            Self::BranchCreateFailed,
            Self::BranchCleanupFailed,
            Self::PublishRemoteUnparseable,
            Self::PublishAuthMissing,
            Self::PublishPushFailed,
            Self::PublishProviderApi,
            Self::InternalTempDir,
            Self::InternalLoggingError,
        ]
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code_string(), self.message())
    }
}

/// Error category for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Configuration and requirements errors (E001-E099)
    Config,
    /// Local git errors (E100-E199)
    Git,
    /// Ref/version/tag resolution errors (E200-E299)
    Resolution,
    /// History replay and branch lifecycle errors (E300-E399)
    Replay,
    /// Push and provider errors (E400-E499)
    Publish,
    /// Internal/unexpected errors (E500-E599)
    Internal,
}

impl ErrorCategory {
    /// Returns a human-readable name for the category.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Config => "Configuration",
            Self::Git => "Git",
            Self::Resolution => "Resolution",
            Self::Replay => "Replay",
            Self::Publish => "Publish",
            Self::Internal => "Internal",
        }
    }
}

/// Full metadata for an error code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// Error code string (e.g., "BU-E001")
    pub code: String,
    /// Error category
    pub category: ErrorCategory,
    /// Human-readable error message
    pub message: String,
    /// Steps to remediate the error
    pub remediation: Vec<String>,
}

impl ErrorEntry {
    /// Formats the error for display with full remediation steps.
    #[must_use]
    pub fn format_full(&self) -> String {
        let mut output = format!("[{}] {}\n", self.code, self.message);

        if !self.remediation.is_empty() {
            output.push_str("\nRemediation steps:\n");
            for (i, step) in self.remediation.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, step));
            }
        }

        output
    }

    /// Formats the error as a single line.
    #[must_use]
    pub fn format_brief(&self) -> String {
        format!("[{}] {}", self.code, self.message)
    }
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_brief())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_numbers_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for code in ErrorCode::all() {
            let num = code.code_number();
            assert!(
                seen.insert(num),
                "Duplicate error code number: {} for {:?}",
                num,
                code
            );
        }
    }

    #[test]
    fn test_error_code_format() {
        assert_eq!(ErrorCode::ConfigReadError.code_string(), "BU-E001");
        assert_eq!(ErrorCode::GitNotInstalled.code_string(), "BU-E100");
        assert_eq!(ErrorCode::ResolutionRefNotFound.code_string(), "BU-E200");
        assert_eq!(ErrorCode::ReplayCherryPickFailed.code_string(), "BU-E300");
        assert_eq!(ErrorCode::PublishRemoteUnparseable.code_string(), "BU-E400");
        assert_eq!(ErrorCode::InternalTempDir.code_string(), "BU-E500");
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            ErrorCode::RequirementsNotFound.category(),
            ErrorCategory::Config
        );
        assert_eq!(ErrorCode::GitCloneFailed.category(), ErrorCategory::Git);
        assert_eq!(
            ErrorCode::ResolutionTagMissing.category(),
            ErrorCategory::Resolution
        );
        assert_eq!(
            ErrorCode::BranchCleanupFailed.category(),
            ErrorCategory::Replay
        );
        assert_eq!(
            ErrorCode::PublishPushFailed.category(),
            ErrorCategory::Publish
        );
    }

    #[test]
    fn test_every_code_has_remediation() {
        for code in ErrorCode::all() {
            assert!(
                !code.remediation().is_empty(),
                "{:?} has no remediation steps",
                code
            );
        }
    }

    #[test]
    fn test_entry_format_full_numbers_steps() {
        let entry = ErrorCode::RequirementsNotFound.entry();
        let text = entry.format_full();
        assert!(text.starts_with("[BU-E010] Requirements document not found"));
        assert!(text.contains("  1. Run the command inside a GitOps clone"));
        assert!(text.contains("  2. Pass the clone directory with --dir"));
        assert_eq!(entry.to_string(), "[BU-E010] Requirements document not found");
    }
}
