//! Core data model shared by the upgrade workflow and its collaborators.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

/// `scheme://[user@]host[:port]/path`
static URL_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<scheme>[a-zA-Z][a-zA-Z0-9+.-]*)://(?:[^@/]+@)?(?P<host>[^/:]+)(?::\d+)?/(?P<path>.+)$")
        .expect("url-style remote regex is valid")
});

/// `[user@]host:path` (scp-like syntax used for SSH remotes)
static SCP_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[^@/]+@)?(?P<host>[^/:]+):(?P<path>[^/].*)$")
        .expect("scp-style remote regex is valid")
});

/// The pinned version stream recorded in the requirements document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionStreamRef {
    pub url: String,
    /// Branch, tag or commit SHA. After a successful upgrade this is always a
    /// commit SHA.
    #[serde(rename = "ref")]
    pub git_ref: String,
}

/// A symbolic ref resolved to an immutable commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedCommit {
    pub sha: String,
    /// Human-readable version the commit was looked up by (without the `v`
    /// tag prefix).
    pub display_version: String,
}

/// One commit in a listed history range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub sha: String,
    pub subject: String,
}

impl CommitRecord {
    pub fn new(sha: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            sha: sha.into(),
            subject: subject.into(),
        }
    }
}

impl fmt::Display for CommitRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.sha, self.subject)
    }
}

/// Description of the change request to publish.
///
/// `branch_name` is fixed per upgrade type so that repeated runs refresh the
/// same pull request instead of opening a new one each time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestSpec {
    pub branch_name: String,
    pub title: String,
    pub message: String,
    pub labels: BTreeSet<String>,
}

/// Errors parsing a git remote URL.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GitUrlError {
    #[error("empty git URL")]
    Empty,
    #[error("unrecognised git URL: {0}")]
    Unrecognised(String),
    #[error("git URL {0} does not contain an owner and repository name")]
    MissingOwner(String),
}

/// Structured identity of a hosted repository, derived from its remote URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitRepositoryInfo {
    /// The remote URL as given.
    pub url: String,
    pub host: String,
    /// Owner, organisation or (for GitLab) the full group path.
    pub organisation: String,
    pub name: String,
}

impl GitRepositoryInfo {
    /// Parse an HTTPS, `ssh://` or scp-style remote URL.
    pub fn parse(url: &str) -> Result<Self, GitUrlError> {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return Err(GitUrlError::Empty);
        }

        let (host, path) = if let Some(caps) = URL_STYLE.captures(trimmed) {
            (caps["host"].to_string(), caps["path"].to_string())
        } else if let Some(caps) = SCP_STYLE.captures(trimmed) {
            (caps["host"].to_string(), caps["path"].to_string())
        } else {
            return Err(GitUrlError::Unrecognised(trimmed.to_string()));
        };

        let path = path.trim_end_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let Some((name, owner)) = segments.split_last() else {
            return Err(GitUrlError::MissingOwner(trimmed.to_string()));
        };
        if owner.is_empty() {
            return Err(GitUrlError::MissingOwner(trimmed.to_string()));
        }

        Ok(Self {
            url: trimmed.to_string(),
            host: host.to_lowercase(),
            organisation: owner.join("/"),
            name: (*name).to_string(),
        })
    }

    /// `owner/name`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.organisation, self.name)
    }

    /// Canonical HTTPS clone URL for this repository.
    pub fn https_url(&self) -> String {
        format!("https://{}/{}.git", self.host, self.full_name())
    }
}

/// Normalize a component git URL into the `host/owner/name` key used by the
/// version stream's lock files.
pub fn component_key(url: &str) -> String {
    let trimmed = url.trim();
    let without_scheme = match trimmed.find("://") {
        Some(idx) => &trimmed[idx + 3..],
        None => trimmed,
    };
    let without_user = match without_scheme.split_once('@') {
        Some((_, rest)) if !rest.contains('@') => rest,
        _ => without_scheme,
    };
    let normalized = without_user.replacen(':', "/", 1);
    let normalized = normalized.trim_end_matches('/');
    normalized
        .strip_suffix(".git")
        .unwrap_or(normalized)
        .to_string()
}
