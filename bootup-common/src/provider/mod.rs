//! Source-control provider capability.
//!
//! The Change Publisher needs four things from the hosting service: the
//! repository record, a lookup of existing upgrade pull requests, and
//! create/update of one. [`GitProvider`] captures that; GitHub and GitLab
//! implement it over their REST APIs, [`MockProvider`] records calls for tests.

mod github;
mod gitlab;
mod http;
mod mock;

pub use github::GitHubProvider;
pub use gitlab::GitLabProvider;
pub use mock::{MockProvider, ProviderCall};

use crate::config::{SecretToken, UpgradeConfig};
use crate::errors::ErrorCode;
use crate::types::{GitRepositoryInfo, GitUrlError, PullRequestSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Which hosting service a repository lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GitKind {
    #[serde(rename = "github")]
    GitHub,
    #[serde(rename = "gitlab")]
    GitLab,
}

impl GitKind {
    /// Guess the provider from a host name.
    pub fn detect(host: &str) -> Self {
        if host.to_ascii_lowercase().contains("gitlab") {
            Self::GitLab
        } else {
            Self::GitHub
        }
    }

    /// REST API base for `host`.
    pub fn api_base(self, host: &str) -> String {
        match self {
            Self::GitHub if host.eq_ignore_ascii_case("github.com") => {
                "https://api.github.com".to_string()
            }
            Self::GitHub => format!("https://{}/api/v3", host),
            Self::GitLab => format!("https://{}/api/v4", host),
        }
    }

    /// Conventional token variables, checked after `BOOTUP_GIT_TOKEN`.
    pub fn token_env_vars(self) -> &'static [&'static str] {
        match self {
            Self::GitHub => &["GITHUB_TOKEN", "GH_TOKEN"],
            Self::GitLab => &["GITLAB_TOKEN"],
        }
    }
}

impl fmt::Display for GitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GitHub => f.write_str("github"),
            Self::GitLab => f.write_str("gitlab"),
        }
    }
}

impl FromStr for GitKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "github" => Ok(Self::GitHub),
            "gitlab" => Ok(Self::GitLab),
            other => Err(format!("unknown git kind '{}'", other)),
        }
    }
}

/// The upstream repository as the provider reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    pub organisation: String,
    pub name: String,
    pub default_branch: String,
    pub html_url: String,
    pub clone_url: String,
    /// Provider-specific id (GitLab project id); `None` on GitHub.
    pub id: Option<u64>,
}

impl RepositoryRecord {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.organisation, self.name)
    }
}

/// Selects open pull requests raised from `head_branch` carrying every label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestFilter {
    pub head_branch: String,
    pub labels: BTreeSet<String>,
}

impl PullRequestFilter {
    pub fn matches(&self, pr: &PullRequestInfo) -> bool {
        pr.head_branch == self.head_branch && self.labels.is_subset(&pr.labels)
    }
}

/// An open pull (or merge) request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestInfo {
    pub number: u64,
    pub url: String,
    pub title: String,
    pub head_branch: String,
    pub labels: BTreeSet<String>,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no API token for {kind} host {host}; set BOOTUP_GIT_TOKEN or {}", kind.token_env_vars().join("/"))]
    MissingToken { kind: GitKind, host: String },

    #[error("cannot determine repository from remote URL: {0}")]
    Url(#[from] GitUrlError),

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}: {body}")]
    Api {
        url: String,
        status: u16,
        body: String,
    },

    #[error("{0} not found")]
    NotFound(String),
}

impl ProviderError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::MissingToken { .. } => ErrorCode::PublishAuthMissing,
            Self::Url(_) => ErrorCode::PublishRemoteUnparseable,
            Self::Http { .. } | Self::Api { .. } | Self::NotFound(_) => {
                ErrorCode::PublishProviderApi
            }
        }
    }
}

/// Hosting-service operations the Change Publisher relies on.
pub trait GitProvider: Send + Sync {
    fn kind(&self) -> GitKind;

    fn get_repository(&self, organisation: &str, name: &str)
    -> Result<RepositoryRecord, ProviderError>;

    /// Open pull requests matching `filter`.
    fn find_pull_requests(
        &self,
        repo: &RepositoryRecord,
        filter: &PullRequestFilter,
    ) -> Result<Vec<PullRequestInfo>, ProviderError>;

    /// Open a pull request from `spec.branch_name` into `base`.
    fn create_pull_request(
        &self,
        repo: &RepositoryRecord,
        spec: &PullRequestSpec,
        base: &str,
    ) -> Result<PullRequestInfo, ProviderError>;

    /// Refresh the title and body of an existing pull request.
    fn update_pull_request(
        &self,
        repo: &RepositoryRecord,
        number: u64,
        spec: &PullRequestSpec,
    ) -> Result<PullRequestInfo, ProviderError>;

    fn add_labels(
        &self,
        repo: &RepositoryRecord,
        number: u64,
        labels: &BTreeSet<String>,
    ) -> Result<(), ProviderError>;
}

/// Picks the provider implementation for a repository.
pub trait ProviderSource {
    fn provider_for(&self, repo: &GitRepositoryInfo) -> Result<Box<dyn GitProvider>, ProviderError>;
}

/// Builds GitHub/GitLab providers from configuration and the remote URL.
#[derive(Debug, Clone, Default)]
pub struct ProviderFactory {
    kind: Option<GitKind>,
    api_url: Option<String>,
    token: Option<SecretToken>,
}

impl ProviderFactory {
    pub fn new(kind: Option<GitKind>, api_url: Option<String>, token: Option<SecretToken>) -> Self {
        Self {
            kind,
            api_url,
            token,
        }
    }

    pub fn from_config(config: &UpgradeConfig) -> Self {
        Self::new(
            config.git_kind.value,
            config.git_api_url.value.clone(),
            config.git_token.value.clone(),
        )
    }

    pub fn kind_for(&self, repo: &GitRepositoryInfo) -> GitKind {
        self.kind.unwrap_or_else(|| GitKind::detect(&repo.host))
    }

    pub fn api_base_for(&self, repo: &GitRepositoryInfo) -> String {
        match &self.api_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => self.kind_for(repo).api_base(&repo.host),
        }
    }

    /// Configured token, else the provider's conventional env variable.
    pub fn token_for(&self, kind: GitKind) -> Option<SecretToken> {
        if let Some(token) = &self.token {
            return Some(token.clone());
        }
        kind.token_env_vars().iter().find_map(|var| {
            std::env::var(var)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(SecretToken::new)
        })
    }
}

impl ProviderSource for ProviderFactory {
    fn provider_for(&self, repo: &GitRepositoryInfo) -> Result<Box<dyn GitProvider>, ProviderError> {
        let kind = self.kind_for(repo);
        let token = self
            .token_for(kind)
            .ok_or_else(|| ProviderError::MissingToken {
                kind,
                host: repo.host.clone(),
            })?;
        let api_base = self.api_base_for(repo);
        tracing::debug!(%kind, %api_base, "using source-control provider");
        let provider: Box<dyn GitProvider> = match kind {
            GitKind::GitHub => Box::new(GitHubProvider::new(api_base, token)?),
            GitKind::GitLab => Box::new(GitLabProvider::new(api_base, token)?),
        };
        Ok(provider)
    }
}
