//! Change Publisher: push the working branch and open or refresh the upgrade
//! pull request.

use bootup_common::git::{GitClient, GitError};
use bootup_common::provider::ProviderSource;
use bootup_common::{
    ErrorCode, GitRepositoryInfo, GitUrlError, ProviderError, PullRequestFilter, PullRequestInfo,
    PullRequestSpec,
};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;
use tracing::info;

pub const PR_TITLE: &str = "feat(config): upgrade configuration";
pub const PR_MESSAGE: &str = "Upgrade configuration";

/// Failures pushing the upgrade or talking to the source-control provider.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The working directory has no readable origin remote.
    #[error("failed to read the origin remote: {0}")]
    Remote(#[source] GitError),

    /// The origin URL is not a recognisable host/organisation/name remote.
    #[error("cannot parse remote URL {url}: {source}")]
    RemoteUnparseable {
        url: String,
        #[source]
        source: GitUrlError,
    },

    /// Force-pushing the working branch to the PR branch failed.
    #[error("failed to push {branch}: {source}")]
    Push {
        branch: String,
        #[source]
        source: GitError,
    },

    /// A provider API call failed; `action` names the step.
    #[error("failed to {action}: {source}")]
    Provider {
        action: &'static str,
        #[source]
        source: ProviderError,
    },
}

impl PublishError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Remote(err) => err.error_code(),
            Self::RemoteUnparseable { .. } => ErrorCode::PublishRemoteUnparseable,
            Self::Push { .. } => ErrorCode::PublishPushFailed,
            Self::Provider { source, .. } => source.error_code(),
        }
    }
}

/// The upgrade pull request for a given PR branch and label.
pub fn upgrade_pull_request(branch_name: &str, label: &str) -> PullRequestSpec {
    PullRequestSpec {
        branch_name: branch_name.to_string(),
        title: PR_TITLE.to_string(),
        message: PR_MESSAGE.to_string(),
        labels: BTreeSet::from([label.to_string()]),
    }
}

pub struct ChangePublisher<'a> {
    git: &'a dyn GitClient,
    providers: &'a dyn ProviderSource,
}

impl<'a> ChangePublisher<'a> {
    pub fn new(git: &'a dyn GitClient, providers: &'a dyn ProviderSource) -> Self {
        Self { git, providers }
    }

    /// Push `local_branch` as `spec.branch_name` and make sure exactly one
    /// labelled pull request into `base` exists for it.
    pub fn publish(
        &self,
        dir: &Path,
        local_branch: &str,
        base: &str,
        spec: &PullRequestSpec,
    ) -> Result<PullRequestInfo, PublishError> {
        let remote = self.git.remote_url(dir).map_err(PublishError::Remote)?;
        let identity =
            GitRepositoryInfo::parse(&remote).map_err(|source| PublishError::RemoteUnparseable {
                url: bootup_common::util::mask_url_credentials(&remote),
                source,
            })?;

        let provider_err = |action: &'static str| {
            move |source: ProviderError| PublishError::Provider { action, source }
        };
        let provider = self
            .providers
            .provider_for(&identity)
            .map_err(provider_err("select a source-control provider"))?;
        let repo = provider
            .get_repository(&identity.organisation, &identity.name)
            .map_err(provider_err("look up the repository"))?;

        self.git
            .push_branch(dir, local_branch, &spec.branch_name, true)
            .map_err(|source| PublishError::Push {
                branch: spec.branch_name.clone(),
                source,
            })?;

        let filter = PullRequestFilter {
            head_branch: spec.branch_name.clone(),
            labels: spec.labels.clone(),
        };
        let existing = provider
            .find_pull_requests(&repo, &filter)
            .map_err(provider_err("list pull requests"))?;

        if let Some(pr) = existing.into_iter().next() {
            let updated = provider
                .update_pull_request(&repo, pr.number, spec)
                .map_err(provider_err("update the pull request"))?;
            info!(url = %updated.url, "updated pull request");
            return Ok(updated);
        }

        let mut created = provider
            .create_pull_request(&repo, spec, base)
            .map_err(provider_err("create the pull request"))?;
        if !spec.labels.is_empty() {
            provider
                .add_labels(&repo, created.number, &spec.labels)
                .map_err(provider_err("label the pull request"))?;
            created.labels.extend(spec.labels.iter().cloned());
        }
        info!(url = %created.url, "created pull request");
        Ok(created)
    }
}
