//! GitHub (and GitHub Enterprise) REST v3 provider.

use super::http::{ApiClient, Auth};
use super::{GitKind, GitProvider, ProviderError, PullRequestFilter, PullRequestInfo, RepositoryRecord};
use crate::config::SecretToken;
use crate::types::PullRequestSpec;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeSet;

#[derive(Debug, Deserialize)]
struct Owner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct Repository {
    name: String,
    owner: Owner,
    default_branch: String,
    html_url: String,
    clone_url: String,
}

impl From<Repository> for RepositoryRecord {
    fn from(repo: Repository) -> Self {
        Self {
            organisation: repo.owner.login,
            name: repo.name,
            default_branch: repo.default_branch,
            html_url: repo.html_url,
            clone_url: repo.clone_url,
            id: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Label {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Head {
    #[serde(rename = "ref")]
    git_ref: String,
}

#[derive(Debug, Deserialize)]
struct Pull {
    number: u64,
    html_url: String,
    title: String,
    head: Head,
    #[serde(default)]
    labels: Vec<Label>,
}

impl From<Pull> for PullRequestInfo {
    fn from(pull: Pull) -> Self {
        Self {
            number: pull.number,
            url: pull.html_url,
            title: pull.title,
            head_branch: pull.head.git_ref,
            labels: pull.labels.into_iter().map(|l| l.name).collect(),
        }
    }
}

pub struct GitHubProvider {
    api: ApiClient,
}

impl GitHubProvider {
    pub fn new(api_base: String, token: SecretToken) -> Result<Self, ProviderError> {
        Ok(Self {
            api: ApiClient::new(api_base, Auth::Bearer(token))?,
        })
    }

    fn repo_path(repo: &RepositoryRecord) -> String {
        format!("/repos/{}/{}", repo.organisation, repo.name)
    }
}

impl GitProvider for GitHubProvider {
    fn kind(&self) -> GitKind {
        GitKind::GitHub
    }

    fn get_repository(
        &self,
        organisation: &str,
        name: &str,
    ) -> Result<RepositoryRecord, ProviderError> {
        let repo: Repository = self
            .api
            .get(&format!("/repos/{}/{}", organisation, name), &[])?;
        Ok(repo.into())
    }

    fn find_pull_requests(
        &self,
        repo: &RepositoryRecord,
        filter: &PullRequestFilter,
    ) -> Result<Vec<PullRequestInfo>, ProviderError> {
        let head = format!("{}:{}", repo.organisation, filter.head_branch);
        let pulls: Vec<Pull> = self.api.get(
            &format!("{}/pulls", Self::repo_path(repo)),
            &[("state", "open"), ("head", &head), ("per_page", "100")],
        )?;
        Ok(pulls
            .into_iter()
            .map(PullRequestInfo::from)
            .filter(|pr| filter.matches(pr))
            .collect())
    }

    fn create_pull_request(
        &self,
        repo: &RepositoryRecord,
        spec: &PullRequestSpec,
        base: &str,
    ) -> Result<PullRequestInfo, ProviderError> {
        let pull: Pull = self.api.send(
            Method::POST,
            &format!("{}/pulls", Self::repo_path(repo)),
            &json!({
                "title": spec.title,
                "head": spec.branch_name,
                "base": base,
                "body": spec.message,
            }),
        )?;
        Ok(pull.into())
    }

    fn update_pull_request(
        &self,
        repo: &RepositoryRecord,
        number: u64,
        spec: &PullRequestSpec,
    ) -> Result<PullRequestInfo, ProviderError> {
        let pull: Pull = self.api.send(
            Method::PATCH,
            &format!("{}/pulls/{}", Self::repo_path(repo), number),
            &json!({
                "title": spec.title,
                "body": spec.message,
            }),
        )?;
        Ok(pull.into())
    }

    fn add_labels(
        &self,
        repo: &RepositoryRecord,
        number: u64,
        labels: &BTreeSet<String>,
    ) -> Result<(), ProviderError> {
        let _: Vec<Label> = self.api.send(
            Method::POST,
            &format!("{}/issues/{}/labels", Self::repo_path(repo), number),
            &json!({ "labels": labels }),
        )?;
        Ok(())
    }
}
