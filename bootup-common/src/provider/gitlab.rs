//! GitLab REST v4 provider. Pull requests are merge requests here.

use super::http::{ApiClient, Auth};
use super::{GitKind, GitProvider, ProviderError, PullRequestFilter, PullRequestInfo, RepositoryRecord};
use crate::config::SecretToken;
use crate::types::PullRequestSpec;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeSet;

#[derive(Debug, Deserialize)]
struct Project {
    id: u64,
    path: String,
    path_with_namespace: String,
    #[serde(default)]
    default_branch: Option<String>,
    web_url: String,
    http_url_to_repo: String,
}

impl From<Project> for RepositoryRecord {
    fn from(project: Project) -> Self {
        let organisation = project
            .path_with_namespace
            .rsplit_once('/')
            .map(|(namespace, _)| namespace.to_string())
            .unwrap_or_default();
        Self {
            organisation,
            name: project.path,
            default_branch: project.default_branch.unwrap_or_else(|| "master".to_string()),
            html_url: project.web_url,
            clone_url: project.http_url_to_repo,
            id: Some(project.id),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MergeRequest {
    iid: u64,
    web_url: String,
    title: String,
    source_branch: String,
    #[serde(default)]
    labels: Vec<String>,
}

impl From<MergeRequest> for PullRequestInfo {
    fn from(mr: MergeRequest) -> Self {
        Self {
            number: mr.iid,
            url: mr.web_url,
            title: mr.title,
            head_branch: mr.source_branch,
            labels: mr.labels.into_iter().collect(),
        }
    }
}

/// Project path as GitLab expects it in a URL segment.
fn encode_project(path: &str) -> String {
    path.replace('/', "%2F")
}

fn join_labels(labels: &BTreeSet<String>) -> String {
    labels.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

pub struct GitLabProvider {
    api: ApiClient,
}

impl GitLabProvider {
    pub fn new(api_base: String, token: SecretToken) -> Result<Self, ProviderError> {
        Ok(Self {
            api: ApiClient::new(api_base, Auth::PrivateToken(token))?,
        })
    }

    fn project_path(repo: &RepositoryRecord) -> String {
        match repo.id {
            Some(id) => format!("/projects/{}", id),
            None => format!("/projects/{}", encode_project(&repo.full_name())),
        }
    }
}

impl GitProvider for GitLabProvider {
    fn kind(&self) -> GitKind {
        GitKind::GitLab
    }

    fn get_repository(
        &self,
        organisation: &str,
        name: &str,
    ) -> Result<RepositoryRecord, ProviderError> {
        let path = format!("{}/{}", organisation, name);
        let project: Project = self
            .api
            .get(&format!("/projects/{}", encode_project(&path)), &[])?;
        Ok(project.into())
    }

    fn find_pull_requests(
        &self,
        repo: &RepositoryRecord,
        filter: &PullRequestFilter,
    ) -> Result<Vec<PullRequestInfo>, ProviderError> {
        let labels = join_labels(&filter.labels);
        let mut query = vec![
            ("state", "opened"),
            ("source_branch", filter.head_branch.as_str()),
        ];
        if !labels.is_empty() {
            query.push(("labels", labels.as_str()));
        }
        let requests: Vec<MergeRequest> = self.api.get(
            &format!("{}/merge_requests", Self::project_path(repo)),
            &query,
        )?;
        Ok(requests
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
        let mr: MergeRequest = self.api.send(
            Method::POST,
            &format!("{}/merge_requests", Self::project_path(repo)),
            &json!({
                "source_branch": spec.branch_name,
                "target_branch": base,
                "title": spec.title,
                "description": spec.message,
                "labels": join_labels(&spec.labels),
            }),
        )?;
        Ok(mr.into())
    }

    fn update_pull_request(
        &self,
        repo: &RepositoryRecord,
        number: u64,
        spec: &PullRequestSpec,
    ) -> Result<PullRequestInfo, ProviderError> {
        let mr: MergeRequest = self.api.send(
            Method::PUT,
            &format!("{}/merge_requests/{}", Self::project_path(repo), number),
            &json!({
                "title": spec.title,
                "description": spec.message,
            }),
        )?;
        Ok(mr.into())
    }

    fn add_labels(
        &self,
        repo: &RepositoryRecord,
        number: u64,
        labels: &BTreeSet<String>,
    ) -> Result<(), ProviderError> {
        let _: MergeRequest = self.api.send(
            Method::PUT,
            &format!("{}/merge_requests/{}", Self::project_path(repo), number),
            &json!({ "add_labels": join_labels(labels) }),
        )?;
        Ok(())
    }
}
