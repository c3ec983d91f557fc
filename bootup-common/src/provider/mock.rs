//! Recording provider double.

use super::{
    GitKind, GitProvider, ProviderError, ProviderSource, PullRequestFilter, PullRequestInfo,
    RepositoryRecord,
};
use crate::types::{GitRepositoryInfo, PullRequestSpec};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    GetRepository { full_name: String },
    FindPullRequests { head_branch: String, labels: BTreeSet<String> },
    CreatePullRequest { spec: PullRequestSpec, base: String },
    UpdatePullRequest { number: u64, spec: PullRequestSpec },
    AddLabels { number: u64, labels: BTreeSet<String> },
}

#[derive(Debug, Default)]
struct State {
    open: Vec<PullRequestInfo>,
    next_number: u64,
    fail_with: Option<(u16, String)>,
    calls: Vec<ProviderCall>,
}

/// In-memory provider that keeps a list of open pull requests.
///
/// Clones share state; [`ProviderSource`] hands out clones of itself.
#[derive(Debug, Clone)]
pub struct MockProvider {
    kind: GitKind,
    state: Arc<Mutex<State>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new(GitKind::GitHub)
    }
}

impl MockProvider {
    pub fn new(kind: GitKind) -> Self {
        Self {
            kind,
            state: Arc::new(Mutex::new(State {
                next_number: 1,
                ..State::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed an already-open pull request.
    pub fn with_open_pull_request(&self, pr: PullRequestInfo) -> &Self {
        let mut state = self.lock();
        state.next_number = state.next_number.max(pr.number + 1);
        state.open.push(pr);
        self
    }

    /// Make every API call fail with this HTTP status.
    pub fn fail_with(&self, status: u16, body: &str) -> &Self {
        self.lock().fail_with = Some((status, body.to_string()));
        self
    }

    #[must_use]
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.lock().calls.clone()
    }

    #[must_use]
    pub fn open_pull_requests(&self) -> Vec<PullRequestInfo> {
        self.lock().open.clone()
    }

    fn record(&self, call: ProviderCall) -> Result<MutexGuard<'_, State>, ProviderError> {
        let mut state = self.lock();
        state.calls.push(call);
        if let Some((status, body)) = &state.fail_with {
            return Err(ProviderError::Api {
                url: "mock://provider".to_string(),
                status: *status,
                body: body.clone(),
            });
        }
        Ok(state)
    }
}

impl GitProvider for MockProvider {
    fn kind(&self) -> GitKind {
        self.kind
    }

    fn get_repository(
        &self,
        organisation: &str,
        name: &str,
    ) -> Result<RepositoryRecord, ProviderError> {
        self.record(ProviderCall::GetRepository {
            full_name: format!("{}/{}", organisation, name),
        })?;
        Ok(RepositoryRecord {
            organisation: organisation.to_string(),
            name: name.to_string(),
            default_branch: "master".to_string(),
            html_url: format!("https://mock.example/{}/{}", organisation, name),
            clone_url: format!("https://mock.example/{}/{}.git", organisation, name),
            id: None,
        })
    }

    fn find_pull_requests(
        &self,
        _repo: &RepositoryRecord,
        filter: &PullRequestFilter,
    ) -> Result<Vec<PullRequestInfo>, ProviderError> {
        let state = self.record(ProviderCall::FindPullRequests {
            head_branch: filter.head_branch.clone(),
            labels: filter.labels.clone(),
        })?;
        Ok(state
            .open
            .iter()
            .filter(|pr| filter.matches(pr))
            .cloned()
            .collect())
    }

    fn create_pull_request(
        &self,
        repo: &RepositoryRecord,
        spec: &PullRequestSpec,
        base: &str,
    ) -> Result<PullRequestInfo, ProviderError> {
        let mut state = self.record(ProviderCall::CreatePullRequest {
            spec: spec.clone(),
            base: base.to_string(),
        })?;
        let number = state.next_number;
        state.next_number += 1;
        let pr = PullRequestInfo {
            number,
            url: format!("{}/pull/{}", repo.html_url, number),
            title: spec.title.clone(),
            head_branch: spec.branch_name.clone(),
            labels: BTreeSet::new(),
        };
        state.open.push(pr.clone());
        Ok(pr)
    }

    fn update_pull_request(
        &self,
        _repo: &RepositoryRecord,
        number: u64,
        spec: &PullRequestSpec,
    ) -> Result<PullRequestInfo, ProviderError> {
        let mut state = self.record(ProviderCall::UpdatePullRequest {
            number,
            spec: spec.clone(),
        })?;
        let pr = state
            .open
            .iter_mut()
            .find(|pr| pr.number == number)
            .ok_or_else(|| ProviderError::NotFound(format!("pull request #{}", number)))?;
        pr.title = spec.title.clone();
        Ok(pr.clone())
    }

    fn add_labels(
        &self,
        _repo: &RepositoryRecord,
        number: u64,
        labels: &BTreeSet<String>,
    ) -> Result<(), ProviderError> {
        let mut state = self.record(ProviderCall::AddLabels {
            number,
            labels: labels.clone(),
        })?;
        let pr = state
            .open
            .iter_mut()
            .find(|pr| pr.number == number)
            .ok_or_else(|| ProviderError::NotFound(format!("pull request #{}", number)))?;
        pr.labels.extend(labels.iter().cloned());
        Ok(())
    }
}

impl ProviderSource for MockProvider {
    fn provider_for(&self, _repo: &GitRepositoryInfo) -> Result<Box<dyn GitProvider>, ProviderError> {
        Ok(Box::new(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> PullRequestSpec {
        PullRequestSpec {
            branch_name: "boot_upgrade_branch".to_string(),
            title: "feat(config): upgrade configuration".to_string(),
            message: "Upgrade configuration".to_string(),
            labels: BTreeSet::from(["boot-upgrade".to_string()]),
        }
    }

    #[test]
    fn created_pull_requests_become_findable_once_labelled() {
        let provider = MockProvider::default();
        let repo = provider.get_repository("acme", "env").unwrap();
        let filter = PullRequestFilter {
            head_branch: "boot_upgrade_branch".to_string(),
            labels: spec().labels,
        };

        let pr = provider.create_pull_request(&repo, &spec(), "master").unwrap();
        assert!(provider.find_pull_requests(&repo, &filter).unwrap().is_empty());

        provider.add_labels(&repo, pr.number, &spec().labels).unwrap();
        assert_eq!(provider.find_pull_requests(&repo, &filter).unwrap().len(), 1);
    }

    #[test]
    fn scripted_failure_applies_to_every_call() {
        let provider = MockProvider::default();
        provider.fail_with(502, "bad gateway");
        let err = provider.get_repository("acme", "env").unwrap_err();
        assert!(matches!(err, ProviderError::Api { status: 502, .. }));
        assert_eq!(provider.calls().len(), 1);
    }

    #[test]
    fn update_of_unknown_pull_request_is_not_found() {
        let provider = MockProvider::default();
        let repo = provider.get_repository("acme", "env").unwrap();
        assert!(matches!(
            provider.update_pull_request(&repo, 99, &spec()),
            Err(ProviderError::NotFound(_))
        ));
    }
}
