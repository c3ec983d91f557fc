//! The upgrade workflow.
//!
//! ```text
//! read requirements -> version stream gate --(no upgrade)--> done
//!                             |
//!                       create branch
//!                             |
//!          boot-config gate -> replay history (when needed)
//!                             |
//!                  record new version stream ref
//!                             |
//!                  push + open/refresh pull request
//!                             |
//!                  back to trunk, delete branch
//! ```
//!
//! Every step runs to completion before the next starts. A failure stops the
//! pipeline and is returned tagged with the stage it happened in. Nothing is
//! rolled back: the working branch and any replayed commits stay where they
//! are so the run can be inspected and resumed by hand.

pub mod branch;
pub mod gate;
pub mod publish;
pub mod reconcile;
pub mod resolver;

use bootup_common::git::{GitClient, GitError};
use bootup_common::provider::ProviderSource;
use bootup_common::{
    CommitRecord, ErrorCode, PullRequestInfo, RequirementsDocument, RequirementsError,
    UpgradeConfig,
};
use branch::{BranchError, BranchLifecycle};
use gate::{BootConfigDecision, BootConfigGate, VersionStreamGate, boot_config_url_for};
use publish::{ChangePublisher, PublishError, upgrade_pull_request};
use reconcile::{HistoryReconciler, ReplayError};
use resolver::{ReferenceResolver, ResolutionError, ScratchClone};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

pub const VERSION_STREAM_COMMIT_MESSAGE: &str = "feat: upgrade version stream";

/// Where in the pipeline a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeStage {
    ReadRequirements,
    CheckVersionStream,
    CheckBootConfig,
    CreateBranch,
    UpdateBootConfig,
    UpdateVersionStream,
    PublishChange,
    CleanupBranch,
}

impl UpgradeStage {
    pub fn description(self) -> &'static str {
        match self {
            Self::ReadRequirements => "read the requirements document",
            Self::CheckVersionStream => "check for a version stream upgrade",
            Self::CheckBootConfig => "check for a boot configuration upgrade",
            Self::CreateBranch => "create the working branch",
            Self::UpdateBootConfig => "upgrade the boot configuration",
            Self::UpdateVersionStream => "update the version stream ref",
            Self::PublishChange => "publish the upgrade pull request",
            Self::CleanupBranch => "clean up the working branch",
        }
    }
}

impl fmt::Display for UpgradeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Underlying cause of an [`UpgradeError`].
#[derive(Debug, Error)]
pub enum StageFailure {
    #[error(transparent)]
    Requirements(#[from] RequirementsError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Replay(#[from] ReplayError),
    #[error(transparent)]
    Branch(#[from] BranchError),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error(transparent)]
    Git(#[from] GitError),
}

impl StageFailure {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Requirements(e) => e.error_code(),
            Self::Resolution(e) => e.error_code(),
            Self::Replay(e) => e.error_code(),
            Self::Branch(e) => e.error_code(),
            Self::Publish(e) => e.error_code(),
            Self::Git(e) => e.error_code(),
        }
    }
}

/// A pipeline failure with the stage it happened in.
#[derive(Debug, Error)]
#[error("failed to {stage}: {source}")]
pub struct UpgradeError {
    pub stage: UpgradeStage,
    #[source]
    pub source: StageFailure,
    /// Working branch left behind for inspection, if one was created.
    pub branch: Option<String>,
}

impl UpgradeError {
    pub fn error_code(&self) -> ErrorCode {
        self.source.error_code()
    }
}

trait StageExt<T> {
    fn stage(self, stage: UpgradeStage) -> Result<T, UpgradeError>;
}

impl<T, E: Into<StageFailure>> StageExt<T> for Result<T, E> {
    fn stage(self, stage: UpgradeStage) -> Result<T, UpgradeError> {
        self.map_err(|e| UpgradeError {
            stage,
            source: e.into(),
            branch: None,
        })
    }
}

fn on_branch(branch: &str) -> impl FnOnce(UpgradeError) -> UpgradeError + '_ {
    move |mut err| {
        err.branch = Some(branch.to_string());
        err
    }
}

/// Settings the workflow reads from [`UpgradeConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeSettings {
    pub trunk_branch: String,
    pub pr_branch_name: String,
    pub pr_label: String,
    pub boot_config_url: Option<String>,
    pub requirements_file: String,
}

impl UpgradeSettings {
    pub fn from_config(config: &UpgradeConfig) -> Self {
        Self {
            trunk_branch: config.trunk_branch.value.clone(),
            pr_branch_name: config.pr_branch_name.value.clone(),
            pr_label: config.pr_label.value.clone(),
            boot_config_url: config.boot_config_url.value.clone(),
            requirements_file: config.requirements_file.value.clone(),
        }
    }
}

impl Default for UpgradeSettings {
    fn default() -> Self {
        Self::from_config(&UpgradeConfig::default())
    }
}

/// Boot configuration change applied during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootConfigUpgrade {
    pub from_version: String,
    pub to_version: String,
    pub applied: Vec<CommitRecord>,
    pub skipped: Vec<CommitRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeOutcome {
    /// The recorded ref already matches trunk.
    UpToDate { version_stream_ref: String },
    Published {
        version_stream_ref: String,
        boot_config: Option<BootConfigUpgrade>,
        pull_request: PullRequestInfo,
    },
}

/// Result of a read-only `check`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub current_ref: String,
    /// Commit the version stream would move to.
    pub candidate_ref: Option<String>,
    pub boot_config: Option<BootConfigDecision>,
}

pub struct Orchestrator<'a> {
    git: &'a dyn GitClient,
    providers: &'a dyn ProviderSource,
    settings: UpgradeSettings,
    dir: PathBuf,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        git: &'a dyn GitClient,
        providers: &'a dyn ProviderSource,
        settings: UpgradeSettings,
        dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            git,
            providers,
            settings,
            dir: dir.into(),
        }
    }

    /// Run the whole pipeline.
    pub fn run(&self) -> Result<UpgradeOutcome, UpgradeError> {
        let requirements = RequirementsDocument::load(&self.dir, &self.settings.requirements_file)
            .stage(UpgradeStage::ReadRequirements)?;
        let stream = requirements
            .version_stream()
            .stage(UpgradeStage::ReadRequirements)?;

        let resolver = ReferenceResolver::new(self.git);
        let Some(upgrade_sha) = VersionStreamGate::new(&resolver)
            .upgrade_available(&stream.url, &stream.git_ref, &self.settings.trunk_branch)
            .stage(UpgradeStage::CheckVersionStream)?
        else {
            return Ok(UpgradeOutcome::UpToDate {
                version_stream_ref: stream.git_ref,
            });
        };

        let lifecycle = BranchLifecycle::new(self.git, &self.dir, &self.settings.trunk_branch);
        let branch = lifecycle.begin().stage(UpgradeStage::CreateBranch)?;

        let boot_config = self
            .update_boot_config(&resolver, &stream.url, &stream.git_ref, &upgrade_sha)
            .stage(UpgradeStage::UpdateBootConfig)
            .map_err(on_branch(&branch))?;

        self.update_version_stream(&upgrade_sha)
            .stage(UpgradeStage::UpdateVersionStream)
            .map_err(on_branch(&branch))?;

        let spec = upgrade_pull_request(&self.settings.pr_branch_name, &self.settings.pr_label);
        let pull_request = ChangePublisher::new(self.git, self.providers)
            .publish(&self.dir, &branch, &self.settings.trunk_branch, &spec)
            .stage(UpgradeStage::PublishChange)
            .map_err(on_branch(&branch))?;

        lifecycle
            .end(&branch)
            .stage(UpgradeStage::CleanupBranch)
            .map_err(on_branch(&branch))?;

        Ok(UpgradeOutcome::Published {
            version_stream_ref: upgrade_sha,
            boot_config,
            pull_request,
        })
    }

    /// Evaluate both gates without touching the working tree.
    pub fn check(&self) -> Result<CheckReport, UpgradeError> {
        let requirements = RequirementsDocument::load(&self.dir, &self.settings.requirements_file)
            .stage(UpgradeStage::ReadRequirements)?;
        let stream = requirements
            .version_stream()
            .stage(UpgradeStage::ReadRequirements)?;

        let resolver = ReferenceResolver::new(self.git);
        let candidate_ref = VersionStreamGate::new(&resolver)
            .upgrade_available(&stream.url, &stream.git_ref, &self.settings.trunk_branch)
            .stage(UpgradeStage::CheckVersionStream)?;

        let boot_config = match &candidate_ref {
            Some(candidate) => {
                let url = self.boot_config_url(&stream.url);
                let clone =
                    ScratchClone::bare(self.git, &url).stage(UpgradeStage::CheckBootConfig)?;
                let decision = BootConfigGate::new(&resolver)
                    .evaluate(clone.path(), &url, &stream.url, &stream.git_ref, candidate)
                    .stage(UpgradeStage::CheckBootConfig);
                clone.discard();
                Some(decision?)
            }
            None => None,
        };

        Ok(CheckReport {
            current_ref: stream.git_ref,
            candidate_ref,
            boot_config,
        })
    }

    fn boot_config_url(&self, version_stream_url: &str) -> String {
        boot_config_url_for(version_stream_url, self.settings.boot_config_url.as_deref())
    }

    fn update_boot_config(
        &self,
        resolver: &ReferenceResolver<'_>,
        version_stream_url: &str,
        current_ref: &str,
        candidate_ref: &str,
    ) -> Result<Option<BootConfigUpgrade>, StageFailure> {
        let url = self.boot_config_url(version_stream_url);
        let clone = ScratchClone::bare(self.git, &url)?;
        let result = self.replay_boot_config(resolver, &clone, version_stream_url, current_ref, candidate_ref);
        clone.discard();
        result
    }

    fn replay_boot_config(
        &self,
        resolver: &ReferenceResolver<'_>,
        clone: &ScratchClone,
        version_stream_url: &str,
        current_ref: &str,
        candidate_ref: &str,
    ) -> Result<Option<BootConfigUpgrade>, StageFailure> {
        let decision = BootConfigGate::new(resolver).evaluate(
            clone.path(),
            clone.url(),
            version_stream_url,
            current_ref,
            candidate_ref,
        )?;
        if !decision.upgrade_needed() {
            return Ok(None);
        }

        let report = HistoryReconciler::new(self.git).reconcile(
            clone.path(),
            &decision.current.sha,
            &decision.candidate.sha,
            &self.dir,
        )?;
        Ok(Some(BootConfigUpgrade {
            from_version: decision.current.display_version,
            to_version: decision.candidate.display_version,
            applied: report.applied,
            skipped: report.skipped,
        }))
    }

    /// Record `upgrade_sha` in the requirements file as the replay left it.
    fn update_version_stream(&self, upgrade_sha: &str) -> Result<(), StageFailure> {
        let mut requirements =
            RequirementsDocument::load(&self.dir, &self.settings.requirements_file)?;
        if !requirements.set_version_stream_ref(upgrade_sha)? {
            debug!("version stream ref already {}", upgrade_sha);
            return Ok(());
        }
        requirements.save()?;
        match self.git.commit_files(
            &self.dir,
            VERSION_STREAM_COMMIT_MESSAGE,
            &[self.settings.requirements_file.as_str()],
        ) {
            Ok(()) => {
                info!(version_stream_ref = upgrade_sha, "recorded new version stream ref");
                Ok(())
            }
            Err(err) if err.is_nothing_to_commit() => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
