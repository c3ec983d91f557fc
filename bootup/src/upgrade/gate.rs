//! Upgrade gates.
//!
//! The version stream gate compares the recorded ref with the commit the
//! trunk ref resolves to. The comparison is literal: a recorded ref that is
//! still symbolic (say `master`) always reports an upgrade. After the first
//! successful run the recorded ref is a commit sha and the check is exact.
//!
//! The boot-config gate resolves the boot configuration revision pinned by
//! each of two version stream refs and compares those. It is independent of
//! the version stream gate: the stream can move while the boot config it pins
//! stays put.

use super::resolver::{ReferenceResolver, ResolutionError, ScratchClone};
use bootup_common::ResolvedCommit;
use std::path::Path;
use tracing::info;

pub const DEFAULT_BOOT_CONFIG_URL: &str = "https://github.com/jenkins-x/jenkins-x-boot-config.git";
pub const CLOUDBEES_VERSION_STREAM_URL: &str =
    "https://github.com/cloudbees/cloudbees-jenkins-x-versions.git";
pub const CLOUDBEES_BOOT_CONFIG_URL: &str =
    "https://github.com/cloudbees/cloudbees-jenkins-x-boot-config.git";

/// Boot configuration repository for a version stream. An explicit override
/// wins.
pub fn boot_config_url_for(version_stream_url: &str, override_url: Option<&str>) -> String {
    if let Some(url) = override_url {
        return url.to_string();
    }
    if version_stream_url == CLOUDBEES_VERSION_STREAM_URL {
        CLOUDBEES_BOOT_CONFIG_URL.to_string()
    } else {
        DEFAULT_BOOT_CONFIG_URL.to_string()
    }
}

/// `Some(resolved)` when it differs from `current`.
pub fn compare_refs(current: &str, resolved: &str) -> Option<String> {
    (current != resolved).then(|| resolved.to_string())
}

pub struct VersionStreamGate<'r, 'g> {
    resolver: &'r ReferenceResolver<'g>,
}

impl<'r, 'g> VersionStreamGate<'r, 'g> {
    pub fn new(resolver: &'r ReferenceResolver<'g>) -> Self {
        Self { resolver }
    }

    /// Commit to upgrade the version stream to, or `None` when current.
    pub fn upgrade_available(
        &self,
        url: &str,
        current_ref: &str,
        target_ref: &str,
    ) -> Result<Option<String>, ResolutionError> {
        let resolved = self.resolver.resolve_ref(url, target_ref)?;
        match compare_refs(current_ref, &resolved) {
            Some(sha) => {
                info!(from = current_ref, to = %sha, "version stream upgrade available");
                Ok(Some(sha))
            }
            None => {
                info!("No upgrade available");
                Ok(None)
            }
        }
    }
}

/// Boot configuration revisions pinned by the current and candidate streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootConfigDecision {
    pub current: ResolvedCommit,
    pub candidate: ResolvedCommit,
}

impl BootConfigDecision {
    pub fn upgrade_needed(&self) -> bool {
        self.current.sha != self.candidate.sha
    }
}

pub struct BootConfigGate<'r, 'g> {
    resolver: &'r ReferenceResolver<'g>,
}

impl<'r, 'g> BootConfigGate<'r, 'g> {
    pub fn new(resolver: &'r ReferenceResolver<'g>) -> Self {
        Self { resolver }
    }

    /// Resolve both refs. `boot_config_dir` is a clone of `boot_config_url`
    /// holding its release tags.
    pub fn evaluate(
        &self,
        boot_config_dir: &Path,
        boot_config_url: &str,
        version_stream_url: &str,
        current_ref: &str,
        candidate_ref: &str,
    ) -> Result<BootConfigDecision, ResolutionError> {
        let stream = ScratchClone::bare(self.resolver.git(), version_stream_url)?;
        let versions = self
            .resolver
            .version_in(&stream, current_ref, boot_config_url)
            .and_then(|current| {
                let candidate =
                    self.resolver
                        .version_in(&stream, candidate_ref, boot_config_url)?;
                Ok((current, candidate))
            });
        stream.discard();
        let (current_version, candidate_version) = versions?;

        let decision = BootConfigDecision {
            current: self
                .resolver
                .resolve_tag(boot_config_dir, boot_config_url, &current_version)?,
            candidate: self
                .resolver
                .resolve_tag(boot_config_dir, boot_config_url, &candidate_version)?,
        };

        if decision.upgrade_needed() {
            info!(
                "Upgrading from v{} to v{}",
                decision.current.display_version, decision.candidate.display_version
            );
        } else {
            info!("No boot config upgrade available");
        }
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bootup_common::MockGit;
    use proptest::prelude::*;

    const STREAM: &str = "https://github.com/jenkins-x/jenkins-x-versions.git";
    const LOCK: &str = "git/github.com/jenkins-x/jenkins-x-boot-config.yml";

    #[test]
    fn boot_config_url_derivation() {
        assert_eq!(boot_config_url_for(STREAM, None), DEFAULT_BOOT_CONFIG_URL);
        assert_eq!(
            boot_config_url_for(CLOUDBEES_VERSION_STREAM_URL, None),
            CLOUDBEES_BOOT_CONFIG_URL
        );
        assert_eq!(
            boot_config_url_for(CLOUDBEES_VERSION_STREAM_URL, Some("https://example.com/o/boot.git")),
            "https://example.com/o/boot.git"
        );
    }

    #[test]
    fn version_stream_gate_detects_upgrade() {
        let git = MockGit::default();
        git.add_ref(STREAM, "master", "def456");
        let resolver = ReferenceResolver::new(&git);
        let gate = VersionStreamGate::new(&resolver);

        assert_eq!(
            gate.upgrade_available(STREAM, "abc123", "master").unwrap(),
            Some("def456".to_string())
        );
        assert_eq!(gate.upgrade_available(STREAM, "def456", "master").unwrap(), None);
    }

    #[test]
    fn symbolic_recorded_ref_always_reports_upgrade() {
        let git = MockGit::default();
        git.add_ref(STREAM, "master", "def456");
        let resolver = ReferenceResolver::new(&git);
        let gate = VersionStreamGate::new(&resolver);

        assert_eq!(
            gate.upgrade_available(STREAM, "master", "master").unwrap(),
            Some("def456".to_string())
        );
    }

    fn boot_config_fixture(current_version: &str, candidate_version: &str) -> MockGit {
        let git = MockGit::default();
        git.add_file(STREAM, "abc123", LOCK, &format!("version: {}\n", current_version))
            .add_file(STREAM, "def456", LOCK, &format!("version: {}\n", candidate_version))
            .add_ref(DEFAULT_BOOT_CONFIG_URL, "v1.0.0", "b100")
            .add_ref(DEFAULT_BOOT_CONFIG_URL, "v1.1.0", "b110");
        git
    }

    #[test]
    fn boot_config_gate_reports_transition() {
        let git = boot_config_fixture("1.0.0", "1.1.0");
        let resolver = ReferenceResolver::new(&git);
        let boot = ScratchClone::bare(&git, DEFAULT_BOOT_CONFIG_URL).unwrap();

        let decision = BootConfigGate::new(&resolver)
            .evaluate(boot.path(), DEFAULT_BOOT_CONFIG_URL, STREAM, "abc123", "def456")
            .unwrap();
        assert!(decision.upgrade_needed());
        assert_eq!(decision.current.sha, "b100");
        assert_eq!(decision.candidate.sha, "b110");
        assert_eq!(decision.candidate.display_version, "1.1.0");
    }

    #[test]
    fn boot_config_gate_no_upgrade_when_pinned_version_unchanged() {
        let git = boot_config_fixture("1.0.0", "1.0.0");
        let resolver = ReferenceResolver::new(&git);
        let boot = ScratchClone::bare(&git, DEFAULT_BOOT_CONFIG_URL).unwrap();

        let decision = BootConfigGate::new(&resolver)
            .evaluate(boot.path(), DEFAULT_BOOT_CONFIG_URL, STREAM, "abc123", "def456")
            .unwrap();
        assert!(!decision.upgrade_needed());
    }

    #[test]
    fn boot_config_gate_missing_tag() {
        let git = boot_config_fixture("1.0.0", "2.0.0");
        let resolver = ReferenceResolver::new(&git);
        let boot = ScratchClone::bare(&git, DEFAULT_BOOT_CONFIG_URL).unwrap();

        let err = BootConfigGate::new(&resolver)
            .evaluate(boot.path(), DEFAULT_BOOT_CONFIG_URL, STREAM, "abc123", "def456")
            .unwrap_err();
        assert!(matches!(err, ResolutionError::TagMissing { ref tag, .. } if tag == "v2.0.0"));
    }

    proptest! {
        #[test]
        fn equal_refs_never_report_upgrade(r in "[0-9a-f]{7,40}") {
            prop_assert_eq!(compare_refs(&r, &r), None);
        }

        #[test]
        fn differing_refs_report_the_resolved_commit(
            current in "[0-9a-f]{40}",
            resolved in "[0-9a-f]{40}",
        ) {
            prop_assume!(current != resolved);
            prop_assert_eq!(compare_refs(&current, &resolved), Some(resolved.clone()));
        }

        #[test]
        fn equal_boot_config_shas_need_no_upgrade(
            sha in "[0-9a-f]{40}",
            from in "[0-9]\\.[0-9]\\.[0-9]",
            to in "[0-9]\\.[0-9]\\.[0-9]",
        ) {
            let decision = BootConfigDecision {
                current: ResolvedCommit { sha: sha.clone(), display_version: from },
                candidate: ResolvedCommit { sha, display_version: to },
            };
            prop_assert!(!decision.upgrade_needed());
        }
    }
}
