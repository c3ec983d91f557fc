//! Locating and cloning the dev environment repository when no `--dir` is
//! given.

use bootup_common::git::{GitClient, GitError};
use bootup_common::util::{mask_url_credentials, render_command};
use bootup_common::ErrorCode;
use std::path::PathBuf;
use std::process::Command;
use thiserror::Error;
use tracing::{debug, info};

const SOURCE_URL_JSONPATH: &str = "jsonpath={.spec.source.url}";

#[derive(Debug, Error)]
pub enum DevEnvError {
    #[error("kubectl is not installed or not on PATH")]
    KubectlMissing,

    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("kubectl could not read the dev environment in namespace {namespace}: {stderr}")]
    Kubectl { namespace: String, stderr: String },

    #[error("dev environment in namespace {namespace} has no source URL")]
    NoSourceUrl { namespace: String },

    #[error("failed to create clone directory: {0}")]
    TempDir(#[source] std::io::Error),

    #[error(transparent)]
    Clone(#[from] GitError),
}

impl DevEnvError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::TempDir(_) => ErrorCode::InternalTempDir,
            Self::Clone(err) => err.error_code(),
            _ => ErrorCode::DevEnvironmentUnavailable,
        }
    }
}

/// Finds the clone URL of the dev environment repository.
pub trait DevEnvironmentLocator {
    fn source_url(&self, namespace: &str) -> Result<String, DevEnvError>;
}

/// A URL given on the command line or in the environment.
pub struct StaticLocator(pub String);

impl DevEnvironmentLocator for StaticLocator {
    fn source_url(&self, _namespace: &str) -> Result<String, DevEnvError> {
        Ok(self.0.clone())
    }
}

/// Reads the `dev` Environment resource from the current cluster.
pub struct KubectlLocator {
    program: PathBuf,
}

impl KubectlLocator {
    pub fn locate() -> Result<Self, DevEnvError> {
        which::which("kubectl")
            .map(|program| Self { program })
            .map_err(|_| DevEnvError::KubectlMissing)
    }
}

impl DevEnvironmentLocator for KubectlLocator {
    fn source_url(&self, namespace: &str) -> Result<String, DevEnvError> {
        let args = [
            "get",
            "environments",
            "dev",
            "-n",
            namespace,
            "-o",
            SOURCE_URL_JSONPATH,
        ];
        let command = render_command(&self.program.to_string_lossy(), &args);
        debug!("{}", command);

        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|source| DevEnvError::Spawn { command, source })?;
        if !output.status.success() {
            return Err(DevEnvError::Kubectl {
                namespace: namespace.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        parse_source_url(&String::from_utf8_lossy(&output.stdout), namespace)
    }
}

fn parse_source_url(stdout: &str, namespace: &str) -> Result<String, DevEnvError> {
    let url = stdout.trim().trim_matches('\'');
    if url.is_empty() {
        return Err(DevEnvError::NoSourceUrl {
            namespace: namespace.to_string(),
        });
    }
    Ok(url.to_string())
}

/// Clone the dev environment into a fresh directory that outlives the run.
pub fn clone_dev_environment(
    git: &dyn GitClient,
    locator: &dyn DevEnvironmentLocator,
    namespace: &str,
) -> Result<PathBuf, DevEnvError> {
    let url = locator.source_url(namespace)?;
    let dir = tempfile::Builder::new()
        .prefix("bootup-dev-env-")
        .tempdir()
        .map_err(DevEnvError::TempDir)?
        .keep();
    git.clone_repo(&url, &dir)?;
    info!(
        url = %mask_url_credentials(&url),
        dir = %dir.display(),
        "cloned dev environment"
    );
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bootup_common::{GitCall, MockGit};

    const DEV_ENV: &str = "https://github.com/acme/environment-dev.git";

    #[test]
    fn static_locator_clone_is_kept() {
        let git = MockGit::default();
        let dir = clone_dev_environment(&git, &StaticLocator(DEV_ENV.to_string()), "jx").unwrap();

        assert!(dir.exists());
        assert!(dir
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("bootup-dev-env-"));
        assert_eq!(
            git.calls(),
            vec![GitCall::CloneRepo {
                url: DEV_ENV.to_string(),
                dest: dir.clone(),
            }]
        );
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn clone_failure_keeps_git_error_code() {
        let git = MockGit::default();
        git.fail_clone(DEV_ENV);
        let err = clone_dev_environment(&git, &StaticLocator(DEV_ENV.to_string()), "jx").unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::GitCloneFailed);
    }

    #[test]
    fn kubectl_output_is_trimmed() {
        assert_eq!(
            parse_source_url("'https://github.com/acme/env.git'\n", "jx").unwrap(),
            "https://github.com/acme/env.git"
        );
    }

    #[test]
    fn empty_kubectl_output_is_unavailable() {
        let err = parse_source_url("  \n", "cd").unwrap_err();
        assert!(matches!(err, DevEnvError::NoSourceUrl { ref namespace } if namespace == "cd"));
        assert_eq!(err.error_code(), ErrorCode::DevEnvironmentUnavailable);
    }
}
