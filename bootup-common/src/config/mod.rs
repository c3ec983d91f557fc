//! Configuration system for bootup.
//!
//! Values are layered, later layers winning:
//! 1. built-in defaults
//! 2. a TOML file (`--config`, else `$XDG_CONFIG_HOME/bootup/config.toml`)
//! 3. `BOOTUP_*` environment variables
//! 4. CLI flags (applied by the binary through the `set_*` methods)
//!
//! Every value keeps its [`ConfigSource`] so `--verbose` runs can show where a
//! setting came from.

pub mod env;
pub mod source;

pub use env::{EnvError, EnvParser};
pub use source::{ConfigSource, Sourced};

use crate::errors::ErrorCode;
use crate::provider::GitKind;
use crate::requirements::REQUIREMENTS_FILE_NAME;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Trunk branch the upgrade pull request targets.
pub const DEFAULT_TRUNK_BRANCH: &str = "master";
/// Remote branch the upgrade is pushed to; fixed so reruns update one PR.
pub const DEFAULT_PR_BRANCH: &str = "boot_upgrade_branch";
/// Label marking automation-generated upgrade pull requests.
pub const DEFAULT_PR_LABEL: &str = "boot-upgrade";
/// Namespace holding the dev `Environment` resource.
pub const DEFAULT_DEV_NAMESPACE: &str = "jx";
/// Config file name under the user config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid environment configuration: {}", join_env_errors(.0))]
    Env(Vec<EnvError>),

    #[error("invalid configuration: {0}")]
    Validation(String),
}

fn join_env_errors(errors: &[EnvError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ConfigError {
    /// Catalog code for this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Read { .. } => ErrorCode::ConfigReadError,
            Self::Parse { .. } => ErrorCode::ConfigParseError,
            Self::Env(_) => ErrorCode::ConfigEnvError,
            Self::Validation(_) => ErrorCode::ConfigValidationError,
        }
    }
}

/// An access token that never prints its value.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct SecretToken(String);

impl SecretToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretToken(***)")
    }
}

/// On-disk shape of the TOML config file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub trunk_branch: Option<String>,
    pub pr_branch_name: Option<String>,
    pub pr_label: Option<String>,
    pub boot_config_url: Option<String>,
    pub git_kind: Option<GitKind>,
    pub git_api_url: Option<String>,
    pub git_token: Option<SecretToken>,
    pub dev_env_namespace: Option<String>,
    pub requirements_file: Option<String>,
}

/// Fully resolved configuration for one upgrade run.
#[derive(Debug, Clone)]
pub struct UpgradeConfig {
    pub trunk_branch: Sourced<String>,
    pub pr_branch_name: Sourced<String>,
    pub pr_label: Sourced<String>,
    /// Overrides the boot configuration repository derived from the version
    /// stream URL.
    pub boot_config_url: Sourced<Option<String>>,
    /// Overrides provider detection from the remote host.
    pub git_kind: Sourced<Option<GitKind>>,
    /// Overrides the API endpoint derived from the remote host.
    pub git_api_url: Sourced<Option<String>>,
    pub git_token: Sourced<Option<SecretToken>>,
    pub dev_env_namespace: Sourced<String>,
    pub requirements_file: Sourced<String>,
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self {
            trunk_branch: Sourced::default_value(DEFAULT_TRUNK_BRANCH.to_string()),
            pr_branch_name: Sourced::default_value(DEFAULT_PR_BRANCH.to_string()),
            pr_label: Sourced::default_value(DEFAULT_PR_LABEL.to_string()),
            boot_config_url: Sourced::default_value(None),
            git_kind: Sourced::default_value(None),
            git_api_url: Sourced::default_value(None),
            git_token: Sourced::default_value(None),
            dev_env_namespace: Sourced::default_value(DEFAULT_DEV_NAMESPACE.to_string()),
            requirements_file: Sourced::default_value(REQUIREMENTS_FILE_NAME.to_string()),
        }
    }
}

impl UpgradeConfig {
    /// Load defaults, then the config file, then the environment.
    ///
    /// An explicit `config_path` must exist; the default user config file is
    /// optional.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        match config_path {
            Some(path) => config.apply_file(path)?,
            None => {
                if let Some(path) = default_config_path()
                    && path.is_file()
                {
                    config.apply_file(&path)?;
                }
            }
        }

        let mut parser = EnvParser::new();
        config.apply_env(&mut parser);
        if parser.has_errors() {
            return Err(ConfigError::Env(parser.take_errors()));
        }

        config.validate()?;
        Ok(config)
    }

    /// Merge a TOML config file into this configuration.
    pub fn apply_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: FileConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        self.merge_file(file, &path.display().to_string());
        Ok(())
    }

    fn merge_file(&mut self, file: FileConfig, origin: &str) {
        fn set<T>(slot: &mut Sourced<T>, value: Option<T>, origin: &str) {
            if let Some(value) = value {
                *slot = Sourced::from_file(value, origin);
            }
        }

        set(&mut self.trunk_branch, file.trunk_branch, origin);
        set(&mut self.pr_branch_name, file.pr_branch_name, origin);
        set(&mut self.pr_label, file.pr_label, origin);
        set(&mut self.boot_config_url, file.boot_config_url.map(Some), origin);
        set(&mut self.git_kind, file.git_kind.map(Some), origin);
        set(&mut self.git_api_url, file.git_api_url.map(Some), origin);
        set(&mut self.git_token, file.git_token.map(Some), origin);
        set(&mut self.dev_env_namespace, file.dev_env_namespace, origin);
        set(&mut self.requirements_file, file.requirements_file, origin);
    }

    /// Merge `BOOTUP_*` environment variables. Unset variables keep the
    /// current value; parse failures accumulate in `parser`.
    pub fn apply_env(&mut self, parser: &mut EnvParser) {
        fn take_string(slot: &mut Sourced<String>, parser: &mut EnvParser, name: &str) {
            let value = parser.get_string(name, &slot.value);
            if value.source == ConfigSource::Environment {
                *slot = value;
            }
        }

        fn take_optional<T>(slot: &mut Sourced<Option<T>>, value: Sourced<Option<T>>) {
            if value.source == ConfigSource::Environment && value.value.is_some() {
                *slot = value;
            }
        }

        take_string(&mut self.trunk_branch, parser, "TRUNK_BRANCH");
        take_string(&mut self.pr_branch_name, parser, "PR_BRANCH");
        take_string(&mut self.pr_label, parser, "PR_LABEL");
        take_string(&mut self.dev_env_namespace, parser, "NAMESPACE");
        take_string(&mut self.requirements_file, parser, "REQUIREMENTS_FILE");

        let boot_config_url = parser.get_optional_string("BOOT_CONFIG_URL");
        take_optional(&mut self.boot_config_url, boot_config_url);
        let git_kind = parser.get_optional_parsed::<GitKind>("GIT_KIND", "github or gitlab");
        take_optional(&mut self.git_kind, git_kind);
        let git_api_url = parser.get_optional_string("GIT_API_URL");
        take_optional(&mut self.git_api_url, git_api_url);
        let token = parser.get_optional_string("GIT_TOKEN");
        let token = Sourced {
            value: token.value.map(SecretToken::new),
            source: token.source,
            origin: token.origin,
        };
        take_optional(&mut self.git_token, token);
    }

    pub fn set_trunk_branch(&mut self, branch: String, flag: &str) {
        self.trunk_branch = Sourced::from_cli(branch, flag);
    }

    pub fn set_boot_config_url(&mut self, url: String, flag: &str) {
        self.boot_config_url = Sourced::from_cli(Some(url), flag);
    }

    pub fn set_dev_env_namespace(&mut self, namespace: String, flag: &str) {
        self.dev_env_namespace = Sourced::from_cli(namespace, flag);
    }

    /// Check cross-field invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("trunk_branch", &self.trunk_branch),
            ("pr_branch_name", &self.pr_branch_name),
            ("pr_label", &self.pr_label),
            ("requirements_file", &self.requirements_file),
        ] {
            if value.value.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "{} must not be empty (from {})",
                    name,
                    value.describe_source()
                )));
            }
        }

        if self.trunk_branch.value == self.pr_branch_name.value {
            return Err(ConfigError::Validation(format!(
                "pr_branch_name must differ from trunk_branch '{}'",
                self.trunk_branch.value
            )));
        }

        if let Some(api_url) = &self.git_api_url.value
            && !(api_url.starts_with("https://") || api_url.starts_with("http://"))
        {
            return Err(ConfigError::Validation(format!(
                "git_api_url must be an http(s) URL, got '{}'",
                api_url
            )));
        }

        Ok(())
    }

    /// One line per setting with its provenance, for verbose output.
    pub fn describe(&self) -> Vec<String> {
        fn opt<T: fmt::Display>(value: &Option<T>) -> String {
            value
                .as_ref()
                .map_or_else(|| "<derived>".to_string(), ToString::to_string)
        }

        vec![
            format!(
                "trunk_branch = {} [{}]",
                self.trunk_branch.value,
                self.trunk_branch.describe_source()
            ),
            format!(
                "pr_branch_name = {} [{}]",
                self.pr_branch_name.value,
                self.pr_branch_name.describe_source()
            ),
            format!(
                "pr_label = {} [{}]",
                self.pr_label.value,
                self.pr_label.describe_source()
            ),
            format!(
                "boot_config_url = {} [{}]",
                opt(&self.boot_config_url.value),
                self.boot_config_url.describe_source()
            ),
            format!(
                "git_kind = {} [{}]",
                opt(&self.git_kind.value),
                self.git_kind.describe_source()
            ),
            format!(
                "git_api_url = {} [{}]",
                opt(&self.git_api_url.value),
                self.git_api_url.describe_source()
            ),
            format!(
                "git_token = {} [{}]",
                if self.git_token.value.is_some() { "***" } else { "<unset>" },
                self.git_token.describe_source()
            ),
            format!(
                "dev_env_namespace = {} [{}]",
                self.dev_env_namespace.value,
                self.dev_env_namespace.describe_source()
            ),
            format!(
                "requirements_file = {} [{}]",
                self.requirements_file.value,
                self.requirements_file.describe_source()
            ),
        ]
    }
}

/// `$XDG_CONFIG_HOME/bootup/config.toml` (or the platform equivalent).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("bootup").join(CONFIG_FILE_NAME))
}

#[cfg(test)]
pub(crate) fn env_test_lock() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;
    use std::io::Write;

    const ALL_VARS: &[&str] = &[
        "BOOTUP_TRUNK_BRANCH",
        "BOOTUP_PR_BRANCH",
        "BOOTUP_PR_LABEL",
        "BOOTUP_NAMESPACE",
        "BOOTUP_REQUIREMENTS_FILE",
        "BOOTUP_BOOT_CONFIG_URL",
        "BOOTUP_GIT_KIND",
        "BOOTUP_GIT_API_URL",
        "BOOTUP_GIT_TOKEN",
    ];

    fn cleanup_env() {
        for var in ALL_VARS {
            // SAFETY: Tests serialize on env_test_lock, no concurrent access to env vars
            unsafe { std::env::remove_var(var) };
        }
    }

    fn set_env(key: &str, value: &str) {
        // SAFETY: Tests serialize on env_test_lock, no concurrent access to env vars
        unsafe { std::env::set_var(key, value) };
    }

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_validate() {
        let config = UpgradeConfig::default();
        config.validate().unwrap();
        assert_eq!(config.trunk_branch.value, "master");
        assert_eq!(config.pr_branch_name.value, "boot_upgrade_branch");
        assert_eq!(config.pr_label.value, "boot-upgrade");
        assert_eq!(config.requirements_file.value, "jx-requirements.yml");
    }

    #[test]
    fn file_then_env_layering() {
        let _guard = env_test_lock();
        cleanup_env();

        let file = write_config(
            r#"
trunk_branch = "main"
pr_label = "from-file"
git_kind = "gitlab"
git_token = "file-token"
"#,
        );
        set_env("BOOTUP_PR_LABEL", "from-env");

        let config = UpgradeConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.trunk_branch.value, "main");
        assert_eq!(config.trunk_branch.source, ConfigSource::File);
        assert_eq!(config.pr_label.value, "from-env");
        assert_eq!(config.pr_label.source, ConfigSource::Environment);
        assert_eq!(config.git_kind.value, Some(GitKind::GitLab));
        assert_eq!(
            config.git_token.value.as_ref().map(SecretToken::expose),
            Some("file-token")
        );

        cleanup_env();
    }

    #[test]
    fn env_errors_are_accumulated() {
        let _guard = env_test_lock();
        cleanup_env();

        set_env("BOOTUP_GIT_KIND", "bitbucket-cloud");
        let err = UpgradeConfig::load(Some(write_config("").path())).unwrap_err();
        assert!(matches!(err, ConfigError::Env(ref errors) if errors.len() == 1));
        assert_eq!(err.error_code(), ErrorCode::ConfigEnvError);

        cleanup_env();
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        let _guard = env_test_lock();
        cleanup_env();

        let file = write_config("trunk = \"main\"\n");
        let err = UpgradeConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert_eq!(err.error_code(), ErrorCode::ConfigParseError);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = UpgradeConfig::load(Some(Path::new("/nonexistent/bootup.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn trunk_equal_to_pr_branch_is_invalid() {
        let mut config = UpgradeConfig::default();
        config.set_trunk_branch("boot_upgrade_branch".to_string(), "--trunk");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must differ from trunk_branch"));
    }

    #[test]
    fn non_http_api_url_is_invalid() {
        let mut config = UpgradeConfig::default();
        config.git_api_url = Sourced::from_env(Some("ftp://x".to_string()), "BOOTUP_GIT_API_URL");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn token_never_appears_in_debug_or_describe() {
        let mut config = UpgradeConfig::default();
        config.git_token = Sourced::from_env(Some(SecretToken::new("ghp_secret")), "BOOTUP_GIT_TOKEN");
        assert!(!format!("{:?}", config).contains("ghp_secret"));
        assert!(config.describe().iter().all(|line| !line.contains("ghp_secret")));
        assert!(
            config
                .describe()
                .contains(&"git_token = *** [env (BOOTUP_GIT_TOKEN)]".to_string())
        );
    }

    #[test]
    fn cli_overrides_win() {
        let mut config = UpgradeConfig::default();
        config.set_boot_config_url("https://example.com/o/boot.git".to_string(), "--boot-config-url");
        assert_eq!(config.boot_config_url.source, ConfigSource::Cli);
        assert_eq!(
            config.boot_config_url.value.as_deref(),
            Some("https://example.com/o/boot.git")
        );
    }
}
