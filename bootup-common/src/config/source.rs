//! Source tracking for configuration values.

use serde::Serialize;
use std::fmt;

/// Where a configuration value came from, in increasing precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
    Cli,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::File => write!(f, "file"),
            Self::Environment => write!(f, "env"),
            Self::Cli => write!(f, "cli"),
        }
    }
}

/// A configuration value together with its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sourced<T> {
    pub value: T,
    pub source: ConfigSource,
    /// Variable name, file path or CLI flag that supplied the value.
    pub origin: Option<String>,
}

impl<T> Sourced<T> {
    pub fn default_value(value: T) -> Self {
        Self {
            value,
            source: ConfigSource::Default,
            origin: None,
        }
    }

    pub fn from_env(value: T, var: impl Into<String>) -> Self {
        Self {
            value,
            source: ConfigSource::Environment,
            origin: Some(var.into()),
        }
    }

    pub fn from_file(value: T, path: impl Into<String>) -> Self {
        Self {
            value,
            source: ConfigSource::File,
            origin: Some(path.into()),
        }
    }

    pub fn from_cli(value: T, flag: impl Into<String>) -> Self {
        Self {
            value,
            source: ConfigSource::Cli,
            origin: Some(flag.into()),
        }
    }

    /// Human-readable provenance, e.g. `env (BOOTUP_TRUNK_BRANCH)`.
    pub fn describe_source(&self) -> String {
        match &self.origin {
            Some(origin) => format!("{} ({})", self.source, origin),
            None => self.source.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_origin_when_present() {
        assert_eq!(Sourced::default_value(1).describe_source(), "default");
        assert_eq!(
            Sourced::from_env("x", "BOOTUP_PR_LABEL").describe_source(),
            "env (BOOTUP_PR_LABEL)"
        );
        assert_eq!(
            Sourced::from_cli("main", "--trunk").describe_source(),
            "cli (--trunk)"
        );
    }

    #[test]
    fn sources_are_ordered_by_precedence() {
        assert!(ConfigSource::Default < ConfigSource::File);
        assert!(ConfigSource::File < ConfigSource::Environment);
        assert!(ConfigSource::Environment < ConfigSource::Cli);
    }
}
