//! Version-lock files inside a version stream repository.
//!
//! Each git component is pinned by a YAML file at
//! `git/<host>/<owner>/<repo>.yml`:
//!
//! ```yaml
//! version: 1.0.42
//! gitUrl: https://github.com/jenkins-x/jenkins-x-boot-config.git
//! ```

use crate::types::component_key;
use regex::Regex;
use serde::Deserialize;
use serde_yaml_ng::Value;
use std::sync::LazyLock;

/// Top-level `version:` line, capturing the scalar as written.
static VERSION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^version:[ \t]*([^\s#]+)").expect("version line regex is valid")
});

/// Parsed contents of one lock file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionLock {
    pub version: Option<String>,
    pub git_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLock {
    #[serde(default)]
    version: Option<Value>,
    #[serde(default)]
    git_url: Option<String>,
}

impl VersionLock {
    /// Path of the lock file for a component URL, relative to the stream root.
    pub fn path_for(component_url: &str) -> String {
        format!("git/{}.yml", component_key(component_url))
    }

    pub fn parse(contents: &str) -> Result<Self, serde_yaml_ng::Error> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: RawLock = serde_yaml_ng::from_str(contents)?;
        // an unquoted `1.10` parses as the float 1.1, so take the source text
        let version = raw.version.and_then(|v| match v {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(
                VERSION_LINE
                    .captures(contents)
                    .and_then(|c| c.get(1))
                    .map_or_else(|| n.to_string(), |m| m.as_str().to_string()),
            ),
            _ => None,
        });
        Ok(Self {
            version,
            git_url: raw.git_url,
        })
    }

    /// The pinned version with any leading `v` removed; `None` when blank.
    pub fn pinned_version(&self) -> Option<&str> {
        self.version
            .as_deref()
            .map(str::trim)
            .map(|v| v.strip_prefix('v').unwrap_or(v))
            .filter(|v| !v.is_empty())
    }
}

/// Tag naming convention mapping a component version to a commit.
pub fn release_tag(version: &str) -> String {
    format!("v{}", version)
}
