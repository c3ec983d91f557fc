//! The GitOps requirements document (`jx-requirements.yml`).
//!
//! Only `versionStream.url` and `versionStream.ref` are interpreted. The rest
//! of the document is held as an opaque YAML tree and written back untouched.

use crate::errors::ErrorCode;
use crate::types::VersionStreamRef;
use serde_yaml_ng::{Mapping, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const REQUIREMENTS_FILE_NAME: &str = "jx-requirements.yml";

const VERSION_STREAM_KEY: &str = "versionStream";

#[derive(Debug, Error)]
pub enum RequirementsError {
    #[error(
        "no {file} found in {dir}; ensure you are running this command inside a GitOps clone"
    )]
    NotFound { file: String, dir: PathBuf },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },

    #[error("{path} has no {field} setting")]
    MissingField { path: PathBuf, field: &'static str },

    #[error("failed to write {path}: {reason}")]
    Write { path: PathBuf, reason: String },
}

impl RequirementsError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::RequirementsNotFound,
            Self::Read { .. } | Self::Parse { .. } | Self::MissingField { .. } => {
                ErrorCode::RequirementsParseError
            }
            Self::Write { .. } => ErrorCode::RequirementsWriteError,
        }
    }
}

/// A loaded requirements document.
#[derive(Debug, Clone)]
pub struct RequirementsDocument {
    path: PathBuf,
    root: Value,
}

impl RequirementsDocument {
    /// Load `file_name` from `dir`.
    pub fn load(dir: &Path, file_name: &str) -> Result<Self, RequirementsError> {
        let path = dir.join(file_name);
        if !path.is_file() {
            return Err(RequirementsError::NotFound {
                file: file_name.to_string(),
                dir: dir.to_path_buf(),
            });
        }
        let contents = std::fs::read_to_string(&path).map_err(|source| RequirementsError::Read {
            path: path.clone(),
            source,
        })?;
        Self::parse(path, &contents)
    }

    fn parse(path: PathBuf, contents: &str) -> Result<Self, RequirementsError> {
        let root: Value =
            serde_yaml_ng::from_str(contents).map_err(|source| RequirementsError::Parse {
                path: path.clone(),
                source,
            })?;
        let root = match root {
            Value::Null => Value::Mapping(Mapping::new()),
            other => other,
        };
        Ok(Self { path, root })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn version_stream_section(&self) -> Option<&Mapping> {
        self.root.get(VERSION_STREAM_KEY)?.as_mapping()
    }

    fn string_field(&self, field: &'static str) -> Result<String, RequirementsError> {
        self.version_stream_section()
            .and_then(|section| section.get(field))
            .and_then(Value::as_str)
            .map(str::to_string)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| RequirementsError::MissingField {
                path: self.path.clone(),
                field: match field {
                    "url" => "versionStream.url",
                    _ => "versionStream.ref",
                },
            })
    }

    /// The pinned version stream.
    pub fn version_stream(&self) -> Result<VersionStreamRef, RequirementsError> {
        Ok(VersionStreamRef {
            url: self.string_field("url")?,
            git_ref: self.string_field("ref")?,
        })
    }

    /// Record `new_ref` as the pinned ref. Returns `false` and leaves the
    /// document untouched when the ref is already `new_ref`.
    pub fn set_version_stream_ref(&mut self, new_ref: &str) -> Result<bool, RequirementsError> {
        let current = self
            .version_stream_section()
            .and_then(|section| section.get("ref"))
            .and_then(Value::as_str);
        if current == Some(new_ref) {
            return Ok(false);
        }

        let path = self.path.clone();
        let Some(root) = self.root.as_mapping_mut() else {
            return Err(RequirementsError::Write {
                path,
                reason: "document root is not a mapping".to_string(),
            });
        };
        let section = root
            .entry(Value::from(VERSION_STREAM_KEY))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
        let Some(section) = section.as_mapping_mut() else {
            return Err(RequirementsError::Write {
                path,
                reason: format!("{} is not a mapping", VERSION_STREAM_KEY),
            });
        };
        section.insert(Value::from("ref"), Value::from(new_ref));
        Ok(true)
    }

    /// Write the document back to where it was loaded from.
    pub fn save(&self) -> Result<(), RequirementsError> {
        let contents = serde_yaml_ng::to_string(&self.root).map_err(|e| RequirementsError::Write {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        std::fs::write(&self.path, contents).map_err(|e| RequirementsError::Write {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }
}
