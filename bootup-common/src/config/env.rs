//! `BOOTUP_*` environment variables.

use super::source::Sourced;
use std::env;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnvError {
    #[error("Invalid value for {var}: expected {expected}, got '{value}'")]
    InvalidValue {
        var: String,
        expected: String,
        value: String,
    },

    #[error("Invalid log level for {var}: {value}")]
    InvalidLogLevel { var: String, value: String },
}

/// Reads `BOOTUP_*` variables, collecting every bad value instead of
/// stopping at the first.
pub struct EnvParser {
    prefix: &'static str,
    errors: Vec<EnvError>,
}

impl EnvParser {
    pub fn new() -> Self {
        Self {
            prefix: "BOOTUP_",
            errors: Vec::new(),
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn take_errors(&mut self) -> Vec<EnvError> {
        std::mem::take(&mut self.errors)
    }

    pub fn var_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    /// Prefixed name and trimmed value; blank counts as set-but-empty.
    fn lookup(&self, name: &str) -> (String, Option<String>) {
        let var = self.var_name(name);
        let value = env::var(&var).ok().map(|v| v.trim().to_string());
        (var, value)
    }

    /// Value of `name`, or `default` when unset or blank.
    pub fn get_string(&mut self, name: &str, default: &str) -> Sourced<String> {
        match self.lookup(name) {
            (var, Some(value)) if !value.is_empty() => Sourced::from_env(value, var),
            _ => Sourced::default_value(default.to_string()),
        }
    }

    /// A blank value explicitly clears the setting.
    pub fn get_optional_string(&mut self, name: &str) -> Sourced<Option<String>> {
        match self.lookup(name) {
            (var, Some(value)) => Sourced::from_env((!value.is_empty()).then_some(value), var),
            (_, None) => Sourced::default_value(None),
        }
    }

    /// Like [`Self::get_optional_string`], parsed with `FromStr`. A value that
    /// does not parse is recorded and treated as unset.
    pub fn get_optional_parsed<T: FromStr>(
        &mut self,
        name: &str,
        expected: &str,
    ) -> Sourced<Option<T>> {
        let (var, value) = self.lookup(name);
        let Some(value) = value else {
            return Sourced::default_value(None);
        };
        if value.is_empty() {
            return Sourced::from_env(None, var);
        }
        match value.parse::<T>() {
            Ok(parsed) => Sourced::from_env(Some(parsed), var),
            Err(_) => {
                self.errors.push(EnvError::InvalidValue {
                    var,
                    expected: expected.to_string(),
                    value,
                });
                Sourced::default_value(None)
            }
        }
    }

    pub fn get_log_level(&mut self, name: &str, default: &str) -> Sourced<String> {
        const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];
        let (var, value) = self.lookup(name);
        let Some(value) = value else {
            return Sourced::default_value(default.to_string());
        };
        let level = value.to_ascii_lowercase();
        if !LEVELS.contains(&level.as_str()) {
            self.errors.push(EnvError::InvalidLogLevel {
                var: var.clone(),
                value,
            });
            return Sourced::from_env(default.to_string(), var);
        }
        Sourced::from_env(level, var)
    }
}

impl Default for EnvParser {
    fn default() -> Self {
        Self::new()
    }
}
