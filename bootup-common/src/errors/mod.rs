//! Error catalog and definitions for bootup
//!
//! Each collaborator owns its own `thiserror` enum (`GitError`,
//! `ProviderError`, `RequirementsError`, `ConfigError`); every one of them maps
//! into the catalog below through an `error_code()` method so the CLI can
//! print a stable code and remediation steps.
//!
//! # Error Code Ranges
//!
//! | Range      | Category     | Description                                  |
//! |------------|--------------|----------------------------------------------|
//! | E001-E099  | Config       | Configuration and requirements document      |
//! | E100-E199  | Git          | Local git invocation errors                  |
//! | E200-E299  | Resolution   | Ref, version lock and tag lookups            |
//! | E300-E399  | Replay       | History replay and branch lifecycle          |
//! | E400-E499  | Publish      | Push and source-control provider API         |
//! | E500-E599  | Internal     | Internal/unexpected errors                   |

pub mod catalog;

pub use catalog::{ErrorCategory, ErrorCode, ErrorEntry};
