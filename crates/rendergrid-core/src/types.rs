//! Shared types used across RenderGrid crates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The two categories of compute pool the controller manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
    /// TURN / signaling relay servers.
    TurnRelay,
    /// Rendering servers that host streaming clients.
    Rendering,
}

impl PoolKind {
    pub fn label(&self) -> &'static str {
        match self {
            PoolKind::TurnRelay => "turn",
            PoolKind::Rendering => "rendering",
        }
    }
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of a configuration check: valid, or the first violated constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidityResult {
    Valid,
    Invalid(String),
}

impl ValidityResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidityResult::Valid)
    }

    /// The diagnostic, or an empty string for a valid configuration.
    pub fn diagnostic(&self) -> &str {
        match self {
            ValidityResult::Valid => "",
            ValidityResult::Invalid(reason) => reason,
        }
    }
}

impl fmt::Display for ValidityResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.diagnostic())
    }
}

impl From<ValidityResult> for String {
    fn from(result: ValidityResult) -> Self {
        match result {
            ValidityResult::Valid => String::new(),
            ValidityResult::Invalid(reason) => reason,
        }
    }
}
