//! Typed verdicts and their persistence.

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, read_to_string, write};
use std::path::Path;

/// Machine-readable cause of a failed evaluation unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The model collaborator could not be reached or returned unusable
    /// output after exhausting retries. The only retryable verdict.
    Transport,
    /// The proposed fix referenced selectors/properties outside the legal set.
    InvalidCssChanges,
    /// The fix's coverage set differs from the corrupted set.
    WrongCssProperties,
    /// A covered property's corrected computed value missed the tolerance.
    WrongCssValue,
    /// Defensive backstop: a graded property had no bound evaluator.
    CssPropertyWithoutEvaluator,
}

/// Persisted outcome of one (variant, model) evaluation unit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Verdict {
    /// Whether the proposed fix passed every stage.
    pub passed: bool,
    /// Failure cause, absent on a pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    /// Human-readable detail for the failure cause.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
}

impl Verdict {
    /// A passing verdict.
    pub fn passed() -> Self {
        Self {
            passed: true,
            error_code: None,
            error_details: None,
        }
    }

    /// A failing verdict with its typed cause.
    pub fn failed(code: ErrorCode, details: impl Into<String>) -> Self {
        Self {
            passed: false,
            error_code: Some(code),
            error_details: Some(details.into()),
        }
    }

    /// Whether a prior run of this unit should be left untouched.
    ///
    /// Every persisted verdict is final except a transport failure, which a
    /// later run retries.
    pub fn is_final(&self) -> bool {
        self.error_code != Some(ErrorCode::Transport)
    }

    /// Writes the verdict to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the file write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        write(path, json).with_context(|| format!("failed to write {}", path.display()))
    }

    /// Reads a previously persisted verdict, if one parses.
    ///
    /// A missing or corrupt file reads as `None`: a corrupt verdict must not
    /// block re-evaluation.
    pub fn load(path: &Path) -> Option<Self> {
        let text = read_to_string(path).ok()?;
        serde_json::from_str(&text).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_is_the_only_retryable_verdict() {
        assert!(Verdict::passed().is_final());
        assert!(Verdict::failed(ErrorCode::WrongCssValue, "x").is_final());
        assert!(!Verdict::failed(ErrorCode::Transport, "x").is_final());
    }

    #[test]
    fn error_codes_serialize_snake_case() {
        let verdict = Verdict::failed(ErrorCode::WrongCssProperties, "missing: .a -> color");
        let json = serde_json::to_string(&verdict).expect("serializes");
        assert!(json.contains("\"wrong_css_properties\""));

        let passed = serde_json::to_string(&Verdict::passed()).expect("serializes");
        assert!(!passed.contains("error_code"));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("result.json");
        let verdict = Verdict::failed(ErrorCode::Transport, "rate limited");
        verdict.save(&path).expect("saves");

        let loaded = Verdict::load(&path).expect("loads");
        assert!(!loaded.passed);
        assert_eq!(loaded.error_code, Some(ErrorCode::Transport));
        assert!(Verdict::load(&dir.path().join("absent.json")).is_none());
    }
}
