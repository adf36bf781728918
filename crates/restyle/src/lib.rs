//! CSS-repair evaluation harness.
//!
//! Synthesizes corrupted variants of a page's styles, renders them and the
//! reference in a headless browser, asks a model collaborator for a fix, and
//! judges the fix against browser-computed values under per-property
//! tolerant equivalence rules, emitting a typed verdict per unit.

pub mod artifacts;
pub mod config;
pub mod judge;
pub mod model;
pub mod orchestrator;
pub mod prompt;
pub mod settings;
pub mod verdict;

pub use artifacts::PageArtifacts;
pub use config::{Config, Variant};
pub use model::{HttpModelClient, ModelClient, ModelResponse};
pub use orchestrator::{EvalUnit, RunMode, UnitOutcome, run_unit};
pub use settings::Settings;
pub use verdict::{ErrorCode, Verdict};
