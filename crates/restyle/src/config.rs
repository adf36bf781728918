//! Per-page evaluation config: reference styles, variants, optional oracle.
//!
//! The reference stylesheet is parsed out of the page's own style block, the
//! single source of truth for correct values, and merged with the sidecar
//! `config.json`. Validation is eager and aggregates every violation into one
//! message so a config author fixes everything in one pass.

use anyhow::{Context as _, Result, bail};
use serde::Deserialize;
use std::fmt::Write as _;
use std::fs::read_to_string;
use std::path::Path;
use style_model::{Stylesheet, page_styles_from_markup};

/// A named, pre-defined corruption of the reference stylesheet.
#[derive(Clone, Debug, Deserialize)]
pub struct Variant {
    /// Stable identifier, used in artifact paths.
    pub id: String,
    /// The property overrides that turn the reference into the broken page.
    pub css_changes: Stylesheet,
}

/// Sidecar config file shape.
#[derive(Debug, Deserialize)]
struct SidecarConfig {
    #[serde(default)]
    variants: Vec<Variant>,
    /// Held-out corrected stylesheet for offline self-test mode.
    #[serde(default)]
    oracle_css: Option<Stylesheet>,
}

/// Validated evaluation config for one (project, page).
#[derive(Clone, Debug)]
pub struct Config {
    /// Reference stylesheet parsed from the page markup. Never mutated.
    pub correct_css: Stylesheet,
    /// Declared corruptions.
    pub variants: Vec<Variant>,
    /// Oracle stylesheet, only present when self-test mode is wanted.
    pub oracle_css: Option<Stylesheet>,
}

impl Config {
    /// Builds and validates a config from page markup and sidecar JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the markup has no style region, the sidecar fails
    /// to parse, any reference property is unrecognized, or any variant
    /// references selectors/properties outside the reference sheet.
    pub fn from_parts(markup: &str, sidecar_json: &str) -> Result<Self> {
        let correct_css = page_styles_from_markup(markup)?;
        let sidecar: SidecarConfig =
            serde_json::from_str(sidecar_json).context("failed to parse config.json")?;

        let config = Self {
            correct_css,
            variants: sidecar.variants,
            oracle_css: sidecar.oracle_css,
        };
        config.validate()?;
        Ok(config)
    }

    /// Loads a config from a page directory (`page.html` + `config.json`).
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Config::from_parts`], plus file I/O.
    pub fn load(page_dir: &Path) -> Result<Self> {
        let markup_path = page_dir.join("page.html");
        let sidecar_path = page_dir.join("config.json");
        let markup = read_to_string(&markup_path)
            .with_context(|| format!("failed to read {}", markup_path.display()))?;
        let sidecar = read_to_string(&sidecar_path)
            .with_context(|| format!("failed to read {}", sidecar_path.display()))?;
        Self::from_parts(&markup, &sidecar)
    }

    /// Resolves a variant by id.
    pub fn variant(&self, id: &str) -> Option<&Variant> {
        self.variants.iter().find(|variant| variant.id == id)
    }

    /// Eager validation: reference properties must all be recognized, and
    /// every variant must be a legal change set.
    fn validate(&self) -> Result<()> {
        for rule in self.correct_css.rules() {
            for name in rule.property_names() {
                if !style_eval::is_recognized(name) {
                    bail!(
                        "Invalid CSS property '{name}' in correct_css (selector '{}')",
                        rule.selector
                    );
                }
            }
        }
        for variant in &self.variants {
            self.verify_changes(&variant.css_changes)
                .with_context(|| format!("variant '{}'", variant.id))?;
        }
        Ok(())
    }

    /// Checks the structural legality of a change set against the reference.
    ///
    /// A change set may only alter declarations that already exist: every
    /// selector must exist in the reference sheet, every property must
    /// already be declared on that selector, be a recognized property, and
    /// have a bound evaluator. All violations are aggregated into one
    /// message, not just the first.
    ///
    /// # Errors
    ///
    /// Returns the aggregated violation listing when any check fails.
    pub fn verify_changes(&self, changes: &Stylesheet) -> Result<()> {
        let mut wrong_selectors = Vec::new();
        let mut non_existing_properties = Vec::new();
        let mut not_allowed_properties = Vec::new();
        let mut properties_without_evaluator = Vec::new();

        for rule in changes.rules() {
            let Some(reference_rule) = self.correct_css.rule(&rule.selector) else {
                wrong_selectors.push(rule.selector.clone());
                continue;
            };
            for name in rule.property_names() {
                if !reference_rule.contains(name) {
                    non_existing_properties.push((rule.selector.clone(), name.to_owned()));
                    continue;
                }
                if !style_eval::is_recognized(name) {
                    not_allowed_properties.push((rule.selector.clone(), name.to_owned()));
                    continue;
                }
                if !style_eval::has_evaluator(name) {
                    properties_without_evaluator.push((rule.selector.clone(), name.to_owned()));
                }
            }
        }

        if wrong_selectors.is_empty()
            && non_existing_properties.is_empty()
            && not_allowed_properties.is_empty()
            && properties_without_evaluator.is_empty()
        {
            return Ok(());
        }

        let mut message = String::from("CSS changes validation failed:");
        if !wrong_selectors.is_empty() {
            let _ = write!(
                message,
                "\n- Invalid selectors: {}",
                wrong_selectors.join(", ")
            );
        }
        if !non_existing_properties.is_empty() {
            let _ = write!(
                message,
                "\n- Properties not in correct_css: {}",
                format_pairs(&non_existing_properties)
            );
        }
        if !not_allowed_properties.is_empty() {
            let _ = write!(
                message,
                "\n- Properties not allowed: {}",
                format_pairs(&not_allowed_properties)
            );
        }
        if !properties_without_evaluator.is_empty() {
            let _ = write!(
                message,
                "\n- Properties without evaluator: {}",
                format_pairs(&properties_without_evaluator)
            );
        }
        bail!(message)
    }
}

/// Formats (selector, property) pairs as `sel -> prop` listings.
pub fn format_pairs(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(selector, property)| format!("{selector} -> {property}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKUP: &str = r#"<html><head><style id="page-styles">
.title { color: blue; font-size: 16px; }
.card { width: 100px; overflow: hidden; }
</style></head><body></body></html>"#;

    #[test]
    fn valid_config_loads() {
        let sidecar = r#"{
            "variants": [
                {"id": "v1", "css_changes": {".title": {"color": "red"}}}
            ]
        }"#;
        let config = Config::from_parts(MARKUP, sidecar).expect("valid config");
        assert_eq!(config.variants.len(), 1);
        assert!(config.variant("v1").is_some());
        assert!(config.variant("v2").is_none());
        assert_eq!(config.correct_css.get(".title", "color"), Some("blue"));
    }

    #[test]
    fn unknown_selector_is_enumerated() {
        let sidecar = r#"{
            "variants": [
                {"id": "v1", "css_changes": {".missing": {"color": "red"}}}
            ]
        }"#;
        let err = Config::from_parts(MARKUP, sidecar).expect_err("must fail");
        let text = format!("{err:#}");
        assert!(text.contains("Invalid selectors: .missing"), "{text}");
    }

    #[test]
    fn all_violation_kinds_aggregate() {
        let config = Config::from_parts(MARKUP, "{}").expect("valid base");
        let mut changes = Stylesheet::new();
        changes.set(".missing", "color", "red");
        changes.set(".title", "width", "10px"); // not declared on .title
        changes.set(".card", "overflow", "scroll"); // recognized, no evaluator

        let err = config.verify_changes(&changes).expect_err("must fail");
        let text = err.to_string();
        assert!(text.contains("Invalid selectors: .missing"), "{text}");
        assert!(
            text.contains("Properties not in correct_css: .title -> width"),
            "{text}"
        );
        assert!(
            text.contains("Properties without evaluator: .card -> overflow"),
            "{text}"
        );
    }

    #[test]
    fn unrecognized_reference_property_fails_load() {
        let markup = r#"<html><head><style id="page-styles">
.title { box-shadow: none; }
</style></head><body></body></html>"#;
        let err = Config::from_parts(markup, "{}").expect_err("must fail");
        assert!(err.to_string().contains("box-shadow"));
    }
}
