//! Property evaluator registry.
//!
//! Decides, per CSS property, whether two computed values are close enough to
//! count as equal for grading. Every recognized property is bound to exactly
//! one evaluator kind, or explicitly to [`Evaluator::Unsupported`] for
//! properties that are valid CSS but intentionally ungradable. "Unsupported"
//! is a real table entry, never a missing one: a missing entry means the
//! property is unrecognized, which is a config-validity error, not a grading
//! decision.

mod value;

pub use value::{color_distance, extract_numeric, parse_aspect_ratio};

use anyhow::{Result, bail};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Default relative tolerance for numeric comparisons (25%).
pub const NUMERIC_TOLERANCE: f64 = 0.25;
/// Default perceptual tolerance for color comparisons.
pub const COLOR_TOLERANCE: f64 = 0.25;

/// Comparison rule bound to a recognized property.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Evaluator {
    /// First-number comparison with relative tolerance; zero only equals zero.
    Numeric,
    /// Trimmed string equality, for categorical properties.
    Exact,
    /// Perceptual HSV distance with an exact-string short-circuit.
    Color,
    /// `W/H` or bare ratio comparison with relative tolerance.
    AspectRatio,
    /// Whitespace-split track lists compared pairwise with the numeric rule.
    GridTemplate,
    /// Recognized for layout purposes but excluded from automatic grading.
    Unsupported,
}

/// The closed set of recognized properties and their bound evaluators.
static PROPERTY_TABLE: &[(&str, Evaluator)] = &[
    // Spacing and sizing
    ("margin-top", Evaluator::Numeric),
    ("margin-bottom", Evaluator::Numeric),
    ("margin-left", Evaluator::Numeric),
    ("margin-right", Evaluator::Numeric),
    ("padding-top", Evaluator::Numeric),
    ("padding-bottom", Evaluator::Numeric),
    ("padding-left", Evaluator::Numeric),
    ("padding-right", Evaluator::Numeric),
    ("top", Evaluator::Numeric),
    ("left", Evaluator::Numeric),
    ("bottom", Evaluator::Numeric),
    ("right", Evaluator::Numeric),
    ("width", Evaluator::Numeric),
    ("height", Evaluator::Numeric),
    ("max-width", Evaluator::Numeric),
    ("max-height", Evaluator::Numeric),
    ("min-width", Evaluator::Numeric),
    ("min-height", Evaluator::Numeric),
    ("gap", Evaluator::Numeric),
    // Layout
    ("display", Evaluator::Exact),
    ("position", Evaluator::Exact),
    ("flex-direction", Evaluator::Exact),
    ("justify-content", Evaluator::Exact),
    ("align-items", Evaluator::Exact),
    ("grid-template-columns", Evaluator::GridTemplate),
    ("grid-template-rows", Evaluator::GridTemplate),
    ("grid-column-start", Evaluator::Exact),
    ("grid-column-end", Evaluator::Exact),
    ("grid-row-start", Evaluator::Exact),
    ("grid-row-end", Evaluator::Exact),
    // Borders
    ("border-top-width", Evaluator::Numeric),
    ("border-bottom-width", Evaluator::Numeric),
    ("border-left-width", Evaluator::Numeric),
    ("border-right-width", Evaluator::Numeric),
    ("border-top-style", Evaluator::Exact),
    ("border-bottom-style", Evaluator::Exact),
    ("border-left-style", Evaluator::Exact),
    ("border-right-style", Evaluator::Exact),
    ("border-top-color", Evaluator::Color),
    ("border-bottom-color", Evaluator::Color),
    ("border-left-color", Evaluator::Color),
    ("border-right-color", Evaluator::Color),
    ("border-radius", Evaluator::Numeric),
    ("border-color", Evaluator::Color),
    ("border-width", Evaluator::Numeric),
    ("border-style", Evaluator::Exact),
    // Fonts and text
    ("font-family", Evaluator::Exact),
    ("font-size", Evaluator::Numeric),
    ("font-weight", Evaluator::Exact),
    ("line-height", Evaluator::Numeric),
    ("letter-spacing", Evaluator::Exact),
    ("text-decoration-line", Evaluator::Exact),
    ("text-align", Evaluator::Exact),
    ("text-transform", Evaluator::Exact),
    // Colors
    ("color", Evaluator::Color),
    ("background-color", Evaluator::Color),
    ("opacity", Evaluator::Numeric),
    // Other
    ("object-fit", Evaluator::Exact),
    ("aspect-ratio", Evaluator::AspectRatio),
    // Recognized but intentionally ungraded
    ("backdrop-filter", Evaluator::Unsupported),
    ("inset", Evaluator::Unsupported),
    ("filter", Evaluator::Unsupported),
    ("background", Evaluator::Unsupported),
    ("all", Evaluator::Unsupported),
    ("overflow", Evaluator::Unsupported),
];

static REGISTRY: Lazy<HashMap<&'static str, Evaluator>> =
    Lazy::new(|| PROPERTY_TABLE.iter().copied().collect());

/// Looks up the evaluator bound to `property`.
///
/// `None` means the property is unrecognized altogether.
pub fn lookup(property: &str) -> Option<Evaluator> {
    REGISTRY.get(property).copied()
}

/// Whether `property` is a member of the recognized set.
pub fn is_recognized(property: &str) -> bool {
    REGISTRY.contains_key(property)
}

/// Whether `property` is recognized and gradable.
pub fn has_evaluator(property: &str) -> bool {
    lookup(property).is_some_and(|evaluator| evaluator != Evaluator::Unsupported)
}

/// Judges tolerant equivalence of two values under `property`'s evaluator,
/// with the default tolerances.
///
/// # Errors
///
/// Fails loudly on unrecognized or unsupported properties, and on values the
/// aspect-ratio evaluator cannot parse.
pub fn evaluate(property: &str, reference: &str, candidate: &str) -> Result<bool> {
    evaluate_with_tolerance(property, reference, candidate, None)
}

/// [`evaluate`] with an explicit tolerance for the tolerance-based kinds.
///
/// # Errors
///
/// Same failure modes as [`evaluate`].
pub fn evaluate_with_tolerance(
    property: &str,
    reference: &str,
    candidate: &str,
    tolerance: Option<f64>,
) -> Result<bool> {
    let Some(evaluator) = lookup(property) else {
        bail!("unrecognized CSS property '{property}'");
    };
    match evaluator {
        Evaluator::Numeric => Ok(value::numeric_eq(
            reference,
            candidate,
            tolerance.unwrap_or(NUMERIC_TOLERANCE),
        )),
        Evaluator::Exact => Ok(reference.trim() == candidate.trim()),
        Evaluator::Color => Ok(value::color_eq(
            reference,
            candidate,
            tolerance.unwrap_or(COLOR_TOLERANCE),
        )),
        Evaluator::AspectRatio => value::aspect_ratio_eq(
            reference,
            candidate,
            tolerance.unwrap_or(NUMERIC_TOLERANCE),
        ),
        Evaluator::GridTemplate => Ok(value::grid_template_eq(
            reference,
            candidate,
            tolerance.unwrap_or(NUMERIC_TOLERANCE),
        )),
        Evaluator::Unsupported => {
            bail!("no evaluator bound for CSS property '{property}'")
        }
    }
}
