//! Coverage and value judging.
//!
//! Pure functions over the variant's change layer, the model's change layer,
//! and the computed-style maps read back from the rendered pages. Keeping
//! these free of I/O makes the grading rules directly testable.

use crate::config::format_pairs;
use crate::verdict::{ErrorCode, Verdict};
use render_pool::ComputedStyles;
use std::collections::BTreeSet;
use style_eval::{Evaluator, lookup};
use style_model::Stylesheet;

/// Checks that the model changed exactly the corrupted (selector, property)
/// pairs as an unordered set, nothing missing and nothing extra.
///
/// Returns `None` when coverage matches.
pub fn judge_coverage(variant_changes: &Stylesheet, proposed: &Stylesheet) -> Option<Verdict> {
    let corrupted: BTreeSet<(String, String)> = variant_changes.pairs().into_iter().collect();
    let touched: BTreeSet<(String, String)> = proposed.pairs().into_iter().collect();
    if corrupted == touched {
        return None;
    }

    let missing: Vec<(String, String)> = corrupted.difference(&touched).cloned().collect();
    let extra: Vec<(String, String)> = touched.difference(&corrupted).cloned().collect();

    let mut errors = Vec::new();
    if !missing.is_empty() {
        errors.push(format!("missing: {}", format_pairs(&missing)));
    }
    if !extra.is_empty() {
        errors.push(format!("unnecessary: {}", format_pairs(&extra)));
    }
    Some(Verdict::failed(
        ErrorCode::WrongCssProperties,
        errors.join(", "),
    ))
}

/// Compares the reference page's computed values against the corrected
/// page's, per (selector, property) the model changed, under each property's
/// bound evaluator. The first mismatch short-circuits.
///
/// Returns `None` when every covered value is tolerantly equal.
pub fn judge_values(
    proposed: &Stylesheet,
    reference_computed: &ComputedStyles,
    corrected_computed: &ComputedStyles,
) -> Option<Verdict> {
    for rule in proposed.rules() {
        for property in rule.property_names() {
            // Structural validation should make these unreachable; they stay
            // as a defensive backstop against registry/config inconsistency.
            match lookup(property) {
                Some(Evaluator::Unsupported) | None => {
                    return Some(Verdict::failed(
                        ErrorCode::CssPropertyWithoutEvaluator,
                        format!("No evaluator defined for CSS property '{property}'"),
                    ));
                }
                Some(_) => {}
            }

            let reference_value = computed_value(reference_computed, &rule.selector, property);
            let corrected_value = computed_value(corrected_computed, &rule.selector, property);
            let (Some(reference_value), Some(corrected_value)) =
                (reference_value, corrected_value)
            else {
                return Some(Verdict::failed(
                    ErrorCode::WrongCssValue,
                    format!(
                        "No rendered element matched {} -> {property} on one of the pages",
                        rule.selector
                    ),
                ));
            };

            let equal = style_eval::evaluate(property, reference_value, corrected_value)
                .unwrap_or(false);
            if !equal {
                return Some(Verdict::failed(
                    ErrorCode::WrongCssValue,
                    format!(
                        "Invalid value for {} -> {property}:\n\
                         Expected (reference): {reference_value}\n\
                         Got (corrected): {corrected_value}",
                        rule.selector
                    ),
                ));
            }
        }
    }
    None
}

fn computed_value<'styles>(
    computed: &'styles ComputedStyles,
    selector: &str,
    property: &str,
) -> Option<&'styles str> {
    computed
        .get(selector)
        .and_then(|values| values.get(property))
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn changes(pairs: &[(&str, &str, &str)]) -> Stylesheet {
        let mut sheet = Stylesheet::new();
        for (selector, property, value) in pairs {
            sheet.set(selector, property, value);
        }
        sheet
    }

    fn computed(entries: &[(&str, &str, &str)]) -> ComputedStyles {
        let mut map = ComputedStyles::new();
        for (selector, property, value) in entries {
            map.entry((*selector).to_owned())
                .or_insert_with(HashMap::new)
                .insert((*property).to_owned(), (*value).to_owned());
        }
        map
    }

    #[test]
    fn matching_coverage_passes() {
        let variant = changes(&[(".a", "color", "red"), (".b", "width", "10px")]);
        let proposed = changes(&[(".b", "width", "12px"), (".a", "color", "blue")]);
        assert!(judge_coverage(&variant, &proposed).is_none());
    }

    #[test]
    fn missing_pair_is_reported() {
        let variant = changes(&[(".a", "color", "red"), (".b", "width", "10px")]);
        let proposed = changes(&[(".a", "color", "blue")]);
        let verdict = judge_coverage(&variant, &proposed).expect("must fail");
        assert_eq!(verdict.error_code, Some(ErrorCode::WrongCssProperties));
        let details = verdict.error_details.expect("details");
        assert!(details.contains("missing: .b -> width"), "{details}");
        assert!(!details.contains("unnecessary"), "{details}");
    }

    #[test]
    fn extra_pair_is_reported() {
        let variant = changes(&[(".a", "color", "red"), (".b", "width", "10px")]);
        let proposed = changes(&[
            (".a", "color", "blue"),
            (".b", "width", "10px"),
            (".c", "opacity", "1"),
        ]);
        let verdict = judge_coverage(&variant, &proposed).expect("must fail");
        let details = verdict.error_details.expect("details");
        assert!(details.contains("unnecessary: .c -> opacity"), "{details}");
    }

    #[test]
    fn tolerant_value_match_passes() {
        let proposed = changes(&[(".a", "font-size", "16px")]);
        let reference = computed(&[(".a", "font-size", "16px")]);
        let corrected = computed(&[(".a", "font-size", "18px")]);
        assert!(judge_values(&proposed, &reference, &corrected).is_none());
    }

    #[test]
    fn value_mismatch_reports_expected_and_got() {
        let proposed = changes(&[(".a", "display", "flex")]);
        let reference = computed(&[(".a", "display", "flex")]);
        let corrected = computed(&[(".a", "display", "grid")]);
        let verdict = judge_values(&proposed, &reference, &corrected).expect("must fail");
        assert_eq!(verdict.error_code, Some(ErrorCode::WrongCssValue));
        let details = verdict.error_details.expect("details");
        assert!(details.contains("Expected (reference): flex"), "{details}");
        assert!(details.contains("Got (corrected): grid"), "{details}");
    }

    #[test]
    fn evaluator_less_property_hits_the_backstop() {
        let proposed = changes(&[(".a", "overflow", "hidden")]);
        let reference = computed(&[(".a", "overflow", "hidden")]);
        let corrected = computed(&[(".a", "overflow", "hidden")]);
        let verdict = judge_values(&proposed, &reference, &corrected).expect("must fail");
        assert_eq!(
            verdict.error_code,
            Some(ErrorCode::CssPropertyWithoutEvaluator)
        );
    }

    #[test]
    fn selector_without_live_element_fails_with_detail() {
        let proposed = changes(&[(".a", "color", "blue")]);
        let reference = ComputedStyles::new();
        let corrected = ComputedStyles::new();
        let verdict = judge_values(&proposed, &reference, &corrected).expect("must fail");
        assert_eq!(verdict.error_code, Some(ErrorCode::WrongCssValue));
        let details = verdict.error_details.expect("details");
        assert!(details.contains("No rendered element matched"), "{details}");
    }
}
