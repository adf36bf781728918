//! Layering engine for composing change sets onto a base stylesheet.

use crate::sheet::Stylesheet;

/// Applies ordered change layers onto `base`, returning a new sheet.
///
/// `base` is never mutated. Layers apply in argument order: per selector the
/// property map is shallow-merged with later layers winning per property;
/// selectors absent from the accumulator are inserted verbatim with their
/// full map. Corruption goes in as layer one and a candidate fix as layer
/// two, so the fix supersedes the corruption for every property it touches.
pub fn apply_changes(base: &Stylesheet, layers: &[&Stylesheet]) -> Stylesheet {
    let mut result = base.clone();
    for layer in layers {
        for rule in layer.rules() {
            let target = result.rule_entry(&rule.selector);
            for decl in &rule.declarations {
                target.set(&decl.name, &decl.value);
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> Stylesheet {
        let mut sheet = Stylesheet::new();
        sheet.set(".title", "color", "blue");
        sheet.set(".title", "font-size", "16px");
        sheet.set(".card", "width", "100px");
        sheet
    }

    #[test]
    fn zero_layers_clones_without_aliasing() {
        let base = reference();
        let mut copy = apply_changes(&base, &[]);
        assert_eq!(copy, base);

        copy.set(".title", "color", "red");
        assert_eq!(base.get(".title", "color"), Some("blue"));
    }

    #[test]
    fn later_layer_wins_per_property() {
        let base = reference();
        let mut corruption = Stylesheet::new();
        corruption.set(".title", "color", "red");
        let mut fix = Stylesheet::new();
        fix.set(".title", "color", "blue");

        let composed = apply_changes(&base, &[&corruption, &fix]);
        assert_eq!(composed.get(".title", "color"), Some("blue"));
        // Untouched properties survive the merge.
        assert_eq!(composed.get(".title", "font-size"), Some("16px"));
    }

    #[test]
    fn unknown_selector_inserted_verbatim() {
        let base = reference();
        let mut layer = Stylesheet::new();
        layer.set(".footer", "gap", "8px");

        let composed = apply_changes(&base, &[&layer]);
        assert_eq!(composed.get(".footer", "gap"), Some("8px"));
        assert_eq!(composed.len(), base.len() + 1);
    }

    #[test]
    fn merge_keeps_sibling_properties() {
        let base = reference();
        let mut layer = Stylesheet::new();
        layer.set(".card", "height", "50px");

        let composed = apply_changes(&base, &[&layer]);
        assert_eq!(composed.get(".card", "width"), Some("100px"));
        assert_eq!(composed.get(".card", "height"), Some("50px"));
    }
}
