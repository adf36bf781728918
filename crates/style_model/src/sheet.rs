//! Stylesheet data types and their JSON object representation.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A single `property: value` declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    /// Lowercased property name.
    pub name: String,
    /// Raw value text.
    pub value: String,
}

/// A selector with its declarations, in authored order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StyleRule {
    /// Raw selector text.
    pub selector: String,
    /// Declarations within the rule block. Property names unique.
    pub declarations: Vec<Declaration>,
}

impl StyleRule {
    /// Creates an empty rule for `selector`.
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            declarations: Vec::new(),
        }
    }

    /// Returns the declared value for `property`, if present.
    pub fn get(&self, property: &str) -> Option<&str> {
        self.declarations
            .iter()
            .find(|decl| decl.name == property)
            .map(|decl| decl.value.as_str())
    }

    /// Returns whether `property` is declared on this rule.
    pub fn contains(&self, property: &str) -> bool {
        self.get(property).is_some()
    }

    /// Sets `property` to `value`, replacing an existing declaration in place
    /// or appending a new one.
    pub fn set(&mut self, property: &str, value: &str) {
        if let Some(decl) = self
            .declarations
            .iter_mut()
            .find(|decl| decl.name == property)
        {
            decl.value = value.to_owned();
        } else {
            self.declarations.push(Declaration {
                name: property.to_owned(),
                value: value.to_owned(),
            });
        }
    }

    /// Iterates over declared property names in authored order.
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.declarations.iter().map(|decl| decl.name.as_str())
    }
}

/// An ordered selector → property → value mapping.
///
/// Selectors are unique; insertion order is preserved so serialization is
/// deterministic. Lookup is linear, which is fine at the scale of a single
/// page's style block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stylesheet {
    rules: Vec<StyleRule>,
}

impl Stylesheet {
    /// Creates an empty stylesheet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules in insertion order.
    pub fn rules(&self) -> &[StyleRule] {
        &self.rules
    }

    /// Returns the rule for `selector`, if present.
    pub fn rule(&self, selector: &str) -> Option<&StyleRule> {
        self.rules.iter().find(|rule| rule.selector == selector)
    }

    /// Returns whether `selector` has a rule.
    pub fn contains_selector(&self, selector: &str) -> bool {
        self.rule(selector).is_some()
    }

    /// Looks up the declared value for `selector` / `property`.
    pub fn get(&self, selector: &str, property: &str) -> Option<&str> {
        self.rule(selector).and_then(|rule| rule.get(property))
    }

    /// Sets `selector` / `property` to `value`, creating the rule if needed.
    pub fn set(&mut self, selector: &str, property: &str, value: &str) {
        self.rule_entry(selector).set(property, value);
    }

    /// Replaces the rule for `selector` wholesale, or appends it.
    pub fn put_rule(&mut self, rule: StyleRule) {
        if let Some(existing) = self
            .rules
            .iter_mut()
            .find(|candidate| candidate.selector == rule.selector)
        {
            *existing = rule;
        } else {
            self.rules.push(rule);
        }
    }

    /// Returns a mutable rule for `selector`, inserting an empty one if absent.
    pub fn rule_entry(&mut self, selector: &str) -> &mut StyleRule {
        if let Some(index) = self
            .rules
            .iter()
            .position(|rule| rule.selector == selector)
        {
            &mut self.rules[index]
        } else {
            self.rules.push(StyleRule::new(selector));
            let last = self.rules.len() - 1;
            &mut self.rules[last]
        }
    }

    /// Returns whether the sheet has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Every (selector, property) pair declared in the sheet, in order.
    pub fn pairs(&self) -> Vec<(String, String)> {
        self.rules
            .iter()
            .flat_map(|rule| {
                rule.declarations
                    .iter()
                    .map(|decl| (rule.selector.clone(), decl.name.clone()))
            })
            .collect()
    }

    /// Total number of declared (selector, property) pairs.
    pub fn pair_count(&self) -> usize {
        self.rules.iter().map(|rule| rule.declarations.len()).sum()
    }

    /// Serializes the sheet to CSS text, one declaration per line.
    pub fn to_css(&self) -> String {
        let mut out = String::from("\n");
        for rule in &self.rules {
            out.push_str(&rule.selector);
            out.push_str(" {\n");
            for decl in &rule.declarations {
                out.push_str("    ");
                out.push_str(&decl.name);
                out.push_str(": ");
                out.push_str(&decl.value);
                out.push_str(";\n");
            }
            out.push_str("}\n\n");
        }
        out
    }
}

// A stylesheet travels as a JSON object of objects: selector → { property:
// value }. Duplicate keys keep the later entry, matching JSON object
// semantics elsewhere in the pipeline.

impl Serialize for Stylesheet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.rules.len()))?;
        for rule in &self.rules {
            let properties: Vec<(&str, &str)> = rule
                .declarations
                .iter()
                .map(|decl| (decl.name.as_str(), decl.value.as_str()))
                .collect();
            map.serialize_entry(&rule.selector, &PropertyMap(&properties))?;
        }
        map.end()
    }
}

struct PropertyMap<'sheet>(&'sheet [(&'sheet str, &'sheet str)]);

impl Serialize for PropertyMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Stylesheet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(SheetVisitor)
    }
}

struct SheetVisitor;

impl<'de> Visitor<'de> for SheetVisitor {
    type Value = Stylesheet;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map of selectors to property maps")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut sheet = Stylesheet::new();
        while let Some((selector, Properties(properties))) =
            access.next_entry::<String, Properties>()?
        {
            let rule = sheet.rule_entry(&selector);
            for (name, value) in properties {
                rule.set(&name, &value);
            }
        }
        Ok(sheet)
    }
}

struct Properties(Vec<(String, String)>);

impl<'de> Deserialize<'de> for Properties {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PropertiesVisitor;

        impl<'de> Visitor<'de> for PropertiesVisitor {
            type Value = Properties;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of property names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut properties = Vec::new();
                while let Some(entry) = access.next_entry::<String, String>()? {
                    properties.push(entry);
                }
                Ok(Properties(properties))
            }
        }

        deserializer.deserialize_map(PropertiesVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_in_place() {
        let mut rule = StyleRule::new(".title");
        rule.set("color", "red");
        rule.set("width", "10px");
        rule.set("color", "blue");
        assert_eq!(rule.get("color"), Some("blue"));
        assert_eq!(rule.declarations.len(), 2);
        assert_eq!(rule.declarations[0].name, "color");
    }

    #[test]
    fn json_round_trip_preserves_order() {
        let json = r#"{".b": {"width": "10px", "gap": "4px"}, ".a": {"color": "red"}}"#;
        let sheet: Stylesheet = serde_json::from_str(json).expect("valid sheet JSON");
        assert_eq!(sheet.rules()[0].selector, ".b");
        assert_eq!(sheet.rules()[1].selector, ".a");
        assert_eq!(sheet.get(".b", "gap"), Some("4px"));

        let round = serde_json::to_string(&sheet).expect("serializes");
        let again: Stylesheet = serde_json::from_str(&round).expect("round trips");
        assert_eq!(again, sheet);
    }

    #[test]
    fn to_css_emits_one_declaration_per_line() {
        let mut sheet = Stylesheet::new();
        sheet.set(".title", "color", "blue");
        sheet.set(".title", "font-size", "16px");
        let css = sheet.to_css();
        assert!(css.contains(".title {\n"));
        assert!(css.contains("    color: blue;\n"));
        assert!(css.contains("    font-size: 16px;\n"));
    }

    #[test]
    fn pairs_enumerates_all_declarations() {
        let mut sheet = Stylesheet::new();
        sheet.set(".a", "color", "red");
        sheet.set(".b", "width", "10px");
        sheet.set(".b", "gap", "4px");
        assert_eq!(sheet.pair_count(), 3);
        assert_eq!(
            sheet.pairs(),
            vec![
                (".a".to_owned(), "color".to_owned()),
                (".b".to_owned(), "width".to_owned()),
                (".b".to_owned(), "gap".to_owned()),
            ]
        );
    }
}
