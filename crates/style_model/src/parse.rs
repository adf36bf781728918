//! Narrow style-block parser.
//!
//! Recovers selector / property / value triples from the raw text of a page's
//! style block: brace-delimited rule blocks, semicolon-delimited declarations,
//! comments stripped by the tokenizer. Malformed declarations and at-rules are
//! skipped, never failing the whole parse.

use crate::sheet::{StyleRule, Stylesheet};
use cssparser::AtRuleParser as CssAtRuleParser;
use cssparser::BasicParseErrorKind;
use cssparser::CowRcStr;
use cssparser::DeclarationParser as CssDeclarationParser;
use cssparser::ParseError;
use cssparser::Parser;
use cssparser::ParserInput;
use cssparser::ParserState;
use cssparser::QualifiedRuleParser as CssQualifiedRuleParser;
use cssparser::RuleBodyItemParser as CssRuleBodyItemParser;
use cssparser::RuleBodyParser as CssRuleBodyParser;
use cssparser::StyleSheetParser;

/// A declaration parser that records property name and its raw value.
struct BodyDeclParser;

/// A parsed `name: value` pair with the name lowercased and value trimmed.
struct RawDeclaration {
    name: String,
    value: String,
}

impl CssDeclarationParser<'_> for BodyDeclParser {
    type Declaration = RawDeclaration;
    type Error = ();

    fn parse_value<'input>(
        &mut self,
        name: CowRcStr<'input>,
        input: &mut Parser<'input, '_>,
        _decl_start: &ParserState,
    ) -> Result<Self::Declaration, ParseError<'input, Self::Error>> {
        let start = input.position();
        // Consume until end of the declaration item.
        while input.next_including_whitespace_and_comments().is_ok() {}
        let raw = input.slice_from(start);
        Ok(RawDeclaration {
            name: name.to_ascii_lowercase(),
            value: raw.trim().to_owned(),
        })
    }
}

impl CssAtRuleParser<'_> for BodyDeclParser {
    type Prelude = ();
    type AtRule = RawDeclaration; // Not produced
    type Error = ();

    #[inline]
    fn parse_prelude<'input>(
        &mut self,
        _name: CowRcStr<'input>,
        _input: &mut Parser<'input, '_>,
    ) -> Result<Self::Prelude, ParseError<'input, Self::Error>> {
        Ok(())
    }

    #[inline]
    fn parse_block<'input>(
        &mut self,
        _prelude: Self::Prelude,
        _state: &ParserState,
        input: &mut Parser<'input, '_>,
    ) -> Result<Self::AtRule, ParseError<'input, Self::Error>> {
        Err(input.new_error(BasicParseErrorKind::AtRuleBodyInvalid))
    }

    #[inline]
    fn rule_without_block(
        &mut self,
        _prelude: Self::Prelude,
        _state: &ParserState,
    ) -> Result<Self::AtRule, Self::Error> {
        Err(())
    }
}

impl CssQualifiedRuleParser<'_> for BodyDeclParser {
    type Prelude = ();
    type QualifiedRule = RawDeclaration; // Not produced
    type Error = ();

    #[inline]
    fn parse_prelude<'input>(
        &mut self,
        input: &mut Parser<'input, '_>,
    ) -> Result<Self::Prelude, ParseError<'input, Self::Error>> {
        Err(input.new_error(BasicParseErrorKind::QualifiedRuleInvalid))
    }

    #[inline]
    fn parse_block<'input>(
        &mut self,
        _prelude: Self::Prelude,
        _state: &ParserState,
        input: &mut Parser<'input, '_>,
    ) -> Result<Self::QualifiedRule, ParseError<'input, Self::Error>> {
        Err(input.new_error(BasicParseErrorKind::QualifiedRuleInvalid))
    }
}

impl CssRuleBodyItemParser<'_, RawDeclaration, ()> for BodyDeclParser {
    fn parse_declarations(&self) -> bool {
        true
    }
    fn parse_qualified(&self) -> bool {
        false
    }
}

/// Top-level parser that builds [`StyleRule`] items for qualified rules.
struct TopLevelParser;

impl CssAtRuleParser<'_> for TopLevelParser {
    type Prelude = ();
    type AtRule = StyleRule;
    type Error = ();

    #[inline]
    fn parse_prelude<'input>(
        &mut self,
        _name: CowRcStr<'input>,
        _input: &mut Parser<'input, '_>,
    ) -> Result<Self::Prelude, ParseError<'input, Self::Error>> {
        Ok(())
    }

    #[inline]
    fn parse_block<'input>(
        &mut self,
        _prelude: Self::Prelude,
        _state: &ParserState,
        input: &mut Parser<'input, '_>,
    ) -> Result<Self::AtRule, ParseError<'input, Self::Error>> {
        // At-rules are outside the page-style subset; skip them.
        Err(input.new_error(BasicParseErrorKind::AtRuleBodyInvalid))
    }

    #[inline]
    fn rule_without_block(
        &mut self,
        _prelude: Self::Prelude,
        _state: &ParserState,
    ) -> Result<Self::AtRule, Self::Error> {
        Err(())
    }
}

impl CssQualifiedRuleParser<'_> for TopLevelParser {
    type Prelude = String; // raw selector text
    type QualifiedRule = StyleRule;
    type Error = ();

    #[inline]
    fn parse_prelude<'input>(
        &mut self,
        input: &mut Parser<'input, '_>,
    ) -> Result<Self::Prelude, ParseError<'input, Self::Error>> {
        let start = input.state();
        while input.next_including_whitespace_and_comments().is_ok() {}
        Ok(input.slice_from(start.position()).trim().to_owned())
    }

    #[inline]
    fn parse_block<'input>(
        &mut self,
        prelude: Self::Prelude,
        _state: &ParserState,
        input: &mut Parser<'input, '_>,
    ) -> Result<Self::QualifiedRule, ParseError<'input, Self::Error>> {
        let mut rule = StyleRule::new(prelude);
        let mut body = BodyDeclParser;
        for decl in CssRuleBodyParser::new(input, &mut body).flatten() {
            rule.set(&decl.name, &decl.value);
        }
        Ok(rule)
    }
}

/// Parses the text of a style block into a [`Stylesheet`].
///
/// A repeated selector replaces the earlier block wholesale, matching JSON
/// object semantics for the same shape.
pub fn parse_style_block(css: &str) -> Stylesheet {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    let mut top = TopLevelParser;
    let mut sheet = Stylesheet::new();
    for rule in StyleSheetParser::new(&mut parser, &mut top).flatten() {
        if rule.selector.is_empty() {
            continue;
        }
        sheet.put_rule(rule);
    }
    sheet
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rules_and_declarations() {
        let sheet = parse_style_block(
            ".title { color: red; font-size: 16px; }\n.card { width: 100px; }",
        );
        assert_eq!(sheet.len(), 2);
        assert_eq!(sheet.get(".title", "color"), Some("red"));
        assert_eq!(sheet.get(".title", "font-size"), Some("16px"));
        assert_eq!(sheet.get(".card", "width"), Some("100px"));
    }

    #[test]
    fn strips_comments() {
        let sheet = parse_style_block("/* header */ .a { /* inline */ color: blue; }");
        assert_eq!(sheet.get(".a", "color"), Some("blue"));
    }

    #[test]
    fn skips_malformed_declarations() {
        let sheet = parse_style_block(".a { color red; width: 10px; }");
        let rule = sheet.rule(".a").expect("rule parsed");
        assert_eq!(rule.get("width"), Some("10px"));
        assert!(rule.get("color").is_none());
    }

    #[test]
    fn later_duplicate_selector_wins() {
        let sheet = parse_style_block(".a { color: red; gap: 4px; } .a { color: blue; }");
        let rule = sheet.rule(".a").expect("rule parsed");
        assert_eq!(rule.get("color"), Some("blue"));
        assert!(rule.get("gap").is_none());
    }

    #[test]
    fn complex_selectors_kept_verbatim() {
        let sheet = parse_style_block(".grid > .cell:first-child { margin-top: 8px; }");
        assert_eq!(
            sheet.get(".grid > .cell:first-child", "margin-top"),
            Some("8px")
        );
    }
}
