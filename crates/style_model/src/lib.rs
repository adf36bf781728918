//! Canonical in-memory representation of page styles.
//!
//! A [`Stylesheet`] is an ordered selector → property → value mapping, the
//! shape shared by the reference styles parsed out of a page, a variant's
//! corruption layer, and a proposed fix. The same crate owns the narrow
//! style-block parser, CSS serialization, markup splicing, and the layering
//! engine that composes change sets onto a base sheet.

mod markup;
mod parse;
mod patch;
mod sheet;

pub use markup::{extract_page_styles, inline_global_css, splice_page_styles};
pub use parse::parse_style_block;
pub use patch::apply_changes;
pub use sheet::{Declaration, StyleRule, Stylesheet};

use anyhow::{Result, anyhow};

/// Parses the page-specific style region out of a markup document.
///
/// The page's own `<style id="page-styles">` block is the single source of
/// truth for the reference stylesheet.
///
/// # Errors
///
/// Returns an error if the markup has no page-styles region.
pub fn page_styles_from_markup(markup: &str) -> Result<Stylesheet> {
    let css = extract_page_styles(markup)
        .ok_or_else(|| anyhow!("markup has no <style id=\"page-styles\"> region"))?;
    Ok(parse_style_block(css))
}
