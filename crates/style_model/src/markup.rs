//! Markup splicing for page templates.
//!
//! The page template carries a `<style id="page-styles">` block whose contents
//! get replaced with a serialized stylesheet, and optionally a `<link>` to the
//! project's shared `global.css` which gets inlined so the rendered document
//! is self-contained apart from fonts and images.

use crate::sheet::Stylesheet;
use anyhow::{Result, anyhow};

const PAGE_STYLES_MARKERS: [&str; 2] = ["id=\"page-styles\"", "id='page-styles'"];

/// Byte range of the contents of the page-styles block, exclusive of tags.
fn page_styles_span(markup: &str) -> Option<(usize, usize)> {
    let marker_at = PAGE_STYLES_MARKERS
        .iter()
        .find_map(|marker| markup.find(marker))?;
    // The attribute must sit inside a <style> opening tag.
    let open_at = markup[..marker_at].rfind("<style")?;
    let content_start = marker_at + markup[marker_at..].find('>')? + 1;
    if markup[open_at..content_start].contains("</style") {
        return None;
    }
    let content_end = content_start + markup[content_start..].find("</style")?;
    Some((content_start, content_end))
}

/// Returns the raw text of the page-styles block, if the markup has one.
pub fn extract_page_styles(markup: &str) -> Option<&str> {
    page_styles_span(markup).map(|(start, end)| &markup[start..end])
}

/// Replaces the contents of the page-styles block with the serialized sheet.
///
/// # Errors
///
/// Returns an error if the markup has no page-styles region.
pub fn splice_page_styles(markup: &str, sheet: &Stylesheet) -> Result<String> {
    let (start, end) = page_styles_span(markup)
        .ok_or_else(|| anyhow!("markup has no <style id=\"page-styles\"> region"))?;
    let mut out = String::with_capacity(markup.len());
    out.push_str(&markup[..start]);
    out.push_str(&sheet.to_css());
    out.push_str(&markup[end..]);
    Ok(out)
}

/// Replaces a `<link ... global.css ...>` tag with an inline style block.
///
/// Markup without such a link passes through unchanged.
pub fn inline_global_css(markup: &str, global_css: &str) -> String {
    let Some(href_at) = markup.find("global.css") else {
        return markup.to_owned();
    };
    let Some(link_start) = markup[..href_at].rfind("<link") else {
        return markup.to_owned();
    };
    let Some(link_len) = markup[link_start..].find('>') else {
        return markup.to_owned();
    };
    let link_end = link_start + link_len + 1;

    let mut out = String::with_capacity(markup.len() + global_css.len());
    out.push_str(&markup[..link_start]);
    out.push_str("<style id=\"global-styles\">\n");
    out.push_str(global_css);
    out.push_str("\n</style>");
    out.push_str(&markup[link_end..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <link rel="stylesheet" href="../../global.css">
    <style id="page-styles">
.title { color: red; }
    </style>
</head>
<body><h1 class="title">Hi</h1></body>
</html>"#;

    #[test]
    fn extracts_page_styles_text() {
        let css = extract_page_styles(TEMPLATE).expect("page styles present");
        assert!(css.contains(".title { color: red; }"));
    }

    #[test]
    fn splice_replaces_only_the_style_region() {
        let mut sheet = Stylesheet::new();
        sheet.set(".title", "color", "blue");
        let spliced = splice_page_styles(TEMPLATE, &sheet).expect("splices");
        assert!(spliced.contains("color: blue;"));
        assert!(!spliced.contains("color: red;"));
        // Everything outside the region is untouched.
        assert!(spliced.contains("<h1 class=\"title\">Hi</h1>"));
        assert!(spliced.contains("id=\"page-styles\""));
    }

    #[test]
    fn splice_fails_without_region() {
        let sheet = Stylesheet::new();
        assert!(splice_page_styles("<html></html>", &sheet).is_err());
    }

    #[test]
    fn inlines_global_css_over_the_link() {
        let out = inline_global_css(TEMPLATE, "body { margin: 0; }");
        assert!(out.contains("<style id=\"global-styles\">"));
        assert!(out.contains("body { margin: 0; }"));
        assert!(!out.contains("<link rel=\"stylesheet\""));
    }

    #[test]
    fn no_global_link_passes_through() {
        let markup = "<html><head></head></html>";
        assert_eq!(inline_global_css(markup, "x"), markup);
    }
}
