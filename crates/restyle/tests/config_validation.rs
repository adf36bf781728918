//! Config loading from a real page directory.

use restyle::Config;
use std::fs::{create_dir_all, write};
use std::path::Path;

const PAGE_MARKUP: &str = r#"<!DOCTYPE html>
<html>
<head>
    <link rel="stylesheet" href="../../global.css">
    <style id="page-styles">
.title { color: blue; font-size: 16px; }
.hero { display: flex; gap: 12px; }
    </style>
</head>
<body>
    <div class="hero"><h1 class="title">Welcome</h1></div>
</body>
</html>"#;

fn write_page(dir: &Path, sidecar: &str) {
    create_dir_all(dir).expect("page dir");
    write(dir.join("page.html"), PAGE_MARKUP).expect("page.html");
    write(dir.join("config.json"), sidecar).expect("config.json");
}

#[test]
fn loads_reference_styles_and_variants_from_disk() {
    let root = tempfile::tempdir().expect("tempdir");
    let page_dir = root.path().join("shop/pages/landing");
    write_page(
        &page_dir,
        r#"{
            "variants": [
                {"id": "v1", "css_changes": {".title": {"color": "red"}}},
                {"id": "v2", "css_changes": {".hero": {"gap": "48px", "display": "block"}}}
            ]
        }"#,
    );

    let config = Config::load(&page_dir).expect("loads");
    assert_eq!(config.correct_css.get(".title", "color"), Some("blue"));
    assert_eq!(config.variants.len(), 2);
    assert_eq!(
        config.variant("v2").expect("v2").css_changes.pair_count(),
        2
    );
    assert!(config.oracle_css.is_none());
}

#[test]
fn bad_variant_selector_fails_eagerly_with_listing() {
    let root = tempfile::tempdir().expect("tempdir");
    let page_dir = root.path().join("shop/pages/landing");
    write_page(
        &page_dir,
        r#"{
            "variants": [
                {"id": "broken", "css_changes": {".missing": {"color": "red"}}}
            ]
        }"#,
    );

    let err = Config::load(&page_dir).expect_err("must fail before any rendering");
    let text = format!("{err:#}");
    assert!(text.contains("Invalid selectors: .missing"), "{text}");
    assert!(text.contains("broken"), "{text}");
}

#[test]
fn variant_may_only_change_existing_declarations() {
    let root = tempfile::tempdir().expect("tempdir");
    let page_dir = root.path().join("shop/pages/landing");
    // `width` is recognized but not declared on `.title` in the reference.
    write_page(
        &page_dir,
        r#"{
            "variants": [
                {"id": "v1", "css_changes": {".title": {"width": "10px"}}}
            ]
        }"#,
    );

    let err = Config::load(&page_dir).expect_err("must fail");
    assert!(
        format!("{err:#}").contains("Properties not in correct_css: .title -> width"),
        "{err:#}"
    );
}
