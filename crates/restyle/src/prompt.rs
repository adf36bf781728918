//! Payload assembly for the model collaborator.
//!
//! The payload carries the corrupted markup, screenshots of the corrupted and
//! reference pages as data URLs, and the exact number of corrupted
//! declarations, a hard hint bounding the model's search space. A
//! human-inspectable copy is persisted next to the other artifacts.

use anyhow::{Context as _, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use std::fs::read;
use std::path::Path;

/// Everything the collaborator receives for one evaluation unit.
#[derive(Clone, Debug)]
pub struct ModelRequest {
    /// Instruction text, including the corrupted markup and the error count.
    pub instructions: String,
    /// Corrupted-page screenshot as a PNG data URL.
    pub incorrect_image: String,
    /// Reference screenshot as a PNG data URL.
    pub reference_image: String,
    /// Number of corrupted (selector, property) declarations.
    pub errors_count: usize,
}

/// Reads a PNG artifact into a data URL.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn png_data_url(path: &Path) -> Result<String> {
    let bytes = read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(format!(
        "data:image/png;base64,{}",
        BASE64_STANDARD.encode(bytes)
    ))
}

/// Builds the payload for one unit.
///
/// # Errors
///
/// Returns an error if either screenshot cannot be read.
pub fn build_request(
    corrupted_markup: &str,
    corrupted_png: &Path,
    reference_png: &Path,
    errors_count: usize,
) -> Result<ModelRequest> {
    let plural = if errors_count == 1 { "" } else { "s" };
    let instructions = format!(
        "The following page contains exactly {errors_count} incorrect CSS \
         declaration{plural}. The first image shows the page as rendered with the \
         incorrect styles; the second image shows the correct reference design. \
         Identify the incorrect declarations and return corrected values.\n\n\
         Respond with a JSON object of the shape \
         {{\"reasoning\": string, \"css_changes\": {{selector: {{property: value}}}}}}. \
         Only change declarations that already exist in the page's style block.\n\n\
         Page markup:\n\n{corrupted_markup}"
    );

    Ok(ModelRequest {
        instructions,
        incorrect_image: png_data_url(corrupted_png)?,
        reference_image: png_data_url(reference_png)?,
        errors_count,
    })
}

/// Renders the payload as a self-contained HTML document for inspection.
pub fn request_to_html(request: &ModelRequest) -> String {
    let mut out = String::from(
        "<!DOCTYPE html>\n<html>\n<head>\n    <meta charset=\"UTF-8\">\n    <style>\n        \
         img { max-width: 100%; }\n        \
         .message { margin: 20px 0; padding: 20px; border: 1px solid #ccc; }\n    \
         </style>\n</head>\n<body>",
    );
    out.push_str("\n<div class=\"message\">\n    <pre>");
    out.push_str(&escape_html(&request.instructions));
    out.push_str("</pre>\n</div>");
    for image in [&request.incorrect_image, &request.reference_image] {
        out.push_str("\n<div class=\"message\">\n    <img src=\"");
        out.push_str(image);
        out.push_str("\" />\n</div>");
    }
    out.push_str("\n</body>\n</html>");
    out
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instructions_carry_the_error_count_and_markup() {
        let dir = tempfile::tempdir().expect("tempdir");
        let png = dir.path().join("page.png");
        std::fs::write(&png, [0x89, 0x50, 0x4e, 0x47]).expect("writes");

        let request =
            build_request("<html>page</html>", &png, &png, 2).expect("builds");
        assert!(request.instructions.contains("exactly 2 incorrect"));
        assert!(request.instructions.contains("<html>page</html>"));
        assert!(request.incorrect_image.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn inspection_html_escapes_markup() {
        let request = ModelRequest {
            instructions: "<style> & things".to_owned(),
            incorrect_image: "data:image/png;base64,AA==".to_owned(),
            reference_image: "data:image/png;base64,BB==".to_owned(),
            errors_count: 1,
        };
        let html = request_to_html(&request);
        assert!(html.contains("&lt;style&gt; &amp; things"));
        assert!(html.contains("data:image/png;base64,AA=="));
    }
}
