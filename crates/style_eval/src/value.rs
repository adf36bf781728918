//! Value parsing and the comparison primitives behind the evaluators.

use anyhow::{Context as _, Result};
use csscolorparser::Color;

/// Extracts the first decimal number in a CSS value string, units ignored.
///
/// A value with no digits reads as 0. The scan starts at the first ASCII
/// digit and takes `digits [ "." digits ]`, so signs are never captured.
pub fn extract_numeric(value: &str) -> f64 {
    let bytes = value.as_bytes();
    let Some(start) = bytes.iter().position(u8::is_ascii_digit) else {
        return 0.0;
    };
    let mut end = start;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        let mut frac = end + 1;
        while frac < bytes.len() && bytes[frac].is_ascii_digit() {
            frac += 1;
        }
        end = frac;
    }
    value[start..end].parse().unwrap_or(0.0)
}

/// Numeric rule: relative difference within `tolerance`, with an exact-zero
/// special case (a zero reference only matches a zero candidate).
pub fn numeric_eq(reference: &str, candidate: &str, tolerance: f64) -> bool {
    let ref_val = extract_numeric(reference);
    let new_val = extract_numeric(candidate);
    if ref_val == 0.0 {
        return new_val == 0.0;
    }
    (ref_val - new_val).abs() / ref_val <= tolerance
}

/// Parses a CSS color to 8-bit RGB. Unparseable values read as black.
fn parse_rgb8(value: &str) -> (u8, u8, u8) {
    value
        .trim()
        .parse::<Color>()
        .map(|color| {
            let [red, green, blue, _alpha] = color.to_rgba8();
            (red, green, blue)
        })
        .unwrap_or((0, 0, 0))
}

/// Converts unit-normalized RGB to HSV, all channels in `[0, 1]`.
fn rgb_to_hsv(red: f64, green: f64, blue: f64) -> (f64, f64, f64) {
    let max = red.max(green).max(blue);
    let min = red.min(green).min(blue);
    let delta = max - min;

    let value = max;
    let saturation = if max == 0.0 { 0.0 } else { delta / max };
    if delta == 0.0 {
        return (0.0, saturation, value);
    }

    let hue = if max == red {
        ((green - blue) / delta).rem_euclid(6.0)
    } else if max == green {
        (blue - red) / delta + 2.0
    } else {
        (red - green) / delta + 4.0
    } / 6.0;

    (hue, saturation, value)
}

/// Perceptual distance between two colors in HSV space.
///
/// Hue is circular and weighted double; saturation and value contribute
/// their plain absolute differences.
pub fn color_distance(reference: &str, candidate: &str) -> f64 {
    let (r1, g1, b1) = parse_rgb8(reference);
    let (r2, g2, b2) = parse_rgb8(candidate);

    let hsv1 = rgb_to_hsv(
        f64::from(r1) / 255.0,
        f64::from(g1) / 255.0,
        f64::from(b1) / 255.0,
    );
    let hsv2 = rgb_to_hsv(
        f64::from(r2) / 255.0,
        f64::from(g2) / 255.0,
        f64::from(b2) / 255.0,
    );

    let hue_gap = (hsv1.0 - hsv2.0).abs();
    let h_diff = hue_gap.min(1.0 - hue_gap) * 2.0;
    let s_diff = (hsv1.1 - hsv2.1).abs();
    let v_diff = (hsv1.2 - hsv2.2).abs();

    h_diff.hypot(s_diff).hypot(v_diff)
}

/// Color rule: identical literals always match; otherwise the perceptual
/// distance must be within `tolerance`.
pub fn color_eq(reference: &str, candidate: &str, tolerance: f64) -> bool {
    if reference == candidate {
        return true;
    }
    color_distance(reference, candidate) <= tolerance
}

/// Parses `"W/H"` or a bare decimal into a ratio.
///
/// # Errors
///
/// Returns an error if either side is not a decimal number.
pub fn parse_aspect_ratio(value: &str) -> Result<f64> {
    if let Some((numerator, denominator)) = value.split_once('/') {
        let num: f64 = numerator
            .trim()
            .parse()
            .with_context(|| format!("bad aspect ratio numerator in '{value}'"))?;
        let den: f64 = denominator
            .trim()
            .parse()
            .with_context(|| format!("bad aspect ratio denominator in '{value}'"))?;
        Ok(num / den)
    } else {
        value
            .trim()
            .parse()
            .with_context(|| format!("bad aspect ratio '{value}'"))
    }
}

/// Aspect-ratio rule: relative difference within `tolerance`.
///
/// No zero special case here, unlike the numeric rule: a zero aspect ratio
/// is degenerate input, so the raw division stands.
///
/// # Errors
///
/// Returns an error if either value fails to parse as a ratio.
pub fn aspect_ratio_eq(reference: &str, candidate: &str, tolerance: f64) -> Result<bool> {
    let ref_ratio = parse_aspect_ratio(reference)?;
    let new_ratio = parse_aspect_ratio(candidate)?;
    Ok((ref_ratio - new_ratio).abs() / ref_ratio <= tolerance)
}

/// Grid-template rule: track lists of equal length whose corresponding
/// tracks each satisfy the numeric rule.
pub fn grid_template_eq(reference: &str, candidate: &str, tolerance: f64) -> bool {
    let ref_tracks: Vec<&str> = reference.split_whitespace().collect();
    let new_tracks: Vec<&str> = candidate.split_whitespace().collect();
    if ref_tracks.len() != new_tracks.len() {
        return false;
    }
    ref_tracks
        .iter()
        .zip(&new_tracks)
        .all(|(ref_track, new_track)| numeric_eq(ref_track, new_track, tolerance))
}
