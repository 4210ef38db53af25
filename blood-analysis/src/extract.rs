//! Line-oriented extraction of candidate blood markers from recognized text.
//!
//! Every line is matched against each pattern in [`MARKER_PATTERNS`] and all
//! matches are kept, in pattern order. A line that fits both shapes yields two
//! markers; nothing is merged across lines and repeated names are not
//! deduplicated.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

use crate::models::{BloodMarker, MarkerValue, OcrResult};

/// Placeholder used when a line carries no reference range.
pub const MISSING_REF_RANGE: &str = "N/A";

/// Confidence assigned to text pulled out of a PDF text layer.
pub const PDF_TEXT_CONFIDENCE: f64 = 0.9;

static MARKER_PATTERNS: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        // Hemoglobin 14.5 g/dL (12.0-16.0)
        Regex::new(r"(\w+(?:\s+\w+)*)\s+([0-9]+(?:\.[0-9]+)?)\s*([a-zA-Z/]+)\s*\(([^)]+)\)")
            .expect("parenthesized marker pattern"),
        // Glucose: 95 mg/dL Ref: 70-100
        Regex::new(
            r"(\w+(?:\s+\w+)*):?\s+([0-9]+(?:\.[0-9]+)?)\s*([a-zA-Z/]+)\s*(?:Ref:?\s*)?([0-9][0-9.\s-]*)",
        )
        .expect("labeled marker pattern"),
    ]
});

/// Extract every marker candidate in `text`. Never fails; text without
/// recognizable lines gives an empty list.
pub fn extract_markers(text: &str) -> Vec<BloodMarker> {
    let mut markers = Vec::new();

    for line in text.split('\n') {
        for pattern in MARKER_PATTERNS.iter() {
            markers.extend(pattern.captures_iter(line).filter_map(marker_from_captures));
        }
    }

    debug!(count = markers.len(), "Extracted marker candidates");
    markers
}

fn marker_from_captures(caps: Captures<'_>) -> Option<BloodMarker> {
    let name = caps.get(1)?.as_str().trim();
    let value = caps.get(2)?.as_str().trim();
    let unit = caps.get(3)?.as_str().trim();

    if name.is_empty() || value.is_empty() || unit.is_empty() {
        return None;
    }

    let ref_range = caps
        .get(4)
        .map(|m| m.as_str().trim())
        .filter(|range| !range.is_empty())
        .unwrap_or(MISSING_REF_RANGE);

    Some(BloodMarker {
        name: name.to_string(),
        value: parse_value(value),
        unit: unit.to_string(),
        ref_range: ref_range.to_string(),
        status: None,
        confidence: None,
    })
}

/// Numeric tokens become numbers; anything that fails to parse is kept as
/// text instead of turning into NaN.
fn parse_value(token: &str) -> MarkerValue {
    match token.parse::<f64>() {
        Ok(n) if n.is_finite() => MarkerValue::Number(n),
        _ => MarkerValue::Text(token.to_string()),
    }
}

impl OcrResult {
    /// Wrap text from an external recognizer, running marker extraction over it.
    pub fn from_text(text: impl Into<String>, confidence: f64) -> Self {
        let text = text.into();
        let markers = extract_markers(&text);
        Self {
            text,
            confidence: confidence.clamp(0.0, 1.0),
            markers,
        }
    }

    /// Join the text of each PDF page, one page per line.
    pub fn from_pages<I, S>(pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut text = String::new();
        for page in pages {
            text.push_str(page.as_ref());
            text.push('\n');
        }
        Self::from_text(text, PDF_TEXT_CONFIDENCE)
    }
}
