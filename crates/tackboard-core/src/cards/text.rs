//! Text cards, the bold-span syntax and text measurement.

use crate::config::BoardConfig;
use serde::{Deserialize, Serialize};

/// Body of a text card.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextContent {
    #[serde(default)]
    pub text: String,
}

impl TextContent {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub(super) fn natural_height(&self, config: &BoardConfig, measure: &dyn TextMeasure) -> f64 {
        let inner = config.card_width - 2.0 * config.text_padding;
        let content = measure.text_height(&plain_text(&self.text), inner) + 2.0 * config.text_padding;
        (config.card_header_height + content).max(config.min_text_card_height)
    }

    /// Styled spans of the body.
    pub fn spans(&self) -> Vec<TextSpan> {
        parse_bold_spans(&self.text)
    }
}

/// Measures rendered text height for a given wrap width.
///
/// The engine has no access to real font metrics, so the host supplies a
/// measurer; [`EstimatedTextMeasure`] is the built-in approximation.
pub trait TextMeasure {
    fn text_height(&self, text: &str, width: f64) -> f64;
}

/// Fixed-advance text measurer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatedTextMeasure {
    /// Average glyph advance.
    pub char_width: f64,
    pub line_height: f64,
}

impl Default for EstimatedTextMeasure {
    fn default() -> Self {
        Self {
            char_width: 8.0,
            line_height: 20.0,
        }
    }
}

impl TextMeasure for EstimatedTextMeasure {
    fn text_height(&self, text: &str, width: f64) -> f64 {
        let per_line = ((width / self.char_width).floor() as usize).max(1);
        let lines: usize = text
            .split('\n')
            .map(|line| {
                let chars = line.chars().count();
                chars.div_ceil(per_line).max(1)
            })
            .sum();
        lines as f64 * self.line_height
    }
}

/// A run of text with a single style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextSpan {
    Plain(String),
    Bold(String),
}

impl TextSpan {
    pub fn text(&self) -> &str {
        match self {
            TextSpan::Plain(s) | TextSpan::Bold(s) => s,
        }
    }
}

/// Split text on `**bold**` markers.
///
/// An unmatched trailing `**` is kept literally.
pub fn parse_bold_spans(text: &str) -> Vec<TextSpan> {
    let mut spans = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("**") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("**") else {
            break;
        };
        if start > 0 {
            spans.push(TextSpan::Plain(rest[..start].to_string()));
        }
        if end > 0 {
            spans.push(TextSpan::Bold(after[..end].to_string()));
        }
        rest = &after[end + 2..];
    }
    if !rest.is_empty() {
        spans.push(TextSpan::Plain(rest.to_string()));
    }
    spans
}

/// Text with bold markers removed.
pub fn plain_text(text: &str) -> String {
    parse_bold_spans(text).iter().map(TextSpan::text).collect()
}
