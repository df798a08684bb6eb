//! Image cards.

use super::{TextMeasure, note_height};
use crate::config::BoardConfig;
use serde::{Deserialize, Serialize};

/// An image stored in the board's asset directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageContent {
    /// Path relative to the board directory (`assets/<file>`).
    pub src: String,
    pub natural_width: f64,
    pub natural_height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default)]
    pub note_expanded: bool,
}

impl ImageContent {
    pub fn new(src: impl Into<String>, natural_width: f64, natural_height: f64) -> Self {
        Self {
            src: src.into(),
            natural_width,
            natural_height,
            note: None,
            note_expanded: false,
        }
    }

    /// Height/width ratio, falling back when the natural size is unusable.
    pub fn aspect(&self, config: &BoardConfig) -> f64 {
        let (w, h) = (self.natural_width, self.natural_height);
        if w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0 {
            h / w
        } else {
            config.image_fallback_aspect
        }
    }

    pub(super) fn natural_height(&self, config: &BoardConfig, measure: &dyn TextMeasure) -> f64 {
        let mut height = config.card_header_height + config.card_width * self.aspect(config);
        if self.note_expanded {
            height += note_height(self.note.as_deref().unwrap_or_default(), config, measure);
        }
        height
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::{CardContent, EstimatedTextMeasure, content_height};

    #[test]
    fn test_height_follows_aspect_ratio() {
        let config = BoardConfig::default();
        let m = EstimatedTextMeasure::default();
        let content = CardContent::Image(ImageContent::new("assets/a.png", 528.0, 264.0));
        // header 22 + 264 * 0.5 = 154 -> 154 is already a grid multiple
        assert_eq!(content_height(&content, &config, &m), 154.0);
    }

    #[test]
    fn test_missing_dimensions_use_fallback() {
        let config = BoardConfig::default();
        let image = ImageContent::new("assets/a.png", 0.0, f64::NAN);
        assert_eq!(image.aspect(&config), config.image_fallback_aspect);
    }

    #[test]
    fn test_expanded_note_has_minimum() {
        let config = BoardConfig::default();
        let m = EstimatedTextMeasure::default();
        let mut image = ImageContent::new("assets/a.png", 264.0, 264.0);
        let collapsed = image.natural_height(&config, &m);
        image.note_expanded = true;
        let expanded = image.natural_height(&config, &m);
        assert_eq!(expanded - collapsed, config.note_min_height);
    }
}
