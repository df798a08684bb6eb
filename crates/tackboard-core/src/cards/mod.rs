//! Card definitions for the board.

mod image;
mod link;
mod text;

pub use image::ImageContent;
pub use link::{LinkContent, LinkError, LinkMetadata, validate_link_url};
pub use text::{EstimatedTextMeasure, TextContent, TextMeasure, TextSpan, parse_bold_spans, plain_text};

use crate::config::BoardConfig;
use crate::grid::ceil_to_grid;
use kurbo::{Point, Rect, Size};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque unique identifier for cards and columns.
///
/// Persisted boards may carry ids from other generators, so the id is kept
/// as a string; fresh ids are UUIDv4.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Generate a fresh unique id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Unique identifier for cards.
pub type CardId = EntityId;
/// Unique identifier for columns.
pub type ColumnId = EntityId;

/// Variant payload of a card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CardContent {
    Text(TextContent),
    Image(ImageContent),
    Link(LinkContent),
}

impl CardContent {
    /// Wire name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            CardContent::Text(_) => "text",
            CardContent::Image(_) => "image",
            CardContent::Link(_) => "link",
        }
    }

    /// Unrounded height the content needs at `config.card_width`.
    fn natural_height(&self, config: &BoardConfig, measure: &dyn TextMeasure) -> f64 {
        match self {
            CardContent::Text(t) => t.natural_height(config, measure),
            CardContent::Image(i) => i.natural_height(config, measure),
            CardContent::Link(l) => l.natural_height(config, measure),
        }
    }
}

/// Derive the stored height for a card payload: grid-ceiled content height.
pub fn content_height(content: &CardContent, config: &BoardConfig, measure: &dyn TextMeasure) -> f64 {
    ceil_to_grid(content.natural_height(config, measure), config.grid_size)
}

/// Height of an expanded note block, shared by image and link cards.
pub(crate) fn note_height(note: &str, config: &BoardConfig, measure: &dyn TextMeasure) -> f64 {
    let inner = config.card_width - 2.0 * config.text_padding;
    let measured = measure.text_height(&plain_text(note), inner) + 2.0 * config.text_padding;
    measured.max(config.note_min_height)
}

/// A card on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(flatten)]
    pub content: CardContent,
}

impl Card {
    /// Create a card at `position` with its width and height derived from
    /// the config and content.
    pub fn new(
        position: Point,
        content: CardContent,
        config: &BoardConfig,
        measure: &dyn TextMeasure,
    ) -> Self {
        let height = content_height(&content, config, measure);
        Self {
            id: CardId::new(),
            x: position.x,
            y: position.y,
            width: config.card_width,
            height,
            content,
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn set_position(&mut self, position: Point) {
        self.x = position.x;
        self.y = position.y;
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Bounding box in board coordinates.
    pub fn rect(&self) -> Rect {
        Rect::from_origin_size(self.position(), self.size())
    }

    /// Bounding box if the card were placed at `origin`.
    pub fn rect_at(&self, origin: Point) -> Rect {
        Rect::from_origin_size(origin, self.size())
    }

    pub fn kind(&self) -> &'static str {
        self.content.kind()
    }

    /// Replace the id with a fresh one (used when duplicating).
    pub fn regenerate_id(&mut self) {
        self.id = CardId::new();
    }

    /// Re-derive width and height from the content.
    /// Returns true if either changed.
    pub fn refresh_size(&mut self, config: &BoardConfig, measure: &dyn TextMeasure) -> bool {
        let height = content_height(&self.content, config, measure);
        let changed = self.height != height || self.width != config.card_width;
        self.height = height;
        self.width = config.card_width;
        changed
    }

    /// Note attached to image and link cards.
    pub fn note(&self) -> Option<&str> {
        match &self.content {
            CardContent::Text(_) => None,
            CardContent::Image(i) => i.note.as_deref(),
            CardContent::Link(l) => l.note.as_deref(),
        }
    }

    /// Set the note on image and link cards. Returns false for text cards.
    pub fn set_note(&mut self, note: Option<String>) -> bool {
        let note = note.filter(|n| !n.trim().is_empty());
        match &mut self.content {
            CardContent::Text(_) => false,
            CardContent::Image(i) => {
                i.note = note;
                true
            }
            CardContent::Link(l) => {
                l.note = note;
                true
            }
        }
    }

    /// Flip the note-expanded flag. Returns the new state, or `None` for
    /// text cards.
    pub fn toggle_note(&mut self) -> Option<bool> {
        let flag = match &mut self.content {
            CardContent::Text(_) => return None,
            CardContent::Image(i) => &mut i.note_expanded,
            CardContent::Link(l) => &mut l.note_expanded,
        };
        *flag = !*flag;
        Some(*flag)
    }

    pub fn as_link(&self) -> Option<&LinkContent> {
        match &self.content {
            CardContent::Link(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_link_mut(&mut self) -> Option<&mut LinkContent> {
        match &mut self.content {
            CardContent::Link(l) => Some(l),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_card(body: &str) -> Card {
        Card::new(
            Point::new(1.0, 1.0),
            CardContent::Text(TextContent::new(body)),
            &BoardConfig::default(),
            &EstimatedTextMeasure::default(),
        )
    }

    #[test]
    fn test_card_width_is_global_constant() {
        let card = text_card("hello");
        assert_eq!(card.width, BoardConfig::default().card_width);
    }

    #[test]
    fn test_card_height_is_grid_multiple() {
        let config = BoardConfig::default();
        let card = text_card(&"long words ".repeat(40));
        assert_eq!(card.height % config.grid_size, 0.0);
        assert!(card.height >= config.min_text_card_height);
    }

    #[test]
    fn test_regenerate_id() {
        let mut card = text_card("a");
        let old = card.id.clone();
        card.regenerate_id();
        assert_ne!(card.id, old);
    }

    #[test]
    fn test_serialized_shape_is_flat() {
        let card = text_card("hi");
        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["text"], "hi");
        assert!(json["x"].is_number());
    }

    #[test]
    fn test_note_operations_skip_text_cards() {
        let mut card = text_card("a");
        assert!(!card.set_note(Some("n".into())));
        assert_eq!(card.toggle_note(), None);
        assert_eq!(card.note(), None);
    }

    #[test]
    fn test_toggle_note_on_image() {
        let config = BoardConfig::default();
        let measure = EstimatedTextMeasure::default();
        let mut card = Card::new(
            Point::ZERO,
            CardContent::Image(ImageContent::new("assets/a.png", 400.0, 300.0)),
            &config,
            &measure,
        );
        let collapsed = card.height;
        assert!(card.set_note(Some("a note".into())));
        assert_eq!(card.toggle_note(), Some(true));
        assert!(card.refresh_size(&config, &measure));
        assert!(card.height > collapsed);
    }
}
