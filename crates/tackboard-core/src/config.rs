//! Engine configuration: grid, card geometry, thresholds and history tuning.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Grid tile size in board units.
pub const GRID_SIZE: f64 = 22.0;
/// Sub-grid offset applied to every snapped coordinate.
pub const GRID_OFFSET: f64 = 1.0;
/// Width shared by every card (and every column).
pub const CARD_WIDTH: f64 = 264.0;
/// Board extent.
pub const BOARD_WIDTH: f64 = 8800.0;
pub const BOARD_HEIGHT: f64 = 8800.0;
/// Vertical spacing between stacked cards in a column.
pub const COLUMN_GAP: f64 = 22.0;
/// Height of the column title bar drawn above the first card.
pub const COLUMN_HEADER_HEIGHT: f64 = 44.0;
/// Padding around a column's stacked content.
pub const COLUMN_PADDING: f64 = 11.0;
/// Height of the drag header on every card.
pub const CARD_HEADER_HEIGHT: f64 = 22.0;
/// Minimum height of a text card.
pub const MIN_TEXT_CARD_HEIGHT: f64 = 88.0;
/// Inner padding around measured text.
pub const TEXT_PADDING: f64 = 12.0;
/// Minimum height of an expanded note.
pub const NOTE_MIN_HEIGHT: f64 = 66.0;
/// Border allowance added below an expanded link note.
pub const NOTE_BORDER: f64 = 2.0;
/// Height of the preview image slot on link cards.
pub const LINK_IMAGE_HEIGHT: f64 = 132.0;
/// Height of the title/site slot on link cards.
pub const LINK_TEXT_HEIGHT: f64 = 66.0;
/// Aspect ratio used when an image has no usable natural size.
pub const IMAGE_FALLBACK_ASPECT: f64 = 0.75;
/// Horizontal distance past which a list card detaches on release.
pub const DETACH_THRESHOLD: f64 = 140.0;
/// Horizontal distance past which the detach preview is shown.
pub const DETACH_PREVIEW_THRESHOLD: f64 = 70.0;
/// Pointer travel below which a gesture counts as a click.
pub const MIN_DRAG_DISTANCE: f64 = 4.0;
/// Maximum number of undo states to keep.
pub const MAX_UNDO_HISTORY: usize = 100;
/// Idle delay before a non-interactive edit becomes a history step.
pub const HISTORY_DEBOUNCE_MS: u64 = 400;
/// Idle delay before a settled board is written to storage.
pub const AUTOSAVE_DEBOUNCE_MS: u64 = 800;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: f64 },
}

/// Tunable parameters of the board engine.
///
/// Every field defaults to the matching module constant, so a partial JSON
/// document only overrides what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BoardConfig {
    pub grid_size: f64,
    pub grid_offset: f64,
    pub card_width: f64,
    pub board_width: f64,
    pub board_height: f64,
    pub column_gap: f64,
    pub column_header_height: f64,
    pub column_padding: f64,
    pub card_header_height: f64,
    pub min_text_card_height: f64,
    pub text_padding: f64,
    pub note_min_height: f64,
    pub note_border: f64,
    pub link_image_height: f64,
    pub link_text_height: f64,
    pub image_fallback_aspect: f64,
    pub detach_threshold: f64,
    pub detach_preview_threshold: f64,
    pub min_drag_distance: f64,
    pub max_history: usize,
    pub history_debounce_ms: u64,
    pub autosave_debounce_ms: u64,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            grid_size: GRID_SIZE,
            grid_offset: GRID_OFFSET,
            card_width: CARD_WIDTH,
            board_width: BOARD_WIDTH,
            board_height: BOARD_HEIGHT,
            column_gap: COLUMN_GAP,
            column_header_height: COLUMN_HEADER_HEIGHT,
            column_padding: COLUMN_PADDING,
            card_header_height: CARD_HEADER_HEIGHT,
            min_text_card_height: MIN_TEXT_CARD_HEIGHT,
            text_padding: TEXT_PADDING,
            note_min_height: NOTE_MIN_HEIGHT,
            note_border: NOTE_BORDER,
            link_image_height: LINK_IMAGE_HEIGHT,
            link_text_height: LINK_TEXT_HEIGHT,
            image_fallback_aspect: IMAGE_FALLBACK_ASPECT,
            detach_threshold: DETACH_THRESHOLD,
            detach_preview_threshold: DETACH_PREVIEW_THRESHOLD,
            min_drag_distance: MIN_DRAG_DISTANCE,
            max_history: MAX_UNDO_HISTORY,
            history_debounce_ms: HISTORY_DEBOUNCE_MS,
            autosave_debounce_ms: AUTOSAVE_DEBOUNCE_MS,
        }
    }
}

impl BoardConfig {
    /// Parse a (possibly partial) JSON config and validate it.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the geometry code cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("gridSize", self.grid_size),
            ("cardWidth", self.card_width),
            ("boardWidth", self.board_width),
            ("boardHeight", self.board_height),
        ];
        for (field, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidValue { field, value });
            }
        }
        let non_negative = [
            ("gridOffset", self.grid_offset),
            ("columnGap", self.column_gap),
            ("columnPadding", self.column_padding),
            ("detachThreshold", self.detach_threshold),
            ("detachPreviewThreshold", self.detach_preview_threshold),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidValue { field, value });
            }
        }
        if self.grid_offset >= self.grid_size {
            return Err(ConfigError::InvalidValue {
                field: "gridOffset",
                value: self.grid_offset,
            });
        }
        let non_zero = [
            ("maxHistory", self.max_history as u64),
            ("historyDebounceMs", self.history_debounce_ms),
            ("autosaveDebounceMs", self.autosave_debounce_ms),
        ];
        for (field, value) in non_zero {
            if value == 0 {
                return Err(ConfigError::InvalidValue { field, value: 0.0 });
            }
        }
                if self.card_width > self.board_width {
            return Err(ConfigError::InvalidValue {
                field: "cardWidth",
                value: self.card_width,
            });
        }
        Ok(())
    }

    /// Largest x a card (or column) may occupy.
    pub fn max_card_x(&self) -> f64 {
        self.board_width - self.card_width
    }

    /// Largest y for an item of the given height.
    pub fn max_y_for(&self, height: f64) -> f64 {
        (self.board_height - height).max(0.0)
    }

    pub fn history_debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.history_debounce_ms)
    }
}
