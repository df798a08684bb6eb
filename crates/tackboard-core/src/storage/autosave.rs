//! Auto-save functionality for board persistence.
//!
//! Writes the board at most once per interval while it has unsaved
//! changes, and never writes a board identical to what storage already
//! holds.

use crate::board::Board;
use crate::cards::TextMeasure;
use crate::config::BoardConfig;
use crate::history::{Signature, board_signature};
use crate::normalize::normalize_board;
use crate::storage::{Storage, StorageResult};
use std::sync::Arc;

#[cfg(not(target_arch = "wasm32"))]
use std::time::{Duration, Instant};

#[cfg(target_arch = "wasm32")]
use web_time::{Duration, Instant};

/// Manages automatic board persistence.
pub struct AutoSaveManager<S: Storage> {
    /// Storage backend.
    storage: Arc<S>,
    /// Auto-save interval.
    interval: Duration,
    /// Last save timestamp.
    last_save: Option<Instant>,
    /// Whether the board has unsaved changes.
    dirty: bool,
    /// Board being edited.
    current_board_id: Option<String>,
    /// Signature of the state storage is known to hold.
    persisted: Option<Signature>,
}

impl<S: Storage> AutoSaveManager<S> {
    /// Create a new auto-save manager with the default interval.
    pub fn new(storage: Arc<S>) -> Self {
        Self::with_config(storage, &BoardConfig::default())
    }

    /// Create a manager using the config's autosave debounce.
    pub fn with_config(storage: Arc<S>, config: &BoardConfig) -> Self {
        Self {
            storage,
            interval: Duration::from_millis(config.autosave_debounce_ms),
            last_save: None,
            dirty: false,
            current_board_id: None,
            persisted: None,
        }
    }

    /// Set the auto-save interval.
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// Get the auto-save interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Mark the board as having unsaved changes.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Check if the board has unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Set the current board ID.
    pub fn set_board_id(&mut self, id: Option<String>) {
        if self.current_board_id != id {
            self.persisted = None;
        }
        self.current_board_id = id;
    }

    /// Get the current board ID.
    pub fn board_id(&self) -> Option<&str> {
        self.current_board_id.as_deref()
    }

    /// Check if enough time has passed since the last save at `now`.
    pub fn should_save_at(&self, now: Instant) -> bool {
        if !self.dirty {
            return false;
        }

        match self.last_save {
            Some(last) => now.saturating_duration_since(last) >= self.interval,
            None => true,
        }
    }

    /// Check if enough time has passed for an auto-save.
    pub fn should_save(&self) -> bool {
        self.should_save_at(Instant::now())
    }

    /// Save the board if needed (dirty + interval elapsed).
    /// Returns true if a write was performed.
    pub async fn maybe_save(&mut self, board: &Board) -> StorageResult<bool> {
        if !self.should_save() {
            return Ok(false);
        }

        self.save(board).await
    }

    /// Save the board now unless storage already holds the same state.
    /// Returns true if a write was performed.
    ///
    /// On failure the board stays dirty so the next cycle retries.
    pub async fn save(&mut self, board: &Board) -> StorageResult<bool> {
        let board_id = self.current_board_id.clone().unwrap_or_else(|| board.id.clone());
        let signature = board_signature(board);

        if self.persisted.as_ref() == Some(&signature) {
            log::debug!("Board {} unchanged since last save, skipping", board_id);
            self.dirty = false;
            return Ok(false);
        }

        if let Err(e) = self.storage.save_board(&board_id, board).await {
            log::error!("Autosave of board {} failed: {}", board_id, e);
            return Err(e);
        }

        self.current_board_id = Some(board_id);
        self.persisted = Some(signature);
        self.last_save = Some(Instant::now());
        self.dirty = false;

        Ok(true)
    }

    /// Load and normalize a board, making it the current board.
    ///
    /// The normalized result counts as persisted, so opening a board does
    /// not trigger a write until it is edited.
    pub async fn load(&mut self, id: &str, config: &BoardConfig, measure: &dyn TextMeasure) -> StorageResult<Board> {
        let raw = self.storage.load_board(id).await?;
        let board = normalize_board(raw, config, measure);

        self.current_board_id = Some(id.to_string());
        self.persisted = Some(board_signature(&board));
        self.dirty = false;
        self.last_save = Some(Instant::now());
        Ok(board)
    }

    /// Get a reference to the storage backend.
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }
}

/// Create a platform-appropriate storage backend.
#[cfg(not(target_arch = "wasm32"))]
pub fn create_default_storage() -> StorageResult<Arc<crate::storage::FileStorage>> {
    Ok(Arc::new(crate::storage::FileStorage::default_location()?))
}

#[cfg(target_arch = "wasm32")]
pub fn create_default_storage() -> StorageResult<Arc<crate::storage::MemoryStorage>> {
    Ok(Arc::new(crate::storage::MemoryStorage::new()))
}

/// Convenience type alias for platform-specific storage.
#[cfg(not(target_arch = "wasm32"))]
pub type PlatformStorage = crate::storage::FileStorage;

#[cfg(target_arch = "wasm32")]
pub type PlatformStorage = crate::storage::MemoryStorage;

/// Type alias for the auto-save manager with platform-specific storage.
pub type PlatformAutoSaveManager = AutoSaveManager<PlatformStorage>;

/// Convenience function to create an auto-save manager with default storage.
pub fn create_autosave_manager() -> StorageResult<PlatformAutoSaveManager> {
    let storage = create_default_storage()?;
    Ok(AutoSaveManager::new(storage))
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use crate::cards::{Card, CardContent, EstimatedTextMeasure, TextContent};
    use crate::storage::{MemoryStorage, StorageError, block_on};
    use kurbo::Point;

    fn text_card(text: &str, config: &BoardConfig, measure: &dyn TextMeasure) -> Card {
        Card::new(Point::new(23.0, 23.0), CardContent::Text(TextContent::new(text)), config, measure)
    }

    fn manager() -> AutoSaveManager<MemoryStorage> {
        AutoSaveManager::new(Arc::new(MemoryStorage::new()))
    }

    #[test]
    fn test_autosave_manager_creation() {
        let manager = manager();
        assert!(!manager.is_dirty());
        assert!(!manager.should_save());
        assert_eq!(manager.interval(), Duration::from_millis(800));
    }

    #[test]
    fn test_autosave_dirty_flag_and_interval() {
        let mut manager = manager();
        manager.mark_dirty();
        assert!(manager.should_save());

        let board = Board::new("b1", "One");
        assert!(block_on(manager.save(&board)).unwrap());
        assert!(!manager.is_dirty());

        manager.mark_dirty();
        let now = Instant::now();
        assert!(!manager.should_save_at(now));
        assert!(manager.should_save_at(now + Duration::from_secs(1)));
    }

    #[test]
    fn test_identical_board_is_not_rewritten() {
        let mut manager = manager();
        let mut board = Board::new("b1", "One");
        manager.mark_dirty();
        assert!(block_on(manager.save(&board)).unwrap());

        manager.mark_dirty();
        assert!(!block_on(manager.save(&board)).unwrap());
        assert!(!manager.is_dirty());

        let config = BoardConfig::default();
        let measure = EstimatedTextMeasure::default();
        board.add_card(text_card("hello", &config, &measure));
        manager.mark_dirty();
        assert!(block_on(manager.save(&board)).unwrap());
    }

    #[test]
    fn test_load_skips_first_autosave() {
        let storage = Arc::new(MemoryStorage::new());
        let config = BoardConfig::default();
        let measure = EstimatedTextMeasure::default();
        let mut stored = Board::new("b1", "Stored");
        stored.add_card(text_card("hi", &config, &measure));
        block_on(storage.save_board("b1", &stored)).unwrap();

        let mut manager = AutoSaveManager::new(storage);
        let loaded = block_on(manager.load("b1", &config, &measure)).unwrap();
        assert_eq!(manager.board_id(), Some("b1"));
        assert_eq!(loaded.cards.len(), 1);

        manager.mark_dirty();
        assert!(!block_on(manager.save(&loaded)).unwrap());
    }

    #[test]
    fn test_failed_save_stays_dirty() {
        let storage = Arc::new(MemoryStorage::new());
        let meta = block_on(storage.create_board("Gone")).unwrap();
        block_on(storage.delete_board(&meta.id)).unwrap();

        let mut manager = AutoSaveManager::new(storage);
        manager.set_board_id(Some(meta.id.clone()));
        manager.mark_dirty();
        let board = Board::new(meta.id, "Gone");
        assert!(matches!(block_on(manager.save(&board)), Err(StorageError::Deleted(_))));
        assert!(manager.is_dirty());
    }
}
