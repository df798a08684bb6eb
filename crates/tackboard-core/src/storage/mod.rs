//! Storage abstraction for board persistence.
//!
//! A backend keeps an index of boards, the board documents themselves, a
//! chat transcript per board, image assets and a trash for deleted boards.

mod autosave;
mod memory;

#[cfg(not(target_arch = "wasm32"))]
mod file;

pub use autosave::{
    AutoSaveManager,
    PlatformAutoSaveManager,
    PlatformStorage,
    create_autosave_manager,
    create_default_storage,
};
pub use memory::MemoryStorage;

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileStorage;

use crate::board::{Board, DEFAULT_BOARD_NAME};
use crate::chat::ChatStore;
use crate::normalize::RawBoard;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

#[cfg(not(target_arch = "wasm32"))]
use std::time::{SystemTime, UNIX_EPOCH};
#[cfg(target_arch = "wasm32")]
use web_time::{SystemTime, UNIX_EPOCH};

/// Current version of the board index.
pub const BOARD_INDEX_VERSION: u32 = 1;
/// Longest accepted board id.
pub const MAX_BOARD_ID_LEN: usize = 64;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Board not found: {0}")]
    NotFound(String),
    #[error("Invalid board id: {0:?}")]
    InvalidId(String),
    #[error("Board is deleted: {0}")]
    Deleted(String),
    #[error("Board already exists: {0}")]
    AlreadyExists(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed future for async operations (compatible with WASM).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Index entry describing a stored board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardMeta {
    pub id: String,
    pub name: String,
    /// Milliseconds since the Unix epoch.
    pub updated_at: i64,
    /// Set while the board sits in the trash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<i64>,
}

impl BoardMeta {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// The list of all boards, live and trashed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardIndex {
    pub version: u32,
    pub boards: Vec<BoardMeta>,
}

impl Default for BoardIndex {
    fn default() -> Self {
        Self {
            version: BOARD_INDEX_VERSION,
            boards: Vec::new(),
        }
    }
}

impl BoardIndex {
    pub fn get(&self, id: &str) -> Option<&BoardMeta> {
        self.boards.iter().find(|b| b.id == id)
    }

    /// Name recorded for a board, or the default name.
    pub fn name_of(&self, id: &str) -> String {
        self.get(id)
            .map(|b| b.name.clone())
            .unwrap_or_else(|| DEFAULT_BOARD_NAME.to_string())
    }

    /// Record a live board, updating its entry if present.
    pub fn touch(&mut self, id: &str, name: &str, now: i64) {
        match self.boards.iter_mut().find(|b| b.id == id) {
            Some(meta) => {
                meta.name = name.to_string();
                meta.updated_at = now;
                meta.deleted_at = None;
            }
            None => self.boards.push(BoardMeta {
                id: id.to_string(),
                name: name.to_string(),
                updated_at: now,
                deleted_at: None,
            }),
        }
    }

    /// Live boards in index order.
    pub fn live(&self) -> Vec<BoardMeta> {
        self.boards.iter().filter(|b| !b.is_deleted()).cloned().collect()
    }

    /// Trashed boards, most recently deleted first.
    pub fn trashed(&self) -> Vec<BoardMeta> {
        let mut boards: Vec<BoardMeta> = self.boards.iter().filter(|b| b.is_deleted()).cloned().collect();
        boards.sort_by_key(|b| std::cmp::Reverse(b.deleted_at.unwrap_or(0)));
        boards
    }
}

/// Whether `id` is safe to use as a board directory name.
pub fn is_valid_board_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_BOARD_ID_LEN
        && !id.contains("..")
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub(crate) fn validate_board_id(id: &str) -> StorageResult<()> {
    if is_valid_board_id(id) {
        Ok(())
    } else {
        Err(StorageError::InvalidId(id.to_string()))
    }
}

/// Make an asset file name safe to join onto the assets directory.
pub fn sanitize_asset_name(name: &str) -> String {
    name.replace('\\', "_").replace('/', "_").replace("..", "_")
}

/// Trimmed board name, or the default for blank input.
pub(crate) fn board_display_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        DEFAULT_BOARD_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Reject a payload whose id does not match the target board.
pub(crate) fn check_payload_id(board_id: &str, board: &Board) -> StorageResult<()> {
    if board.id == board_id {
        Ok(())
    } else {
        Err(StorageError::Other(format!(
            "Board id mismatch (payload {}, expected {})",
            board.id, board_id
        )))
    }
}

/// Pick `board-<millis>`, adding a numeric suffix while `taken` says the
/// candidate is in use.
pub(crate) fn generate_board_id(now: i64, taken: impl Fn(&str) -> bool) -> String {
    let base = format!("board-{now}");
    if !taken(&base) {
        return base;
    }
    (1..)
        .map(|i| format!("{base}-{i}"))
        .find(|candidate| !taken(candidate))
        .unwrap_or(base)
}

/// Current time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Trait for board storage backends.
///
/// Board ids must satisfy [`is_valid_board_id`]. Loading a board that has
/// no document yet creates an empty one, matching how new boards are
/// opened.
///
/// Note: On native platforms, implementations must be Send + Sync.
/// On WASM, these bounds are relaxed since it's single-threaded.
#[cfg(not(target_arch = "wasm32"))]
pub trait Storage: Send + Sync {
    /// Save a board document; rejects id mismatches and trashed boards.
    fn save_board(&self, board_id: &str, board: &Board) -> BoxFuture<'_, StorageResult<()>>;

    /// Load a board document in its raw, unvalidated form.
    fn load_board(&self, board_id: &str) -> BoxFuture<'_, StorageResult<RawBoard>>;

    /// Live boards.
    fn list_boards(&self) -> BoxFuture<'_, StorageResult<Vec<BoardMeta>>>;

    /// Boards in the trash, most recently deleted first.
    fn list_trashed_boards(&self) -> BoxFuture<'_, StorageResult<Vec<BoardMeta>>>;

    /// Create an empty board with a generated id.
    fn create_board(&self, name: &str) -> BoxFuture<'_, StorageResult<BoardMeta>>;

    /// Move a board to the trash.
    fn delete_board(&self, board_id: &str) -> BoxFuture<'_, StorageResult<()>>;

    /// Bring a board back from the trash.
    fn restore_board(&self, board_id: &str) -> BoxFuture<'_, StorageResult<()>>;

    /// Permanently remove every trashed board.
    fn empty_trash(&self) -> BoxFuture<'_, StorageResult<()>>;

    fn load_chat(&self, board_id: &str) -> BoxFuture<'_, StorageResult<ChatStore>>;

    fn save_chat(&self, board_id: &str, chat: &ChatStore) -> BoxFuture<'_, StorageResult<()>>;

    /// Store a base64-encoded image and return its board-relative path.
    fn save_image(&self, board_id: &str, filename: &str, bytes_base64: &str) -> BoxFuture<'_, StorageResult<String>>;

    /// Location of a board's asset directory.
    fn assets_dir(&self, board_id: &str) -> BoxFuture<'_, StorageResult<String>>;
}

/// Trait for board storage backends (WASM version without Send + Sync).
#[cfg(target_arch = "wasm32")]
pub trait Storage {
    /// Save a board document; rejects id mismatches and trashed boards.
    fn save_board(&self, board_id: &str, board: &Board) -> BoxFuture<'_, StorageResult<()>>;

    /// Load a board document in its raw, unvalidated form.
    fn load_board(&self, board_id: &str) -> BoxFuture<'_, StorageResult<RawBoard>>;

    /// Live boards.
    fn list_boards(&self) -> BoxFuture<'_, StorageResult<Vec<BoardMeta>>>;

    /// Boards in the trash, most recently deleted first.
    fn list_trashed_boards(&self) -> BoxFuture<'_, StorageResult<Vec<BoardMeta>>>;

    /// Create an empty board with a generated id.
    fn create_board(&self, name: &str) -> BoxFuture<'_, StorageResult<BoardMeta>>;

    /// Move a board to the trash.
    fn delete_board(&self, board_id: &str) -> BoxFuture<'_, StorageResult<()>>;

    /// Bring a board back from the trash.
    fn restore_board(&self, board_id: &str) -> BoxFuture<'_, StorageResult<()>>;

    /// Permanently remove every trashed board.
    fn empty_trash(&self) -> BoxFuture<'_, StorageResult<()>>;

    fn load_chat(&self, board_id: &str) -> BoxFuture<'_, StorageResult<ChatStore>>;

    fn save_chat(&self, board_id: &str, chat: &ChatStore) -> BoxFuture<'_, StorageResult<()>>;

    /// Store a base64-encoded image and return its board-relative path.
    fn save_image(&self, board_id: &str, filename: &str, bytes_base64: &str) -> BoxFuture<'_, StorageResult<String>>;

    /// Location of a board's asset directory.
    fn assets_dir(&self, board_id: &str) -> BoxFuture<'_, StorageResult<String>>;
}

#[cfg(test)]
pub(crate) fn block_on<F: std::future::Future>(f: F) -> F::Output {
    use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    fn dummy_raw_waker() -> RawWaker {
        fn no_op(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            dummy_raw_waker()
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
        RawWaker::new(std::ptr::null(), &VTABLE)
    }

    let waker = unsafe { Waker::from_raw(dummy_raw_waker()) };
    let mut cx = Context::from_waker(&waker);
    let mut f = std::pin::pin!(f);

    loop {
        match f.as_mut().poll(&mut cx) {
            Poll::Ready(result) => return result,
            Poll::Pending => {}
        }
    }
}
