//! Tackboard Core Library
//!
//! Platform-agnostic board state engine for the Tackboard card whiteboard:
//! cards, lists, layout, selection, drag interactions, history and
//! persistence.

pub mod board;
pub mod cards;
pub mod chat;
pub mod config;
pub mod drag;
pub mod duplicate;
pub mod engine;
pub mod grid;
pub mod history;
pub mod input;
pub mod layout;
pub mod normalize;
pub mod selection;
pub mod storage;
pub mod summary;

pub use board::{Board, Column};
pub use cards::{Card, CardContent, CardId, ColumnId, EstimatedTextMeasure, LinkMetadata, TextMeasure};
pub use chat::{ChatEntry, ChatStore};
pub use config::{BoardConfig, ConfigError};
pub use drag::{DragMode, DragOutcome, DragSession, DropTarget};
pub use duplicate::{DuplicatePlacement, DuplicateSnapshot};
pub use engine::{BoardEngine, LinkFetchTicket};
pub use history::{History, Signature, board_signature};
pub use input::{BoardItem, Modifiers};
pub use normalize::{RawBoard, normalize_board};
pub use selection::Selection;
pub use storage::{AutoSaveManager, BoardMeta, Storage, StorageError};
pub use summary::board_summary;
