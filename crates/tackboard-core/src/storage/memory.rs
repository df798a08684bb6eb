//! In-memory storage implementation (useful for testing and WASM).

use super::{
    BoardIndex, BoardMeta, BoxFuture, Storage, StorageError, StorageResult, board_display_name, check_payload_id,
    generate_board_id, now_millis, sanitize_asset_name, validate_board_id,
};
use crate::board::Board;
use crate::chat::ChatStore;
use crate::normalize::RawBoard;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Default)]
struct Inner {
    index: BoardIndex,
    documents: HashMap<String, Value>,
    chats: HashMap<String, ChatStore>,
    assets: HashMap<String, HashMap<String, Vec<u8>>>,
}

impl Inner {
    fn ensure_document(&mut self, board_id: &str) -> StorageResult<()> {
        if self.documents.contains_key(board_id) {
            return Ok(());
        }
        let name = self.index.name_of(board_id);
        let value = serde_json::to_value(Board::new(board_id, name.clone()))
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.documents.insert(board_id.to_string(), value);
        self.index.touch(board_id, &name, now_millis());
        Ok(())
    }

    fn remove_board(&mut self, board_id: &str) {
        self.documents.remove(board_id);
        self.chats.remove(board_id);
        self.assets.remove(board_id);
    }
}

/// In-memory storage backend.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: RwLock<Inner>,
}

impl MemoryStorage {
    /// Create a new empty memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw document as-is, bypassing validation.
    pub fn insert_raw(&self, board_id: &str, document: Value) -> StorageResult<()> {
        validate_board_id(board_id)?;
        let mut inner = self.inner.write().map_err(|_| StorageError::Other("Lock error".to_string()))?;
        let name = inner.index.name_of(board_id);
        inner.index.touch(board_id, &name, now_millis());
        inner.documents.insert(board_id.to_string(), document);
        Ok(())
    }

    /// Bytes of a stored asset.
    pub fn asset(&self, board_id: &str, name: &str) -> Option<Vec<u8>> {
        let inner = self.inner.read().ok()?;
        inner.assets.get(board_id)?.get(name).cloned()
    }

    /// Number of boards, live and trashed.
    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.index.boards.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write(&self) -> StorageResult<std::sync::RwLockWriteGuard<'_, Inner>> {
        self.inner.write().map_err(|_| StorageError::Other("Lock error".to_string()))
    }

    fn read(&self) -> StorageResult<std::sync::RwLockReadGuard<'_, Inner>> {
        self.inner.read().map_err(|_| StorageError::Other("Lock error".to_string()))
    }
}

impl Storage for MemoryStorage {
    fn save_board(&self, board_id: &str, board: &Board) -> BoxFuture<'_, StorageResult<()>> {
        let board_id = board_id.to_string();
        let board = board.clone();
        Box::pin(async move {
            validate_board_id(&board_id)?;
            check_payload_id(&board_id, &board)?;
            let value = serde_json::to_value(&board).map_err(|e| StorageError::Serialization(e.to_string()))?;
            let mut inner = self.write()?;
            if inner.index.get(&board_id).is_some_and(BoardMeta::is_deleted) {
                return Err(StorageError::Deleted(board_id));
            }
            inner.documents.insert(board_id.clone(), value);
            inner.index.touch(&board_id, &board_display_name(&board.name), now_millis());
            Ok(())
        })
    }

    fn load_board(&self, board_id: &str) -> BoxFuture<'_, StorageResult<RawBoard>> {
        let board_id = board_id.to_string();
        Box::pin(async move {
            validate_board_id(&board_id)?;
            let mut inner = self.write()?;
            if inner.index.get(&board_id).is_some_and(BoardMeta::is_deleted) {
                return Err(StorageError::Deleted(board_id));
            }
            inner.ensure_document(&board_id)?;
            let mut value = inner.documents.get(&board_id).cloned().unwrap_or(Value::Null);
            match value.as_object_mut() {
                Some(object) => {
                    if object.get("id").and_then(Value::as_str) != Some(board_id.as_str()) {
                        object.insert("id".to_string(), Value::String(board_id.clone()));
                        inner.documents.insert(board_id.clone(), value.clone());
                    }
                }
                None => {
                    log::warn!("Board {} is not a JSON object, replacing with an empty board", board_id);
                    inner.documents.remove(&board_id);
                    inner.ensure_document(&board_id)?;
                    value = inner.documents.get(&board_id).cloned().unwrap_or(Value::Null);
                }
            }
            RawBoard::from_value(value).map_err(|e| StorageError::Serialization(e.to_string()))
        })
    }

    fn list_boards(&self) -> BoxFuture<'_, StorageResult<Vec<BoardMeta>>> {
        Box::pin(async move { Ok(self.read()?.index.live()) })
    }

    fn list_trashed_boards(&self) -> BoxFuture<'_, StorageResult<Vec<BoardMeta>>> {
        Box::pin(async move { Ok(self.read()?.index.trashed()) })
    }

    fn create_board(&self, name: &str) -> BoxFuture<'_, StorageResult<BoardMeta>> {
        let name = board_display_name(name);
        Box::pin(async move {
            let mut inner = self.write()?;
            let now = now_millis();
            let id = generate_board_id(now, |candidate| {
                inner.index.get(candidate).is_some() || inner.documents.contains_key(candidate)
            });
            let value = serde_json::to_value(Board::new(id.clone(), name.clone()))
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            inner.documents.insert(id.clone(), value);
            inner.index.touch(&id, &name, now);
            log::info!("Created board {} ({})", id, name);
            Ok(BoardMeta {
                id,
                name,
                updated_at: now,
                deleted_at: None,
            })
        })
    }

    fn delete_board(&self, board_id: &str) -> BoxFuture<'_, StorageResult<()>> {
        let board_id = board_id.to_string();
        Box::pin(async move {
            validate_board_id(&board_id)?;
            let mut inner = self.write()?;
            let now = now_millis();
            match inner.index.boards.iter_mut().find(|b| b.id == board_id) {
                Some(meta) if meta.is_deleted() => Ok(()),
                Some(meta) => {
                    meta.deleted_at = Some(now);
                    meta.updated_at = now;
                    Ok(())
                }
                None => Err(StorageError::NotFound(board_id)),
            }
        })
    }

    fn restore_board(&self, board_id: &str) -> BoxFuture<'_, StorageResult<()>> {
        let board_id = board_id.to_string();
        Box::pin(async move {
            validate_board_id(&board_id)?;
            let mut inner = self.write()?;
            let now = now_millis();
            match inner.index.boards.iter_mut().find(|b| b.id == board_id) {
                Some(meta) if meta.is_deleted() => {
                    meta.deleted_at = None;
                    meta.updated_at = now;
                    Ok(())
                }
                Some(_) => Err(StorageError::AlreadyExists(board_id)),
                None => Err(StorageError::NotFound(board_id)),
            }
        })
    }

    fn empty_trash(&self) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            let mut inner = self.write()?;
            let trashed: Vec<String> = inner.index.trashed().into_iter().map(|b| b.id).collect();
            for id in &trashed {
                inner.remove_board(id);
            }
            inner.index.boards.retain(|b| !b.is_deleted());
            log::info!("Emptied trash ({} boards)", trashed.len());
            Ok(())
        })
    }

    fn load_chat(&self, board_id: &str) -> BoxFuture<'_, StorageResult<ChatStore>> {
        let board_id = board_id.to_string();
        Box::pin(async move {
            validate_board_id(&board_id)?;
            Ok(self.read()?.chats.get(&board_id).cloned().unwrap_or_default())
        })
    }

    fn save_chat(&self, board_id: &str, chat: &ChatStore) -> BoxFuture<'_, StorageResult<()>> {
        let board_id = board_id.to_string();
        let chat = chat.clone();
        Box::pin(async move {
            validate_board_id(&board_id)?;
            self.write()?.chats.insert(board_id, chat);
            Ok(())
        })
    }

    fn save_image(&self, board_id: &str, filename: &str, bytes_base64: &str) -> BoxFuture<'_, StorageResult<String>> {
        let board_id = board_id.to_string();
        let name = sanitize_asset_name(filename);
        let encoded = bytes_base64.to_string();
        Box::pin(async move {
            validate_board_id(&board_id)?;
            let bytes = BASE64
                .decode(encoded.trim())
                .map_err(|e| StorageError::Serialization(format!("Invalid image data: {e}")))?;
            let mut inner = self.write()?;
            inner.ensure_document(&board_id)?;
            inner.assets.entry(board_id).or_default().insert(name.clone(), bytes);
            Ok(format!("assets/{name}"))
        })
    }

    fn assets_dir(&self, board_id: &str) -> BoxFuture<'_, StorageResult<String>> {
        let board_id = board_id.to_string();
        Box::pin(async move {
            validate_board_id(&board_id)?;
            Ok(format!("memory://{board_id}/assets"))
        })
    }
}
