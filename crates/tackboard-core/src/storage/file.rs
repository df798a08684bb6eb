//! File-based storage implementation for native platforms.
//!
//! Layout under the root directory:
//!
//! ```text
//! boards.json              index of live and trashed boards
//! <id>/board.json          board document
//! <id>/chat.json           chat transcript
//! <id>/assets/             images referenced by the board
//! trash/<id>/...           deleted boards, same shape
//! ```
//!
//! The index is a cache. It is rebuilt from the directories when it is
//! missing, unreadable or empty, and reconciled with them on every read.

use super::{
    BoardIndex, BoardMeta, BoxFuture, Storage, StorageError, StorageResult, board_display_name, check_payload_id,
    generate_board_id, now_millis, sanitize_asset_name, validate_board_id,
};
use crate::board::Board;
use crate::chat::ChatStore;
use crate::normalize::RawBoard;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

const INDEX_FILE: &str = "boards.json";
const BOARD_FILE: &str = "board.json";
const CHAT_FILE: &str = "chat.json";
const ASSETS_DIR: &str = "assets";
const TRASH_DIR: &str = "trash";

fn io_error(action: &str, path: &Path, e: std::io::Error) -> StorageError {
    StorageError::Io(format!("Failed to {} {}: {}", action, path.display(), e))
}

/// Write `bytes` next to `path` and rename into place.
fn write_atomic(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes).map_err(|e| io_error("write", &tmp, e))?;
    if path.exists() {
        let _ = fs::remove_file(path);
    }
    fs::rename(&tmp, path).map_err(|e| io_error("rename", &tmp, e))
}

fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> StorageResult<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| StorageError::Serialization(e.to_string()))?;
    write_atomic(path, json.as_bytes())
}

fn modified_millis(path: &Path) -> Option<i64> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
}

fn read_board_name(path: &Path) -> Option<String> {
    let text = fs::read_to_string(path).ok()?;
    RawBoard::from_json(&text).ok()?.name
}

/// File-based storage for native platforms.
pub struct FileStorage {
    /// Root directory holding the index and one directory per board.
    base_path: PathBuf,
}

impl FileStorage {
    /// Create a new file storage with the given root directory.
    ///
    /// Creates the directory if it doesn't exist.
    pub fn new(base_path: PathBuf) -> StorageResult<Self> {
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| io_error("create", &base_path, e))?;
        }
        Ok(Self { base_path })
    }

    /// Create file storage in the default location.
    ///
    /// On Unix: `~/Documents/Tackboard/boards/`
    /// Falls back to the local data directory, then the home directory.
    pub fn default_location() -> StorageResult<Self> {
        let base = dirs::document_dir()
            .or_else(dirs::data_local_dir)
            .or_else(dirs::home_dir)
            .ok_or_else(|| StorageError::Io("Could not determine home directory".to_string()))?;

        Self::new(base.join("Tackboard").join("boards"))
    }

    /// Get the base path.
    pub fn base_path(&self) -> &PathBuf {
        &self.base_path
    }

    fn index_path(&self) -> PathBuf {
        self.base_path.join(INDEX_FILE)
    }

    fn trash_path(&self) -> PathBuf {
        self.base_path.join(TRASH_DIR)
    }

    fn board_dir(&self, id: &str) -> PathBuf {
        self.base_path.join(id)
    }

    fn board_file(&self, id: &str) -> PathBuf {
        self.board_dir(id).join(BOARD_FILE)
    }

    fn write_index(&self, index: &BoardIndex) -> StorageResult<()> {
        write_json_atomic(&self.index_path(), index)
    }

    /// Board directories with a document inside `dir`.
    fn scan(&self, dir: &Path, trashed: bool) -> StorageResult<Vec<BoardMeta>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(dir).map_err(|e| io_error("read", dir, e))?;
        let mut boards = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(id) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                continue;
            };
            if id == TRASH_DIR || validate_board_id(&id).is_err() {
                continue;
            }
            let file = path.join(BOARD_FILE);
            if !file.exists() {
                continue;
            }
            let name = read_board_name(&file).unwrap_or_else(|| id.clone());
            let stamp = modified_millis(&file).unwrap_or_else(now_millis);
            boards.push(BoardMeta {
                id,
                name,
                updated_at: stamp,
                deleted_at: trashed.then_some(stamp),
            });
        }
        Ok(boards)
    }

    fn rebuild_index(&self) -> StorageResult<BoardIndex> {
        let mut index = BoardIndex::default();
        index.boards = self.scan(&self.base_path, false)?;
        index.boards.extend(self.scan(&self.trash_path(), true)?);
        log::info!("Rebuilt board index ({} boards)", index.boards.len());
        self.write_index(&index)?;
        Ok(index)
    }

    /// Reconcile the index with the directories on disk.
    fn sync_index(&self, mut index: BoardIndex) -> StorageResult<BoardIndex> {
        let mut found = self.scan(&self.base_path, false)?;
        found.extend(self.scan(&self.trash_path(), true)?);

        let mut changed = false;
        let mut seen = HashSet::new();
        for meta in found {
            seen.insert((meta.id.clone(), meta.is_deleted()));
            match index.boards.iter_mut().find(|b| b.id == meta.id) {
                Some(existing) => {
                    if *existing != meta {
                        *existing = meta;
                        changed = true;
                    }
                }
                None => {
                    index.boards.push(meta);
                    changed = true;
                }
            }
        }

        let before = index.boards.len();
        index.boards.retain(|b| seen.contains(&(b.id.clone(), b.is_deleted())));
        if index.boards.len() != before {
            changed = true;
        }

        if changed {
            log::debug!("Board index out of date, rewriting");
            self.write_index(&index)?;
        }
        Ok(index)
    }

    fn read_index(&self) -> StorageResult<BoardIndex> {
        let path = self.index_path();
        if !path.exists() {
            return self.rebuild_index();
        }
        let text = fs::read_to_string(&path).map_err(|e| io_error("read", &path, e))?;
        match serde_json::from_str::<BoardIndex>(&text) {
            Ok(index) if !index.boards.is_empty() => self.sync_index(index),
            Ok(_) => self.rebuild_index(),
            Err(e) => {
                log::warn!("Board index unreadable ({}), rebuilding", e);
                self.rebuild_index()
            }
        }
    }

    /// Record a live board in the index and persist it.
    fn touch(&self, mut index: BoardIndex, id: &str, name: &str) -> StorageResult<BoardIndex> {
        index.touch(id, name, now_millis());
        self.write_index(&index)?;
        Ok(index)
    }

    /// Create the board directory and an empty document if missing.
    fn ensure_board(&self, id: &str, name: &str) -> StorageResult<()> {
        let dir = self.board_dir(id);
        let assets = dir.join(ASSETS_DIR);
        fs::create_dir_all(&assets).map_err(|e| io_error("create", &assets, e))?;
        let file = dir.join(BOARD_FILE);
        if !file.exists() {
            write_json_atomic(&file, &Board::new(id, name))?;
        }
        Ok(())
    }

    /// Shared preamble: validate, refuse trashed boards, ensure the files.
    fn open_board(&self, id: &str) -> StorageResult<(BoardIndex, String)> {
        validate_board_id(id)?;
        let index = self.read_index()?;
        if index.get(id).is_some_and(BoardMeta::is_deleted) {
            return Err(StorageError::Deleted(id.to_string()));
        }
        let name = index.name_of(id);
        self.ensure_board(id, &name)?;
        Ok((index, name))
    }

    fn save_board_sync(&self, id: &str, board: &Board) -> StorageResult<()> {
        validate_board_id(id)?;
        check_payload_id(id, board)?;
        let index = self.read_index()?;
        if index.get(id).is_some_and(BoardMeta::is_deleted) {
            return Err(StorageError::Deleted(id.to_string()));
        }
        let name = board_display_name(&board.name);
        self.ensure_board(id, &name)?;
        write_json_atomic(&self.board_file(id), board)?;
        self.touch(index, id, &name)?;
        log::debug!("Saved board {}", id);
        Ok(())
    }

    fn load_board_sync(&self, id: &str) -> StorageResult<RawBoard> {
        let (index, name) = self.open_board(id)?;
        let file = self.board_file(id);
        let text = fs::read_to_string(&file).map_err(|e| io_error("read", &file, e))?;

        let mut value = match serde_json::from_str::<Value>(&text) {
            Ok(value) if value.is_object() => value,
            _ => {
                log::warn!("Board {} is unreadable, replacing with an empty board", id);
                let empty = Board::new(id, name);
                write_json_atomic(&file, &empty)?;
                serde_json::to_value(&empty).map_err(|e| StorageError::Serialization(e.to_string()))?
            }
        };

        if value.get("id").and_then(Value::as_str) != Some(id) {
            log::warn!("Board {} has a mismatched id, rewriting", id);
            value["id"] = Value::String(id.to_string());
            write_json_atomic(&file, &value)?;
        }

        if index.get(id).is_none() {
            let name = value
                .get("name")
                .and_then(Value::as_str)
                .map(board_display_name)
                .unwrap_or_else(|| id.to_string());
            self.touch(index, id, &name)?;
        }

        RawBoard::from_value(value).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    fn create_board_sync(&self, name: &str) -> StorageResult<BoardMeta> {
        let name = board_display_name(name);
        let index = self.read_index()?;
        let now = now_millis();
        let id = generate_board_id(now, |candidate| {
            index.get(candidate).is_some() || self.board_dir(candidate).exists()
        });
        self.ensure_board(&id, &name)?;
        let index = self.touch(index, &id, &name)?;
        log::info!("Created board {} ({})", id, name);
        index
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::Other(format!("Board {} missing from index", id)))
    }

    fn delete_board_sync(&self, id: &str) -> StorageResult<()> {
        validate_board_id(id)?;
        let mut index = self.read_index()?;
        let now = now_millis();
        let meta = index
            .boards
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        meta.deleted_at = Some(now);
        meta.updated_at = now;
        self.write_index(&index)?;

        let dir = self.board_dir(id);
        if dir.exists() {
            let trash = self.trash_path();
            fs::create_dir_all(&trash).map_err(|e| io_error("create", &trash, e))?;
            let dest = trash.join(id);
            if dest.exists() {
                let _ = fs::remove_dir_all(&dest);
            }
            fs::rename(&dir, &dest).map_err(|e| io_error("move", &dir, e))?;
        }
        log::info!("Moved board {} to trash", id);
        Ok(())
    }

    fn restore_board_sync(&self, id: &str) -> StorageResult<()> {
        validate_board_id(id)?;
        let src = self.trash_path().join(id);
        if !src.exists() {
            return Err(StorageError::NotFound(id.to_string()));
        }
        let dest = self.board_dir(id);
        if dest.exists() {
            return Err(StorageError::AlreadyExists(id.to_string()));
        }
        fs::rename(&src, &dest).map_err(|e| io_error("restore", &src, e))?;

        let name = read_board_name(&dest.join(BOARD_FILE)).unwrap_or_else(|| id.to_string());
        let index = self.read_index()?;
        self.touch(index, id, &name)?;
        log::info!("Restored board {}", id);
        Ok(())
    }

    fn empty_trash_sync(&self) -> StorageResult<()> {
        let mut index = self.read_index()?;
        index.boards.retain(|b| !b.is_deleted());
        self.write_index(&index)?;
        let trash = self.trash_path();
        if trash.exists() {
            fs::remove_dir_all(&trash).map_err(|e| io_error("remove", &trash, e))?;
        }
        Ok(())
    }

    fn load_chat_sync(&self, id: &str) -> StorageResult<ChatStore> {
        self.open_board(id)?;
        let path = self.board_dir(id).join(CHAT_FILE);
        if !path.exists() {
            return Ok(ChatStore::default());
        }
        let text = fs::read_to_string(&path).map_err(|e| io_error("read", &path, e))?;
        serde_json::from_str(&text)
            .map_err(|e| StorageError::Serialization(format!("Failed to parse {}: {}", path.display(), e)))
    }

    fn save_chat_sync(&self, id: &str, chat: &ChatStore) -> StorageResult<()> {
        self.open_board(id)?;
        write_json_atomic(&self.board_dir(id).join(CHAT_FILE), chat)
    }

    fn save_image_sync(&self, id: &str, filename: &str, bytes_base64: &str) -> StorageResult<String> {
        self.open_board(id)?;
        let bytes = BASE64
            .decode(bytes_base64.trim())
            .map_err(|e| StorageError::Serialization(format!("Invalid image data: {e}")))?;
        let name = sanitize_asset_name(filename);
        write_atomic(&self.board_dir(id).join(ASSETS_DIR).join(&name), &bytes)?;
        Ok(format!("{ASSETS_DIR}/{name}"))
    }

    fn assets_dir_sync(&self, id: &str) -> StorageResult<String> {
        let (index, name) = self.open_board(id)?;
        if index.get(id).is_none() {
            self.touch(index, id, &name)?;
        }
        Ok(self.board_dir(id).join(ASSETS_DIR).to_string_lossy().into_owned())
    }
}

impl Storage for FileStorage {
    fn save_board(&self, board_id: &str, board: &Board) -> BoxFuture<'_, StorageResult<()>> {
        let board_id = board_id.to_string();
        let board = board.clone();
        Box::pin(async move { self.save_board_sync(&board_id, &board) })
    }

    fn load_board(&self, board_id: &str) -> BoxFuture<'_, StorageResult<RawBoard>> {
        let board_id = board_id.to_string();
        Box::pin(async move { self.load_board_sync(&board_id) })
    }

    fn list_boards(&self) -> BoxFuture<'_, StorageResult<Vec<BoardMeta>>> {
        Box::pin(async move { Ok(self.read_index()?.live()) })
    }

    fn list_trashed_boards(&self) -> BoxFuture<'_, StorageResult<Vec<BoardMeta>>> {
        Box::pin(async move { Ok(self.read_index()?.trashed()) })
    }

    fn create_board(&self, name: &str) -> BoxFuture<'_, StorageResult<BoardMeta>> {
        let name = name.to_string();
        Box::pin(async move { self.create_board_sync(&name) })
    }

    fn delete_board(&self, board_id: &str) -> BoxFuture<'_, StorageResult<()>> {
        let board_id = board_id.to_string();
        Box::pin(async move { self.delete_board_sync(&board_id) })
    }

    fn restore_board(&self, board_id: &str) -> BoxFuture<'_, StorageResult<()>> {
        let board_id = board_id.to_string();
        Box::pin(async move { self.restore_board_sync(&board_id) })
    }

    fn empty_trash(&self) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move { self.empty_trash_sync() })
    }

    fn load_chat(&self, board_id: &str) -> BoxFuture<'_, StorageResult<ChatStore>> {
        let board_id = board_id.to_string();
        Box::pin(async move { self.load_chat_sync(&board_id) })
    }

    fn save_chat(&self, board_id: &str, chat: &ChatStore) -> BoxFuture<'_, StorageResult<()>> {
        let board_id = board_id.to_string();
        let chat = chat.clone();
        Box::pin(async move { self.save_chat_sync(&board_id, &chat) })
    }

    fn save_image(&self, board_id: &str, filename: &str, bytes_base64: &str) -> BoxFuture<'_, StorageResult<String>> {
        let board_id = board_id.to_string();
        let filename = filename.to_string();
        let encoded = bytes_base64.to_string();
        Box::pin(async move { self.save_image_sync(&board_id, &filename, &encoded) })
    }

    fn assets_dir(&self, board_id: &str) -> BoxFuture<'_, StorageResult<String>> {
        let board_id = board_id.to_string();
        Box::pin(async move { self.assets_dir_sync(&board_id) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::block_on;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_file_storage_save_load() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();

        let meta = block_on(storage.create_board("Roadmap")).unwrap();
        assert!(dir.path().join(&meta.id).join(BOARD_FILE).exists());
        assert!(dir.path().join(&meta.id).join(ASSETS_DIR).is_dir());

        let board = Board::new(meta.id.clone(), "Roadmap 2");
        block_on(storage.save_board(&meta.id, &board)).unwrap();

        let raw = block_on(storage.load_board(&meta.id)).unwrap();
        assert_eq!(raw.name.as_deref(), Some("Roadmap 2"));

        let listed = block_on(storage.list_boards()).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "Roadmap 2");
        assert!(!dir.path().join(&meta.id).join("board.json.tmp").exists());
    }

    #[test]
    fn test_load_repairs_documents() {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();
        let board_dir = dir.path().join("b1");
        fs::create_dir_all(&board_dir).unwrap();

        fs::write(board_dir.join(BOARD_FILE), r#"{"id":"other","name":"Kept","cards":[]}"#).unwrap();
        let raw = block_on(storage.load_board("b1")).unwrap();
        assert_eq!(raw.id.as_deref(), Some("b1"));
        assert_eq!(raw.name.as_deref(), Some("Kept"));
        let on_disk = fs::read_to_string(board_dir.join(BOARD_FILE)).unwrap();
        assert!(on_disk.contains("\"b1\""));

        fs::write(board_dir.join(BOARD_FILE), "{ not json").unwrap();
        let raw = block_on(storage.load_board("b1")).unwrap();
        assert_eq!(raw.id.as_deref(), Some("b1"));
        assert!(raw.cards.is_empty());
    }

    #[test]
    fn test_save_rejects_bad_input() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();
        let board = Board::new("b1", "X");
        assert!(matches!(
            block_on(storage.save_board("b2", &board)),
            Err(StorageError::Other(_))
        ));
        assert!(matches!(
            block_on(storage.save_board("..", &board)),
            Err(StorageError::InvalidId(_))
        ));
        assert!(!dir.path().join("b2").exists());
    }

    #[test]
    fn test_trash_moves_directories() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();
        let meta = block_on(storage.create_board("Old")).unwrap();

        block_on(storage.delete_board(&meta.id)).unwrap();
        assert!(!dir.path().join(&meta.id).exists());
        assert!(dir.path().join(TRASH_DIR).join(&meta.id).join(BOARD_FILE).exists());
        assert!(block_on(storage.list_boards()).unwrap().is_empty());
        assert_eq!(block_on(storage.list_trashed_boards()).unwrap().len(), 1);

        let board = Board::new(meta.id.clone(), "Old");
        assert!(matches!(
            block_on(storage.save_board(&meta.id, &board)),
            Err(StorageError::Deleted(_))
        ));

        block_on(storage.restore_board(&meta.id)).unwrap();
        assert!(dir.path().join(&meta.id).join(BOARD_FILE).exists());
        let live = block_on(storage.list_boards()).unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].name, "Old");

        block_on(storage.delete_board(&meta.id)).unwrap();
        block_on(storage.empty_trash()).unwrap();
        assert!(!dir.path().join(TRASH_DIR).exists());
        assert!(block_on(storage.list_trashed_boards()).unwrap().is_empty());
        assert!(matches!(
            block_on(storage.restore_board(&meta.id)),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_index_rebuilt_from_directories() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();
        let a = block_on(storage.create_board("A")).unwrap();
        let b = block_on(storage.create_board("B")).unwrap();

        fs::write(dir.path().join(INDEX_FILE), "garbage").unwrap();
        let mut names: Vec<_> = block_on(storage.list_boards()).unwrap().into_iter().map(|m| m.name).collect();
        names.sort();
        assert_eq!(names, vec!["A", "B"]);

        // A directory removed behind our back drops out of the index.
        fs::remove_dir_all(dir.path().join(&a.id)).unwrap();
        let ids: Vec<_> = block_on(storage.list_boards()).unwrap().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![b.id]);
    }

    #[test]
    fn test_chat_and_images() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();

        assert_eq!(block_on(storage.load_chat("b1")).unwrap(), ChatStore::default());
        let mut chat = ChatStore::new();
        chat.push(crate::chat::ChatEntry::new("assistant", "hi", 5));
        block_on(storage.save_chat("b1", &chat)).unwrap();
        assert_eq!(block_on(storage.load_chat("b1")).unwrap(), chat);

        let path = block_on(storage.save_image("b1", "a/b.png", &BASE64.encode([1u8, 2, 3]))).unwrap();
        assert_eq!(path, "assets/a_b.png");
        assert_eq!(fs::read(dir.path().join("b1").join(&path)).unwrap(), vec![1, 2, 3]);

        let assets = block_on(storage.assets_dir("b1")).unwrap();
        assert!(assets.ends_with(ASSETS_DIR));
    }
}
