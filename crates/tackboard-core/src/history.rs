//! Undo/redo history with debounced commits and signature dedup.

use crate::board::Board;
use crate::config::BoardConfig;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;
#[cfg(target_arch = "wasm32")]
use web_time::Instant;

/// Canonical fingerprint of a board state.
///
/// Cards and columns are keyed by id so ordering in the document does not
/// matter. Derived fields are left out: card sizes and the positions of
/// cards owned by a column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(String);

impl Signature {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Sort every object's keys so the serialized form is canonical.
fn canonical(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, canonical(v))).collect();
            Value::Object(sorted.into_iter().collect::<Map<String, Value>>())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonical).collect()),
        other => other,
    }
}

/// Compute the signature of a board.
pub fn board_signature(board: &Board) -> Signature {
    let mut cards = BTreeMap::new();
    for card in &board.cards {
        let mut entry = match serde_json::to_value(&card.content) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => Map::new(),
        };
        if board.column_of(&card.id).is_none() {
            entry.insert("x".into(), Value::from(card.x));
            entry.insert("y".into(), Value::from(card.y));
        }
        cards.insert(card.id.as_str().to_string(), Value::Object(entry));
    }

    let mut columns = BTreeMap::new();
    for column in &board.columns {
        let ids: Vec<Value> = column
            .card_ids
            .iter()
            .map(|id| Value::from(id.as_str()))
            .collect();
        let mut entry = Map::new();
        entry.insert("name".into(), Value::from(column.name.as_str()));
        entry.insert("x".into(), Value::from(column.x));
        entry.insert("y".into(), Value::from(column.y));
        entry.insert("gap".into(), Value::from(column.gap));
        entry.insert("cardIds".into(), Value::Array(ids));
        columns.insert(column.id.as_str().to_string(), Value::Object(entry));
    }

    let mut root = Map::new();
    root.insert("name".into(), Value::from(board.name.as_str()));
    root.insert("cards".into(), Value::Object(cards.into_iter().collect()));
    root.insert("columns".into(), Value::Object(columns.into_iter().collect()));
    Signature(canonical(Value::Object(root)).to_string())
}

#[derive(Debug, Clone)]
struct Snapshot {
    board: Board,
    signature: Signature,
}

impl Snapshot {
    fn of(board: &Board) -> Self {
        Self {
            board: board.clone(),
            signature: board_signature(board),
        }
    }
}

/// Undo/redo stacks around the last committed board state.
#[derive(Debug, Clone)]
pub struct History {
    undo_stack: VecDeque<Snapshot>,
    redo_stack: Vec<Snapshot>,
    committed: Snapshot,
    /// Deadline of the scheduled commit, if any.
    pending: Option<Instant>,
    interacting: bool,
    max_depth: usize,
    debounce: Duration,
}

impl History {
    /// Start a history whose baseline is `board`.
    pub fn new(board: &Board, config: &BoardConfig) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            committed: Snapshot::of(board),
            pending: None,
            interacting: false,
            max_depth: config.max_history.max(1),
            debounce: config.history_debounce(),
        }
    }

    /// Forget everything and use `board` as the new baseline.
    pub fn reset(&mut self, board: &Board) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.committed = Snapshot::of(board);
        self.pending = None;
        self.interacting = false;
    }

    /// Commit `board` if it differs from the last committed state.
    /// Returns true if an undo step was recorded.
    pub fn commit(&mut self, board: &Board) -> bool {
        let snapshot = Snapshot::of(board);
        if snapshot.signature == self.committed.signature {
            // Keep derived data fresh without adding a step.
            self.committed.board = snapshot.board;
            return false;
        }
        let previous = std::mem::replace(&mut self.committed, snapshot);
        self.push_undo(previous);
        self.redo_stack.clear();
        log::debug!("History commit (undo depth {})", self.undo_stack.len());
        true
    }

    fn push_undo(&mut self, snapshot: Snapshot) {
        self.undo_stack.push_back(snapshot);
        while self.undo_stack.len() > self.max_depth {
            self.undo_stack.pop_front();
        }
    }

    /// Schedule a debounced commit, replacing any pending one. Ignored while
    /// an interaction is in progress.
    pub fn schedule(&mut self, now: Instant) {
        if self.interacting {
            return;
        }
        self.pending = Some(now + self.debounce);
    }

    /// Commit if the scheduled deadline has passed.
    pub fn tick(&mut self, now: Instant, board: &Board) -> bool {
        match self.pending {
            Some(deadline) if now >= deadline => {
                self.pending = None;
                self.commit(board)
            }
            _ => false,
        }
    }

    /// Commit a pending scheduled change right away.
    pub fn flush(&mut self, board: &Board) -> bool {
        if self.pending.take().is_some() {
            self.commit(board)
        } else {
            false
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// A drag started: pending edits are committed first and further
    /// scheduling is suppressed.
    pub fn begin_interaction(&mut self, board: &Board) {
        self.flush(board);
        self.interacting = true;
    }

    /// A drag ended: commit the result as a single step.
    pub fn end_interaction(&mut self, board: &Board) -> bool {
        self.interacting = false;
        self.pending = None;
        self.commit(board)
    }

    /// A drag was abandoned and its moves undone: nothing to commit.
    pub fn cancel_interaction(&mut self) {
        self.interacting = false;
        self.pending = None;
    }

    pub fn is_interacting(&self) -> bool {
        self.interacting
    }

    /// Step back. `current` is the live board; uncommitted edits are
    /// recorded first so redo can restore them.
    pub fn undo(&mut self, current: &Board) -> Option<Board> {
        self.pending = None;
        self.interacting = false;
        self.commit(current);
        while let Some(snapshot) = self.undo_stack.pop_back() {
            if snapshot.signature == self.committed.signature {
                continue;
            }
            let previous = std::mem::replace(&mut self.committed, snapshot);
            self.redo_stack.push(previous);
            log::debug!("Undo (undo depth {}, redo depth {})", self.undo_stack.len(), self.redo_stack.len());
            return Some(self.committed.board.clone());
        }
        None
    }

    /// Step forward again after an undo.
    pub fn redo(&mut self, current: &Board) -> Option<Board> {
        self.pending = None;
        self.interacting = false;
        self.commit(current);
        while let Some(snapshot) = self.redo_stack.pop() {
            if snapshot.signature == self.committed.signature {
                continue;
            }
            let previous = std::mem::replace(&mut self.committed, snapshot);
            self.push_undo(previous);
            log::debug!("Redo (undo depth {}, redo depth {})", self.undo_stack.len(), self.redo_stack.len());
            return Some(self.committed.board.clone());
        }
        None
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Signature of the last committed state.
    pub fn committed_signature(&self) -> &Signature {
        &self.committed.signature
    }
}
