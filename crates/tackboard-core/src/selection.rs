//! Selection state: click, shift-click and marquee selection.

use crate::board::Board;
use crate::cards::{CardId, ColumnId};
use crate::config::BoardConfig;
use crate::grid::{distance, rect_contains};
use crate::input::{BoardItem, Modifiers};
use kurbo::{Point, Rect};
use std::collections::BTreeSet;

/// Selected cards and columns.
///
/// A card inside a selected column counts as selected through its column;
/// it is normally not listed in `cards` as well.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    cards: BTreeSet<CardId>,
    columns: BTreeSet<ColumnId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selection holding a single item.
    pub fn single(item: BoardItem) -> Self {
        let mut selection = Self::new();
        selection.insert(item);
        selection
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty() && self.columns.is_empty()
    }

    /// Number of selected items (cards plus columns).
    pub fn len(&self) -> usize {
        self.cards.len() + self.columns.len()
    }

    pub fn clear(&mut self) {
        self.cards.clear();
        self.columns.clear();
    }

    pub fn cards(&self) -> impl Iterator<Item = &CardId> {
        self.cards.iter()
    }

    pub fn columns(&self) -> impl Iterator<Item = &ColumnId> {
        self.columns.iter()
    }

    /// All selected items, columns first.
    pub fn items(&self) -> Vec<BoardItem> {
        self.columns
            .iter()
            .cloned()
            .map(BoardItem::Column)
            .chain(self.cards.iter().cloned().map(BoardItem::Card))
            .collect()
    }

    pub fn contains(&self, item: &BoardItem) -> bool {
        match item {
            BoardItem::Card(id) => self.cards.contains(id),
            BoardItem::Column(id) => self.columns.contains(id),
        }
    }

    pub fn insert(&mut self, item: BoardItem) -> bool {
        match item {
            BoardItem::Card(id) => self.cards.insert(id),
            BoardItem::Column(id) => self.columns.insert(id),
        }
    }

    pub fn remove(&mut self, item: &BoardItem) -> bool {
        match item {
            BoardItem::Card(id) => self.cards.remove(id),
            BoardItem::Column(id) => self.columns.remove(id),
        }
    }

    /// True if the card is selected directly or through its column.
    pub fn covers_card(&self, board: &Board, card_id: &CardId) -> bool {
        self.cards.contains(card_id)
            || board
                .column_of(card_id)
                .is_some_and(|column| self.columns.contains(&column.id))
    }

    /// True if the item is selected directly or, for cards, through its
    /// column.
    pub fn covers(&self, board: &Board, item: &BoardItem) -> bool {
        match item {
            BoardItem::Card(id) => self.covers_card(board, id),
            BoardItem::Column(id) => self.columns.contains(id),
        }
    }

    /// Apply a click on `item`.
    ///
    /// Clicking an item that is already covered keeps the whole selection so
    /// a following drag moves the group. Shift adds; a plain click replaces.
    /// Returns true if the selection changed.
    pub fn click(&mut self, board: &Board, item: BoardItem, modifiers: Modifiers) -> bool {
        if self.covers(board, &item) {
            return false;
        }
        if modifiers.extends_selection() {
            return self.insert(item);
        }
        self.clear();
        self.insert(item);
        true
    }

    /// Drop ids that no longer exist on the board. Returns how many were
    /// removed.
    pub fn retain_existing(&mut self, board: &Board) -> usize {
        let before = self.len();
        self.cards.retain(|id| board.card(id).is_some());
        self.columns.retain(|id| board.column(id).is_some());
        before - self.len()
    }

    /// Merge another selection into this one.
    pub fn extend(&mut self, other: Selection) {
        self.cards.extend(other.cards);
        self.columns.extend(other.columns);
    }
}

/// Items fully enclosed by a marquee rectangle.
///
/// Columns are tested with their full widget bounds. A card is selected if
/// its whole rectangle is inside and its column was not selected by the
/// same marquee. Partial overlap never selects.
pub fn marquee_select(board: &Board, marquee: Rect, config: &BoardConfig) -> Selection {
    let marquee = marquee.abs();
    let mut selection = Selection::new();
    for column in &board.columns {
        if rect_contains(marquee, board.column_bounds(column, config)) {
            selection.columns.insert(column.id.clone());
        }
    }
    for card in &board.cards {
        let via_column = board
            .column_of(&card.id)
            .is_some_and(|column| selection.columns.contains(&column.id));
        if !via_column && rect_contains(marquee, card.rect()) {
            selection.cards.insert(card.id.clone());
        }
    }
    selection
}

/// Whether a press/release pair is a click rather than a drag.
pub fn is_click(start: Point, end: Point, config: &BoardConfig) -> bool {
    distance(start, end) < config.min_drag_distance
}
