//! Board document: cards, columns and membership bookkeeping.

use crate::cards::{Card, CardId, ColumnId};
use crate::config::BoardConfig;
use kurbo::{Point, Rect, Size};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Default display name of a new column.
pub const DEFAULT_COLUMN_NAME: &str = "List";
/// Default display name of a new board.
pub const DEFAULT_BOARD_NAME: &str = "Untitled";

/// An ordered, vertically stacked list of cards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: ColumnId,
    pub name: String,
    /// Top-left of the first card.
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub gap: f64,
    /// Members from top to bottom.
    pub card_ids: Vec<CardId>,
}

impl Column {
    /// Create an empty column anchored at `position`.
    pub fn new(position: Point, config: &BoardConfig) -> Self {
        Self {
            id: ColumnId::new(),
            name: DEFAULT_COLUMN_NAME.to_string(),
            x: position.x,
            y: position.y,
            width: config.card_width,
            gap: config.column_gap,
            card_ids: Vec::new(),
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn set_position(&mut self, position: Point) {
        self.x = position.x;
        self.y = position.y;
    }

    pub fn contains(&self, card_id: &CardId) -> bool {
        self.card_ids.contains(card_id)
    }

    pub fn index_of(&self, card_id: &CardId) -> Option<usize> {
        self.card_ids.iter().position(|id| id == card_id)
    }

    pub fn is_empty(&self) -> bool {
        self.card_ids.is_empty()
    }
}

/// A board document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: String,
    pub name: String,
    /// All cards, in creation order.
    pub cards: Vec<Card>,
    pub columns: Vec<Column>,
}

impl Default for Board {
    fn default() -> Self {
        Self::new(Uuid::new_v4().to_string(), DEFAULT_BOARD_NAME)
    }
}

impl Board {
    /// Create an empty board.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            cards: Vec::new(),
            columns: Vec::new(),
        }
    }

    pub fn card(&self, id: &CardId) -> Option<&Card> {
        self.cards.iter().find(|c| &c.id == id)
    }

    pub fn card_mut(&mut self, id: &CardId) -> Option<&mut Card> {
        self.cards.iter_mut().find(|c| &c.id == id)
    }

    /// Position of the card in creation order.
    pub fn card_order(&self, id: &CardId) -> Option<usize> {
        self.cards.iter().position(|c| &c.id == id)
    }

    pub fn column(&self, id: &ColumnId) -> Option<&Column> {
        self.columns.iter().find(|c| &c.id == id)
    }

    pub fn column_mut(&mut self, id: &ColumnId) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| &c.id == id)
    }

    /// Column that owns the card, if any.
    pub fn column_of(&self, card_id: &CardId) -> Option<&Column> {
        self.columns.iter().find(|c| c.contains(card_id))
    }

    /// True if the card exists and no column owns it.
    pub fn is_free(&self, card_id: &CardId) -> bool {
        self.card(card_id).is_some() && self.column_of(card_id).is_none()
    }

    /// Cards not owned by any column.
    pub fn free_cards(&self) -> impl Iterator<Item = &Card> {
        let owned: HashSet<&CardId> = self.columns.iter().flat_map(|c| c.card_ids.iter()).collect();
        self.cards.iter().filter(move |c| !owned.contains(&c.id))
    }

    /// Member cards of a column in stacking order; stale ids are skipped.
    pub fn column_cards<'a>(&'a self, column: &'a Column) -> impl Iterator<Item = &'a Card> + 'a {
        column.card_ids.iter().filter_map(|id| self.card(id))
    }

    pub fn add_card(&mut self, card: Card) -> CardId {
        let id = card.id.clone();
        self.cards.push(card);
        id
    }

    pub fn add_column(&mut self, column: Column) -> ColumnId {
        let id = column.id.clone();
        self.columns.push(column);
        id
    }

    /// Remove a card and strip it from every column.
    pub fn remove_card(&mut self, id: &CardId) -> Option<Card> {
        let idx = self.card_order(id)?;
        self.detach_card(id);
        Some(self.cards.remove(idx))
    }

    /// Remove a column together with all of its member cards.
    pub fn remove_column(&mut self, id: &ColumnId) -> Option<Column> {
        let idx = self.columns.iter().position(|c| &c.id == id)?;
        let column = self.columns.remove(idx);
        let members: HashSet<&CardId> = column.card_ids.iter().collect();
        self.cards.retain(|c| !members.contains(&c.id));
        self.strip_dangling();
        Some(column)
    }

    /// Remove the card from whatever column owns it.
    /// Returns the column id and index it was taken from.
    pub fn detach_card(&mut self, card_id: &CardId) -> Option<(ColumnId, usize)> {
        let mut found = None;
        for column in &mut self.columns {
            if let Some(idx) = column.index_of(card_id) {
                column.card_ids.remove(idx);
                if found.is_none() {
                    found = Some((column.id.clone(), idx));
                }
            }
        }
        found
    }

    /// Insert a card into a column at `index` (clamped), detaching it from
    /// any previous column first. Returns false if either side is missing.
    pub fn insert_into_column(&mut self, card_id: &CardId, column_id: &ColumnId, index: usize) -> bool {
        if self.card(card_id).is_none() || self.column(column_id).is_none() {
            return false;
        }
        self.detach_card(card_id);
        match self.column_mut(column_id) {
            Some(column) => {
                let index = index.min(column.card_ids.len());
                column.card_ids.insert(index, card_id.clone());
                true
            }
            None => false,
        }
    }

    /// Drop column references to cards that no longer exist.
    pub fn strip_dangling(&mut self) -> usize {
        let existing: HashSet<&CardId> = self.cards.iter().map(|c| &c.id).collect();
        let mut removed = 0;
        for column in &mut self.columns {
            let before = column.card_ids.len();
            column.card_ids.retain(|id| existing.contains(id));
            removed += before - column.card_ids.len();
        }
        removed
    }

    /// Delete empty columns, except `keep` (a column mid-edit).
    pub fn prune_empty_columns(&mut self, keep: Option<&ColumnId>) -> usize {
        let before = self.columns.len();
        self.columns.retain(|c| !c.is_empty() || Some(&c.id) == keep);
        before - self.columns.len()
    }

    /// Total height of a column's stack: every member height plus one gap
    /// per member.
    pub fn column_stack_height(&self, column: &Column) -> f64 {
        self.column_cards(column).map(|c| c.height + column.gap).sum()
    }

    /// Rectangle covered by the stacked cards (anchor to last gap).
    pub fn column_content_rect(&self, column: &Column) -> Rect {
        Rect::from_origin_size(
            column.position(),
            Size::new(column.width, self.column_stack_height(column)),
        )
    }

    /// Full widget bounds of a column: header, padding and stacked content.
    pub fn column_bounds(&self, column: &Column, config: &BoardConfig) -> Rect {
        let pad = config.column_padding;
        let top = column.y - config.column_header_height - pad;
        let height = config.column_header_height + pad + self.column_stack_height(column);
        Rect::from_origin_size(
            Point::new(column.x - pad, top),
            Size::new(column.width + 2.0 * pad, height),
        )
    }

    /// Bounding box of every card and column.
    pub fn bounds(&self, config: &BoardConfig) -> Option<Rect> {
        crate::grid::union_bounds(
            self.cards
                .iter()
                .map(Card::rect)
                .chain(self.columns.iter().map(|c| self.column_bounds(c, config))),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty() && self.columns.is_empty()
    }

    /// Number of cards.
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// Serialize the board to its on-disk JSON shape.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
