//! Alt-drag duplication: snapshots taken at drag start and the injection
//! of fresh entities when the drag resolves.

use crate::board::{Board, Column};
use crate::cards::{Card, CardId, ColumnId};
use crate::config::BoardConfig;
use crate::grid::{clamp_card_origin, snap_card_origin, union_bounds};
use crate::input::BoardItem;
use crate::layout::layout_board;
use crate::selection::Selection;
use kurbo::{Point, Rect, Vec2};
use std::collections::HashMap;

/// Deep copy of what an alt-drag will duplicate, taken before any mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum DuplicateSnapshot {
    /// A single card and the column it came from.
    Card { card: Card, column_id: Option<ColumnId> },
    /// A column with its members in stacking order.
    Column { column: Column, cards: Vec<Card> },
    /// A multi-item selection.
    Selection {
        free_cards: Vec<Card>,
        columns: Vec<(Column, Vec<Card>)>,
        /// Individually selected cards of unselected columns.
        list_cards: Vec<(Card, ColumnId)>,
    },
}

/// Where the duplicate should land.
#[derive(Debug, Clone, PartialEq)]
pub enum DuplicatePlacement {
    /// Top-left of the new card or column (snapped and clamped on inject).
    At(Point),
    /// Into a column at an index.
    IntoColumn { column_id: ColumnId, index: usize },
    /// Translate every snapshotted item by a delta.
    Offset(Vec2),
}

fn column_members(board: &Board, column: &Column) -> Vec<Card> {
    board.column_cards(column).cloned().collect()
}

impl DuplicateSnapshot {
    /// Snapshot a single card or column.
    pub fn capture_item(board: &Board, item: &BoardItem) -> Option<Self> {
        match item {
            BoardItem::Card(id) => Some(Self::Card {
                card: board.card(id)?.clone(),
                column_id: board.column_of(id).map(|c| c.id.clone()),
            }),
            BoardItem::Column(id) => {
                let column = board.column(id)?;
                Some(Self::Column {
                    column: column.clone(),
                    cards: column_members(board, column),
                })
            }
        }
    }

    /// Snapshot everything the selection covers.
    pub fn capture_selection(board: &Board, selection: &Selection) -> Option<Self> {
        let columns: Vec<(Column, Vec<Card>)> = selection
            .columns()
            .filter_map(|id| board.column(id))
            .map(|column| (column.clone(), column_members(board, column)))
            .collect();

        let mut free_cards = Vec::new();
        let mut list_cards = Vec::new();
        for card in board.cards.iter().filter(|c| selection.cards().any(|id| id == &c.id)) {
            match board.column_of(&card.id) {
                None => free_cards.push(card.clone()),
                Some(column) if selection.columns().any(|id| id == &column.id) => {}
                Some(column) => list_cards.push((card.clone(), column.id.clone())),
            }
        }

        if free_cards.is_empty() && columns.is_empty() && list_cards.is_empty() {
            return None;
        }
        Some(Self::Selection {
            free_cards,
            columns,
            list_cards,
        })
    }

    /// Bounding box of the snapshotted items at capture time.
    pub fn bounds(&self, config: &BoardConfig) -> Option<Rect> {
        let column_rect = |column: &Column, cards: &[Card]| {
            let height: f64 = cards.iter().map(|c| c.height + column.gap).sum();
            Rect::new(column.x, column.y, column.x + column.width, column.y + height)
        };
        match self {
            Self::Card { card, .. } => Some(card.rect()),
            Self::Column { column, cards } => Some(column_rect(column, cards)),
            Self::Selection {
                free_cards,
                columns,
                list_cards,
            } => union_bounds(
                free_cards
                    .iter()
                    .map(Card::rect)
                    .chain(columns.iter().map(|(col, cards)| column_rect(col, cards)))
                    .chain(list_cards.iter().map(|(card, _)| card.rect())),
            )
            .map(|r| {
                Rect::new(
                    r.x0.max(0.0),
                    r.y0.max(0.0),
                    r.x1.min(config.board_width),
                    r.y1.min(config.board_height),
                )
            }),
        }
    }

    /// Materialize the snapshot with fresh ids. Returns the new items so
    /// the caller can select them.
    pub fn inject(
        self,
        board: &mut Board,
        placement: DuplicatePlacement,
        config: &BoardConfig,
    ) -> Vec<BoardItem> {
        let items = match (self, placement) {
            (Self::Card { card, .. }, DuplicatePlacement::IntoColumn { column_id, index }) => {
                let id = inject_card(board, card, Point::ZERO, config);
                if !board.insert_into_column(&id, &column_id, index) {
                    log::warn!("Duplicate target column {} vanished", column_id);
                }
                vec![BoardItem::Card(id)]
            }
            (Self::Card { card, .. }, placement) => {
                let origin = placement_origin(card.position(), &placement);
                let id = inject_card(board, card, origin, config);
                vec![BoardItem::Card(id)]
            }
            (Self::Column { column, cards }, placement) => {
                let origin = placement_origin(column.position(), &placement);
                vec![BoardItem::Column(inject_column(board, column, cards, origin, config))]
            }
            (
                Self::Selection {
                    free_cards,
                    columns,
                    list_cards,
                },
                placement,
            ) => {
                let delta = match placement {
                    DuplicatePlacement::Offset(delta) => delta,
                    _ => Vec2::ZERO,
                };
                inject_selection(board, free_cards, columns, list_cards, delta, config)
            }
        };
        layout_board(board, config);
        items
    }
}

fn placement_origin(original: Point, placement: &DuplicatePlacement) -> Point {
    match placement {
        DuplicatePlacement::At(point) => *point,
        DuplicatePlacement::Offset(delta) => original + *delta,
        DuplicatePlacement::IntoColumn { .. } => original,
    }
}

/// Add a copy of `card` at `origin` (snapped) with a new id.
fn inject_card(board: &mut Board, mut card: Card, origin: Point, config: &BoardConfig) -> CardId {
    card.regenerate_id();
    card.set_position(snap_card_origin(origin, card.height, config));
    board.add_card(card)
}

/// Add a copy of a column and its members with fresh ids, preserving
/// member order.
fn inject_column(
    board: &mut Board,
    mut column: Column,
    cards: Vec<Card>,
    origin: Point,
    config: &BoardConfig,
) -> ColumnId {
    let mut remap: HashMap<CardId, CardId> = HashMap::new();
    for mut card in cards {
        let old = card.id.clone();
        card.regenerate_id();
        remap.insert(old, card.id.clone());
        board.add_card(card);
    }
    column.id = ColumnId::new();
    column.card_ids = column
        .card_ids
        .iter()
        .filter_map(|id| remap.get(id).cloned())
        .collect();
    let stack: f64 = column
        .card_ids
        .iter()
        .filter_map(|id| board.card(id))
        .map(|c| c.height + column.gap)
        .sum();
    column.set_position(snap_card_origin(origin, stack, config));
    board.add_column(column)
}

fn inject_selection(
    board: &mut Board,
    free_cards: Vec<Card>,
    columns: Vec<(Column, Vec<Card>)>,
    list_cards: Vec<(Card, ColumnId)>,
    delta: Vec2,
    config: &BoardConfig,
) -> Vec<BoardItem> {
    let mut items = Vec::new();
    for mut card in free_cards {
        card.regenerate_id();
        let origin = clamp_card_origin(card.position() + delta, card.height, config);
        card.set_position(origin);
        items.push(BoardItem::Card(board.add_card(card)));
    }
    for (column, cards) in columns {
        let origin = column.position() + delta;
        items.push(BoardItem::Column(inject_column(board, column, cards, origin, config)));
    }
    for (card, column_id) in list_cards {
        let original = card.id.clone();
        let fallback = card.position();
        let id = inject_card(board, card, fallback, config);
        let slot = board
            .column(&column_id)
            .and_then(|column| column.index_of(&original));
        match slot {
            Some(index) => {
                board.insert_into_column(&id, &column_id, index + 1);
            }
            None => log::debug!("Original of duplicated card {} left its column", original),
        }
        items.push(BoardItem::Card(id));
    }
    items
}
