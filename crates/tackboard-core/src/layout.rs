//! Column layout: stacks member cards under each column anchor.

use crate::board::Board;
use crate::cards::ColumnId;
use crate::config::BoardConfig;
use std::collections::HashMap;

/// Re-derive the position and width of every column member.
///
/// Free cards are untouched and ids without a card are skipped. Returns
/// true if any card moved, so callers can skip redundant work.
pub fn layout_board(board: &mut Board, config: &BoardConfig) -> bool {
    let Board { cards, columns, .. } = board;
    let index: HashMap<_, usize> = cards
        .iter()
        .enumerate()
        .map(|(i, c)| (c.id.clone(), i))
        .collect();

    let mut changed = false;
    for column in columns.iter() {
        let mut running_y = column.y;
        for id in &column.card_ids {
            let Some(&i) = index.get(id) else {
                continue;
            };
            let card = &mut cards[i];
            if card.x != column.x || card.y != running_y || card.width != config.card_width {
                card.x = column.x;
                card.y = running_y;
                card.width = config.card_width;
                changed = true;
            }
            running_y += card.height + column.gap;
        }
    }
    changed
}

/// Lay out a single column. Returns false if the column is missing or
/// nothing moved.
pub fn layout_column(board: &mut Board, column_id: &ColumnId, config: &BoardConfig) -> bool {
    let Some(column) = board.column(column_id).cloned() else {
        return false;
    };
    let mut changed = false;
    let mut running_y = column.y;
    for id in &column.card_ids {
        let Some(card) = board.card_mut(id) else {
            continue;
        };
        if card.x != column.x || card.y != running_y || card.width != config.card_width {
            card.x = column.x;
            card.y = running_y;
            card.width = config.card_width;
            changed = true;
        }
        running_y += card.height + column.gap;
    }
    changed
}
