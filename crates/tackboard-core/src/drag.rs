//! Pointer-drag state machine.
//!
//! A [`DragSession`] is created on pointer-down over a card or column,
//! fed coalesced pointer positions once per frame, and consumed on
//! release. Live updates mutate the working board so the renderer can draw
//! it; the release resolves the drag completely (snap, insert, detach or
//! duplicate).

use crate::board::{Board, Column};
use crate::cards::{CardId, ColumnId};
use crate::config::BoardConfig;
use crate::duplicate::{DuplicatePlacement, DuplicateSnapshot};
use crate::grid::{clamp_card_origin, clamp_delta, snap_card_origin, snap_group_delta, union_bounds};
use crate::input::{BoardItem, Modifiers, PointerQueue};
use crate::layout::{layout_board, layout_column};
use crate::selection::{Selection, is_click};
use kurbo::{Point, Rect, Vec2};

/// Column slot a dragged card would drop into if released now.
#[derive(Debug, Clone, PartialEq)]
pub struct DropTarget {
    pub column_id: ColumnId,
    /// Insertion index among the members, not counting the dragged card.
    pub index: usize,
    /// Y coordinate of the horizontal insertion guide.
    pub guide_y: f64,
}

/// Where the other selected cards of a list would land if the dragged
/// card detached now. Purely visual.
#[derive(Debug, Clone, PartialEq)]
pub struct DetachPreview {
    pub column_id: ColumnId,
    pub placements: Vec<(CardId, Rect)>,
}

/// What is being dragged.
#[derive(Debug, Clone, PartialEq)]
pub enum DragMode {
    /// A card not owned by any column.
    FreeCard { card_id: CardId, origin: Point },
    /// A column member; `siblings` are the other selected members that
    /// follow it out of the list.
    ListCard {
        card_id: CardId,
        column_id: ColumnId,
        origin: Point,
        siblings: Vec<CardId>,
    },
    /// Selected free cards and columns moving together.
    Group {
        anchor_origin: Point,
        /// Set when the anchor is a free card; used for list insertion.
        anchor_card: Option<CardId>,
        cards: Vec<(CardId, Point)>,
        columns: Vec<(ColumnId, Point)>,
        bounds: Rect,
    },
    /// A whole column.
    Column { column_id: ColumnId, origin: Point },
    /// Alt-drag: nothing moves until release.
    Duplicate {
        snapshot: DuplicateSnapshot,
        anchor_rect: Rect,
        bounds: Rect,
    },
}

/// How a drag resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum DragOutcome {
    /// Click or snap back; the board is as before.
    Unchanged,
    Moved,
    /// Cards were inserted into a column.
    Inserted {
        column_id: ColumnId,
        card_ids: Vec<CardId>,
    },
    /// Cards left their column and are free now.
    Detached(Vec<CardId>),
    /// New entities created by an alt-drag.
    Duplicated(Vec<BoardItem>),
}

/// A drag from pointer-down to pointer-up.
#[derive(Debug, Clone)]
pub struct DragSession {
    mode: DragMode,
    start_point: Point,
    current_point: Point,
    queue: PointerQueue,
    drop_target: Option<DropTarget>,
    detach_preview: Option<DetachPreview>,
    ghost: Option<Rect>,
}

/// Whether dragging `target` should move the whole selection.
///
/// A card that sits in an unselected column never drags the group; it is
/// reordered or detached on its own.
pub fn is_group_drag(board: &Board, selection: &Selection, target: &BoardItem) -> bool {
    if selection.len() < 2 || !selection.covers(board, target) {
        return false;
    }
    match target {
        BoardItem::Column(_) => true,
        BoardItem::Card(id) => match board.column_of(id) {
            None => true,
            Some(column) => selection.columns().any(|c| c == &column.id),
        },
    }
}

/// Resolve the column and index a card rectangle would drop into.
///
/// A column matches when the rectangle's center is inside its widget
/// bounds. The index is the first member (other than `dragged`) whose
/// vertical midpoint lies below the rectangle's midpoint.
pub fn find_drop_target(
    board: &Board,
    rect: Rect,
    dragged: Option<&CardId>,
    config: &BoardConfig,
) -> Option<DropTarget> {
    let center = rect.center();
    let column = board
        .columns
        .iter()
        .find(|c| board.column_bounds(c, config).contains(center))?;

    let members: Vec<_> = board
        .column_cards(column)
        .filter(|c| Some(&c.id) != dragged)
        .collect();
    let index = members
        .iter()
        .position(|c| c.y + c.height / 2.0 > center.y)
        .unwrap_or(members.len());

    let guide_y = if index == 0 {
        column.y
    } else if index == members.len() {
        let last = members[index - 1];
        last.y + last.height + column.gap / 2.0
    } else {
        let prev = members[index - 1];
        let next = members[index];
        (prev.y + prev.height + next.y) / 2.0
    };

    Some(DropTarget {
        column_id: column.id.clone(),
        index,
        guide_y,
    })
}

fn stack_below(board: &Board, anchor: Rect, column: &Column, siblings: &[CardId]) -> DetachPreview {
    let mut y = anchor.y1 + column.gap;
    let mut placements = Vec::with_capacity(siblings.len());
    for card in siblings.iter().filter_map(|id| board.card(id)) {
        placements.push((card.id.clone(), card.rect_at(Point::new(anchor.x0, y))));
        y += card.height + column.gap;
    }
    DetachPreview {
        column_id: column.id.clone(),
        placements,
    }
}

fn item_rect(board: &Board, item: &BoardItem) -> Option<Rect> {
    match item {
        BoardItem::Card(id) => board.card(id).map(|c| c.rect()),
        BoardItem::Column(id) => board.column(id).map(|c| board.column_content_rect(c)),
    }
}

fn group_mode(board: &Board, selection: &Selection, target: &BoardItem) -> Option<DragMode> {
    let cards: Vec<(CardId, Point)> = selection
        .cards()
        .filter(|id| board.is_free(id))
        .filter_map(|id| board.card(id).map(|c| (id.clone(), c.position())))
        .collect();
    let columns: Vec<(ColumnId, Point)> = selection
        .columns()
        .filter_map(|id| board.column(id).map(|c| (id.clone(), c.position())))
        .collect();

    let bounds = union_bounds(
        cards
            .iter()
            .filter_map(|(id, _)| board.card(id).map(|c| c.rect()))
            .chain(
                columns
                    .iter()
                    .filter_map(|(id, _)| board.column(id).map(|c| board.column_content_rect(c))),
            ),
    )?;
    let anchor_origin = item_rect(board, target)?.origin();
    let anchor_card = target.as_card().filter(|id| board.is_free(id)).cloned();

    Some(DragMode::Group {
        anchor_origin,
        anchor_card,
        cards,
        columns,
        bounds,
    })
}

/// Move group members to their original positions plus `delta`.
fn place_group(board: &mut Board, cards: &[(CardId, Point)], columns: &[(ColumnId, Point)], delta: Vec2) {
    for (id, origin) in cards {
        if let Some(card) = board.card_mut(id) {
            card.set_position(*origin + delta);
        }
    }
    for (id, origin) in columns {
        if let Some(column) = board.column_mut(id) {
            column.set_position(*origin + delta);
        }
    }
}

impl DragSession {
    /// Start dragging `target`. Returns `None` if the target does not exist.
    pub fn begin(
        board: &Board,
        selection: &Selection,
        target: BoardItem,
        point: Point,
        modifiers: Modifiers,
        config: &BoardConfig,
    ) -> Option<Self> {
        let grouped = is_group_drag(board, selection, &target);
        let mode = if modifiers.duplicates() {
            let snapshot = if grouped {
                DuplicateSnapshot::capture_selection(board, selection)?
            } else {
                DuplicateSnapshot::capture_item(board, &target)?
            };
            let anchor_rect = item_rect(board, &target)?;
            let bounds = snapshot.bounds(config).unwrap_or(anchor_rect);
            DragMode::Duplicate {
                snapshot,
                anchor_rect,
                bounds,
            }
        } else if grouped {
            group_mode(board, selection, &target)?
        } else {
            match &target {
                BoardItem::Card(id) => {
                    let card = board.card(id)?;
                    match board.column_of(id) {
                        None => DragMode::FreeCard {
                            card_id: id.clone(),
                            origin: card.position(),
                        },
                        Some(column) => {
                            let confined = selection.columns().next().is_none()
                                && selection.cards().all(|c| column.contains(c));
                            let siblings = if confined && selection.cards().any(|c| c == id) {
                                column
                                    .card_ids
                                    .iter()
                                    .filter(|c| *c != id && selection.cards().any(|s| s == *c))
                                    .cloned()
                                    .collect()
                            } else {
                                Vec::new()
                            };
                            DragMode::ListCard {
                                card_id: id.clone(),
                                column_id: column.id.clone(),
                                origin: card.position(),
                                siblings,
                            }
                        }
                    }
                }
                BoardItem::Column(id) => DragMode::Column {
                    column_id: id.clone(),
                    origin: board.column(id)?.position(),
                },
            }
        };
        log::debug!("Drag started: {:?}", target);

        Some(Self {
            mode,
            start_point: point,
            current_point: point,
            queue: PointerQueue::new(),
            drop_target: None,
            detach_preview: None,
            ghost: None,
        })
    }

    pub fn mode(&self) -> &DragMode {
        &self.mode
    }

    pub fn start_point(&self) -> Point {
        self.start_point
    }

    pub fn current_point(&self) -> Point {
        self.current_point
    }

    /// Raw pointer travel since the drag started.
    pub fn delta(&self) -> Vec2 {
        self.current_point - self.start_point
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self.mode, DragMode::Duplicate { .. })
    }

    pub fn drop_target(&self) -> Option<&DropTarget> {
        self.drop_target.as_ref()
    }

    pub fn detach_preview(&self) -> Option<&DetachPreview> {
        self.detach_preview.as_ref()
    }

    /// Placeholder rectangle of an alt-drag.
    pub fn ghost(&self) -> Option<Rect> {
        self.ghost
    }

    /// Record a pointer move to apply on the next frame. Returns true if
    /// the caller should request a frame.
    pub fn queue_pointer(&mut self, point: Point) -> bool {
        self.queue.push(point)
    }

    /// Apply the latest queued pointer position, if any.
    pub fn apply_frame(&mut self, board: &mut Board, config: &BoardConfig) -> bool {
        match self.queue.take() {
            Some(point) => {
                self.update(board, point, config);
                true
            }
            None => false,
        }
    }

    /// Apply a pointer position immediately.
    pub fn update(&mut self, board: &mut Board, point: Point, config: &BoardConfig) {
        self.current_point = point;
        let delta = point - self.start_point;
        match &self.mode {
            DragMode::FreeCard { card_id, origin } => {
                let Some(card) = board.card_mut(card_id) else {
                    return;
                };
                let position = clamp_card_origin(*origin + delta, card.height, config);
                card.set_position(position);
                let rect = card.rect();
                self.drop_target = find_drop_target(board, rect, Some(card_id), config);
            }
            DragMode::ListCard {
                card_id,
                column_id,
                origin,
                siblings,
            } => {
                let Some(card) = board.card_mut(card_id) else {
                    return;
                };
                let position = clamp_card_origin(*origin + delta, card.height, config);
                card.set_position(position);
                let rect = card.rect();
                self.drop_target = find_drop_target(board, rect, Some(card_id), config);

                let over_source = self
                    .drop_target
                    .as_ref()
                    .is_none_or(|t| &t.column_id == column_id);
                self.detach_preview = match board.column(column_id) {
                    Some(column)
                        if !siblings.is_empty()
                            && over_source
                            && (position.x - column.x).abs() > config.detach_preview_threshold =>
                    {
                        Some(stack_below(board, rect, column, siblings))
                    }
                    _ => None,
                };
            }
            DragMode::Group {
                anchor_origin,
                anchor_card,
                cards,
                columns,
                bounds,
            } => {
                let delta = clamp_delta(*bounds, delta, config);
                place_group(board, cards, columns, delta);
                layout_board(board, config);
                self.drop_target = match anchor_card {
                    Some(id) if columns.is_empty() => board
                        .card(id)
                        .map(|c| c.rect_at(*anchor_origin + delta))
                        .and_then(|rect| find_drop_target(board, rect, Some(id), config)),
                    _ => None,
                };
            }
            DragMode::Column { column_id, origin } => {
                let Some(column) = board.column(column_id) else {
                    return;
                };
                let stack = board.column_stack_height(column);
                let position = clamp_card_origin(*origin + delta, stack, config);
                if let Some(column) = board.column_mut(column_id) {
                    column.set_position(position);
                }
                layout_column(board, column_id, config);
            }
            DragMode::Duplicate {
                snapshot,
                anchor_rect,
                bounds,
            } => {
                let delta = clamp_delta(*bounds, delta, config);
                let ghost = *anchor_rect + delta;
                self.ghost = Some(ghost);
                self.drop_target = match snapshot {
                    DuplicateSnapshot::Card { .. } => find_drop_target(board, ghost, None, config),
                    _ => None,
                };
            }
        }
    }

    /// Put live-moved items back where they started.
    fn restore(&self, board: &mut Board, config: &BoardConfig) {
        match &self.mode {
            DragMode::FreeCard { card_id, origin } | DragMode::ListCard { card_id, origin, .. } => {
                if let Some(card) = board.card_mut(card_id) {
                    card.set_position(*origin);
                }
            }
            DragMode::Group { cards, columns, .. } => place_group(board, cards, columns, Vec2::ZERO),
            DragMode::Column { column_id, origin } => {
                if let Some(column) = board.column_mut(column_id) {
                    column.set_position(*origin);
                }
            }
            DragMode::Duplicate { .. } => {}
        }
        layout_board(board, config);
    }

    /// Abandon the drag, putting everything it moved back.
    pub fn cancel(self, board: &mut Board, config: &BoardConfig) {
        self.restore(board, config);
    }

    /// Release the pointer at `point` and resolve the drag.
    pub fn finish(mut self, board: &mut Board, point: Point, config: &BoardConfig) -> DragOutcome {
        self.queue.clear();
        if is_click(self.start_point, point, config) {
            self.restore(board, config);
            return DragOutcome::Unchanged;
        }
        self.update(board, point, config);
        let delta = point - self.start_point;

        let outcome = match self.mode {
            DragMode::FreeCard { card_id, .. } => match self.drop_target {
                Some(target) => {
                    board.insert_into_column(&card_id, &target.column_id, target.index);
                    layout_column(board, &target.column_id, config);
                    DragOutcome::Inserted {
                        column_id: target.column_id,
                        card_ids: vec![card_id],
                    }
                }
                None => match board.card_mut(&card_id) {
                    Some(card) => {
                        let snapped = snap_card_origin(card.position(), card.height, config);
                        card.set_position(snapped);
                        DragOutcome::Moved
                    }
                    None => DragOutcome::Unchanged,
                },
            },
            DragMode::ListCard {
                card_id,
                column_id,
                origin,
                ..
            } => finish_list_card(board, card_id, column_id, origin, self.drop_target, self.detach_preview, config),
            DragMode::Group {
                anchor_origin,
                anchor_card,
                cards,
                columns,
                bounds,
            } => {
                let clamped = clamp_delta(bounds, delta, config);
                let snapped = snap_group_delta(bounds, anchor_origin, clamped, config);
                place_group(board, &cards, &columns, snapped);
                layout_board(board, config);

                let target = match &anchor_card {
                    Some(id) if columns.is_empty() => board
                        .card(id)
                        .map(|c| c.rect())
                        .and_then(|rect| find_drop_target(board, rect, Some(id), config)),
                    _ => None,
                };
                match target {
                    Some(target) => insert_in_visual_order(board, cards, target, config),
                    None => DragOutcome::Moved,
                }
            }
            DragMode::Column { column_id, .. } => {
                let snapped = board
                    .column(&column_id)
                    .map(|c| snap_card_origin(c.position(), board.column_stack_height(c), config));
                if let (Some(position), Some(column)) = (snapped, board.column_mut(&column_id)) {
                    column.set_position(position);
                }
                layout_column(board, &column_id, config);
                DragOutcome::Moved
            }
            DragMode::Duplicate {
                snapshot,
                anchor_rect,
                bounds,
            } => {
                let clamped = clamp_delta(bounds, delta, config);
                let placement = match (&snapshot, self.drop_target) {
                    (DuplicateSnapshot::Card { .. }, Some(target)) => DuplicatePlacement::IntoColumn {
                        column_id: target.column_id,
                        index: target.index,
                    },
                    (DuplicateSnapshot::Selection { .. }, _) => {
                        DuplicatePlacement::Offset(snap_group_delta(bounds, anchor_rect.origin(), clamped, config))
                    }
                    _ => DuplicatePlacement::At(anchor_rect.origin() + clamped),
                };
                DragOutcome::Duplicated(snapshot.inject(board, placement, config))
            }
        };
        log::debug!("Drag finished: {:?}", outcome);
        outcome
    }
}

fn finish_list_card(
    board: &mut Board,
    card_id: CardId,
    column_id: ColumnId,
    origin: Point,
    drop_target: Option<DropTarget>,
    preview: Option<DetachPreview>,
    config: &BoardConfig,
) -> DragOutcome {
    if let Some(target) = drop_target {
        let unchanged = target.column_id == column_id
            && board.column(&column_id).and_then(|c| c.index_of(&card_id)) == Some(target.index);
        board.insert_into_column(&card_id, &target.column_id, target.index);
        board.prune_empty_columns(None);
        layout_board(board, config);
        return if unchanged {
            DragOutcome::Unchanged
        } else {
            DragOutcome::Inserted {
                column_id: target.column_id,
                card_ids: vec![card_id],
            }
        };
    }

    let offset = match (board.card(&card_id), board.column(&column_id)) {
        (Some(card), Some(column)) => (card.x - column.x).abs(),
        _ => 0.0,
    };
    if offset <= config.detach_threshold {
        if let Some(card) = board.card_mut(&card_id) {
            card.set_position(origin);
        }
        layout_board(board, config);
        return DragOutcome::Unchanged;
    }

    let mut moves = vec![(card_id, None)];
    if let Some(preview) = preview {
        moves.extend(preview.placements.into_iter().map(|(id, rect)| (id, Some(rect.origin()))));
    }
    let mut detached = Vec::with_capacity(moves.len());
    for (id, target) in moves {
        board.detach_card(&id);
        if let Some(card) = board.card_mut(&id) {
            let position = snap_card_origin(target.unwrap_or(card.position()), card.height, config);
            card.set_position(position);
            detached.push(id);
        }
    }
    board.prune_empty_columns(None);
    layout_board(board, config);
    DragOutcome::Detached(detached)
}

/// Insert a dropped group of free cards into a column, top to bottom.
fn insert_in_visual_order(
    board: &mut Board,
    cards: Vec<(CardId, Point)>,
    target: DropTarget,
    config: &BoardConfig,
) -> DragOutcome {
    let mut ordered: Vec<(f64, f64, usize, CardId)> = cards
        .into_iter()
        .filter_map(|(id, _)| {
            let card = board.card(&id)?;
            Some((card.y, card.x, board.card_order(&id)?, id))
        })
        .collect();
    ordered.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)).then(a.2.cmp(&b.2)));

    let mut card_ids = Vec::with_capacity(ordered.len());
    for (offset, (_, _, _, id)) in ordered.into_iter().enumerate() {
        board.insert_into_column(&id, &target.column_id, target.index + offset);
        card_ids.push(id);
    }
    layout_board(board, config);
    DragOutcome::Inserted {
        column_id: target.column_id,
        card_ids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::{Card, CardContent, EstimatedTextMeasure, TextContent};
    use pretty_assertions::assert_eq;

    fn config() -> BoardConfig {
        BoardConfig::default()
    }

    fn add_card(board: &mut Board, at: Point) -> CardId {
        board.add_card(Card::new(
            at,
            CardContent::Text(TextContent::new("card")),
            &config(),
            &EstimatedTextMeasure::default(),
        ))
    }

    fn add_column(board: &mut Board, at: Point, count: usize) -> (ColumnId, Vec<CardId>) {
        let ids: Vec<CardId> = (0..count).map(|_| add_card(board, Point::ZERO)).collect();
        let mut column = Column::new(at, &config());
        column.card_ids = ids.clone();
        let column_id = board.add_column(column);
        layout_board(board, &config());
        (column_id, ids)
    }

    fn drag(
        board: &mut Board,
        selection: &Selection,
        target: BoardItem,
        from: Point,
        to: Point,
        modifiers: Modifiers,
    ) -> DragOutcome {
        let cfg = config();
        let mut session = DragSession::begin(board, selection, target, from, modifiers, &cfg).unwrap();
        session.queue_pointer(to);
        session.apply_frame(board, &cfg);
        session.finish(board, to, &cfg)
    }

    #[test]
    fn test_free_card_snaps_to_grid() {
        let mut board = Board::new("b", "b");
        let id = add_card(&mut board, Point::new(100.0, 100.0));
        let outcome = drag(
            &mut board,
            &Selection::new(),
            BoardItem::Card(id.clone()),
            Point::new(110.0, 110.0),
            Point::new(5010.0, 5010.0),
            Modifiers::default(),
        );
        assert_eq!(outcome, DragOutcome::Moved);
        assert_eq!(board.card(&id).unwrap().position(), Point::new(4995.0, 4995.0));
    }

    #[test]
    fn test_drag_end_stays_inside_board() {
        let cfg = config();
        let mut board = Board::new("b", "b");
        let id = add_card(&mut board, Point::new(1.0, 1.0));
        drag(
            &mut board,
            &Selection::new(),
            BoardItem::Card(id.clone()),
            Point::new(5.0, 5.0),
            Point::new(99_999.0, -500.0),
            Modifiers::default(),
        );
        let card = board.card(&id).unwrap();
        assert!(card.x >= 0.0 && card.x <= cfg.board_width - cfg.card_width);
        assert!(card.y >= 0.0 && card.y <= cfg.board_height - card.height);
    }

    #[test]
    fn test_click_without_travel_is_unchanged() {
        let mut board = Board::new("b", "b");
        let id = add_card(&mut board, Point::new(100.0, 100.0));
        let outcome = drag(
            &mut board,
            &Selection::new(),
            BoardItem::Card(id.clone()),
            Point::new(110.0, 110.0),
            Point::new(111.0, 111.0),
            Modifiers::default(),
        );
        assert_eq!(outcome, DragOutcome::Unchanged);
        assert_eq!(board.card(&id).unwrap().position(), Point::new(100.0, 100.0));
    }

    #[test]
    fn test_drop_target_index_and_guide() {
        let cfg = config();
        let mut board = Board::new("b", "b");
        let (column_id, ids) = add_column(&mut board, Point::new(1001.0, 1001.0), 3);
        let heights: Vec<f64> = ids.iter().map(|id| board.card(id).unwrap().height).collect();

        let second = board.card(&ids[1]).unwrap().rect();
        let dragged = Rect::from_origin_size(Point::new(1001.0, second.y0 + second.height() * 0.75 - 10.0), (264.0, 20.0));
        let target = find_drop_target(&board, dragged, None, &cfg).unwrap();
        assert_eq!(target.column_id, column_id);
        assert_eq!(target.index, 2);
        assert_eq!(target.guide_y, (second.y1 + 1001.0 + heights[0] + heights[1] + 44.0) / 2.0);

        let top = Rect::from_origin_size(Point::new(1001.0, 990.0), (264.0, 10.0));
        let first = find_drop_target(&board, top, None, &cfg).unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(first.guide_y, 1001.0);

        let far = Rect::from_origin_size(Point::new(3001.0, 990.0), (264.0, 10.0));
        assert!(find_drop_target(&board, far, None, &cfg).is_none());
    }

    #[test]
    fn test_list_card_moves_to_other_column() {
        let mut board = Board::new("b", "b");
        let (source, moving) = add_column(&mut board, Point::new(1.0, 1001.0), 1);
        let (dest, members) = add_column(&mut board, Point::new(1001.0, 1001.0), 4);

        let third = board.card(&members[2]).unwrap().rect();
        let card = board.card(&moving[0]).unwrap().rect();
        let from = card.center();
        // Center the dragged card just above the third member's midpoint.
        let to = Point::new(third.center().x, third.center().y - 5.0);
        let outcome = drag(
            &mut board,
            &Selection::new(),
            BoardItem::Card(moving[0].clone()),
            from,
            to,
            Modifiers::default(),
        );

        assert_eq!(
            outcome,
            DragOutcome::Inserted {
                column_id: dest.clone(),
                card_ids: vec![moving[0].clone()],
            }
        );
        let column = board.column(&dest).unwrap();
        assert_eq!(column.card_ids[2], moving[0]);
        assert_eq!(column.card_ids.len(), 5);
        assert!(board.column(&source).is_none());
    }

    #[test]
    fn test_list_card_detaches_past_threshold() {
        let mut board = Board::new("b", "b");
        let (column_id, ids) = add_column(&mut board, Point::new(1001.0, 1001.0), 2);
        let from = board.card(&ids[1]).unwrap().rect().center();
        let outcome = drag(
            &mut board,
            &Selection::new(),
            BoardItem::Card(ids[1].clone()),
            from,
            from + Vec2::new(400.0, 0.0),
            Modifiers::default(),
        );
        assert_eq!(outcome, DragOutcome::Detached(vec![ids[1].clone()]));
        assert!(board.is_free(&ids[1]));
        assert_eq!(board.column(&column_id).unwrap().card_ids, vec![ids[0].clone()]);
    }

    #[test]
    fn test_list_card_snaps_back_below_threshold() {
        let mut board = Board::new("b", "b");
        let (column_id, ids) = add_column(&mut board, Point::new(1001.0, 1001.0), 2);
        let before = board.clone();
        let from = board.card(&ids[0]).unwrap().rect().center();
        // Drag above the column so no drop target is found, but stay close.
        let outcome = drag(
            &mut board,
            &Selection::new(),
            BoardItem::Card(ids[0].clone()),
            from,
            from + Vec2::new(30.0, -600.0),
            Modifiers::default(),
        );
        assert_eq!(outcome, DragOutcome::Unchanged);
        assert_eq!(board, before);
        assert_eq!(board.column(&column_id).unwrap().card_ids, ids);
    }

    #[test]
    fn test_detach_preview_and_siblings_follow() {
        let cfg = config();
        let mut board = Board::new("b", "b");
        let (column_id, ids) = add_column(&mut board, Point::new(1001.0, 1001.0), 3);
        let mut selection = Selection::new();
        selection.insert(BoardItem::Card(ids[0].clone()));
        selection.insert(BoardItem::Card(ids[2].clone()));

        let from = board.card(&ids[0]).unwrap().rect().center();
        let mut session = DragSession::begin(
            &board,
            &selection,
            BoardItem::Card(ids[0].clone()),
            from,
            Modifiers::default(),
            &cfg,
        )
        .unwrap();

        session.update(&mut board, from + Vec2::new(30.0, 0.0), &cfg);
        assert!(session.detach_preview().is_none());

        session.update(&mut board, from + Vec2::new(100.0, 0.0), &cfg);
        let preview = session.detach_preview().unwrap();
        assert_eq!(preview.placements.len(), 1);
        assert_eq!(preview.placements[0].0, ids[2]);
        // Preview is visual only.
        assert!(board.column(&column_id).unwrap().contains(&ids[2]));

        let outcome = session.finish(&mut board, from + Vec2::new(500.0, 0.0), &cfg);
        assert_eq!(outcome, DragOutcome::Detached(vec![ids[0].clone(), ids[2].clone()]));
        assert_eq!(board.column(&column_id).unwrap().card_ids, vec![ids[1].clone()]);
        let anchor = board.card(&ids[0]).unwrap();
        let sibling = board.card(&ids[2]).unwrap();
        assert_eq!(anchor.x, sibling.x);
        assert!(sibling.y > anchor.y);
    }

    #[test]
    fn test_free_card_dropped_on_column_is_inserted() {
        let mut board = Board::new("b", "b");
        let (column_id, ids) = add_column(&mut board, Point::new(1001.0, 1001.0), 1);
        let free = add_card(&mut board, Point::new(23.0, 23.0));
        let from = board.card(&free).unwrap().rect().center();
        let last = board.card(&ids[0]).unwrap().rect();
        let outcome = drag(
            &mut board,
            &Selection::new(),
            BoardItem::Card(free.clone()),
            from,
            Point::new(last.center().x, last.y1 + 20.0),
            Modifiers::default(),
        );
        assert!(matches!(outcome, DragOutcome::Inserted { .. }));
        assert_eq!(board.column(&column_id).unwrap().card_ids, vec![ids[0].clone(), free]);
    }

    #[test]
    fn test_group_move_snaps_relative_to_anchor() {
        let mut board = Board::new("b", "b");
        let a = add_card(&mut board, Point::new(23.0, 23.0));
        let b = add_card(&mut board, Point::new(353.0, 23.0));
        let (column_id, members) = add_column(&mut board, Point::new(1001.0, 1001.0), 2);
        let mut selection = Selection::new();
        selection.insert(BoardItem::Card(a.clone()));
        selection.insert(BoardItem::Card(b.clone()));
        selection.insert(BoardItem::Column(column_id.clone()));

        let outcome = drag(
            &mut board,
            &selection,
            BoardItem::Card(a.clone()),
            Point::new(30.0, 30.0),
            Point::new(80.0, 75.0),
            Modifiers::default(),
        );
        assert_eq!(outcome, DragOutcome::Moved);
        assert_eq!(board.card(&a).unwrap().position(), Point::new(67.0, 67.0));
        assert_eq!(board.card(&b).unwrap().position(), Point::new(397.0, 67.0));
        let column = board.column(&column_id).unwrap();
        assert_eq!(column.position(), Point::new(1045.0, 1045.0));
        assert_eq!(board.card(&members[0]).unwrap().position(), column.position());
    }

    #[test]
    fn test_group_delta_clamped_to_board() {
        let cfg = config();
        let mut board = Board::new("b", "b");
        let a = add_card(&mut board, Point::new(23.0, 23.0));
        let b = add_card(&mut board, Point::new(353.0, 23.0));
        let mut selection = Selection::new();
        selection.insert(BoardItem::Card(a.clone()));
        selection.insert(BoardItem::Card(b.clone()));
        drag(
            &mut board,
            &selection,
            BoardItem::Card(b.clone()),
            Point::new(360.0, 30.0),
            Point::new(360.0 + 20_000.0, 30.0),
            Modifiers::default(),
        );
        let right = board.card(&b).unwrap();
        assert!(right.x + right.width <= cfg.board_width);
        assert_eq!(right.x - board.card(&a).unwrap().x, 330.0);
    }

    #[test]
    fn test_list_card_in_unselected_column_never_groups() {
        let mut board = Board::new("b", "b");
        let (_, ids) = add_column(&mut board, Point::new(1001.0, 1001.0), 2);
        let free = add_card(&mut board, Point::new(23.0, 23.0));
        let mut selection = Selection::new();
        selection.insert(BoardItem::Card(ids[0].clone()));
        selection.insert(BoardItem::Card(free.clone()));
        assert!(!is_group_drag(&board, &selection, &BoardItem::Card(ids[0].clone())));
        assert!(is_group_drag(&board, &selection, &BoardItem::Card(free)));
    }

    #[test]
    fn test_column_drag_moves_members() {
        let mut board = Board::new("b", "b");
        let (column_id, ids) = add_column(&mut board, Point::new(1001.0, 1001.0), 2);
        drag(
            &mut board,
            &Selection::new(),
            BoardItem::Column(column_id.clone()),
            Point::new(1010.0, 980.0),
            Point::new(1110.0, 1080.0),
            Modifiers::default(),
        );
        let column = board.column(&column_id).unwrap();
        assert_eq!(column.position(), Point::new(1101.0, 1101.0));
        assert_eq!(board.card(&ids[0]).unwrap().position(), column.position());
    }

    #[test]
    fn test_column_drag_stays_inside_board() {
        let cfg = config();
        for to in [Point::new(-5000.0, -5000.0), Point::new(20_000.0, 20_000.0)] {
            let mut board = Board::new("b", "b");
            let (column_id, ids) = add_column(&mut board, Point::new(1001.0, 1001.0), 3);
            drag(
                &mut board,
                &Selection::new(),
                BoardItem::Column(column_id.clone()),
                Point::new(1010.0, 980.0),
                to,
                Modifiers::default(),
            );
            let column = board.column(&column_id).unwrap();
            assert!(column.x >= 0.0 && column.x <= cfg.max_card_x(), "{to:?}");
            for id in &ids {
                let card = board.card(id).unwrap();
                assert_eq!(card.x, column.x);
                assert!(card.x >= 0.0 && card.x + card.width <= cfg.board_width, "{to:?}");
                assert!(card.y >= 0.0 && card.y + card.height <= cfg.board_height, "{to:?}");
            }
        }
    }

    #[test]
    fn test_group_of_free_cards_dropped_at_column_end() {
        let mut board = Board::new("b", "b");
        let (column_id, members) = add_column(&mut board, Point::new(1001.0, 1001.0), 1);
        let a = add_card(&mut board, Point::new(23.0, 23.0));
        let b = add_card(&mut board, Point::new(23.0, 243.0));
        let mut selection = Selection::new();
        selection.insert(BoardItem::Card(a.clone()));
        selection.insert(BoardItem::Card(b.clone()));

        // Release with the anchor's centre over the lower half of the last member.
        let last = board.card(&members[0]).unwrap().rect();
        let anchor = board.card(&a).unwrap().rect();
        let grab = Vec2::new(5.0, 5.0);
        let to = Point::new(1001.0, last.y1 - 5.0 - anchor.height() / 2.0) + grab;
        let outcome = drag(
            &mut board,
            &selection,
            BoardItem::Card(a.clone()),
            anchor.origin() + grab,
            to,
            Modifiers::default(),
        );
        assert_eq!(
            outcome,
            DragOutcome::Inserted {
                column_id: column_id.clone(),
                card_ids: vec![a.clone(), b.clone()],
            }
        );
        assert_eq!(board.column(&column_id).unwrap().card_ids, vec![members[0].clone(), a, b]);
    }

    #[test]
    fn test_group_dropped_between_members_keeps_visual_order() {
        let cfg = config();
        let mut board = Board::new("b", "b");
        let (column_id, members) = add_column(&mut board, Point::new(1001.0, 1001.0), 2);
        let a = add_card(&mut board, Point::new(23.0, 23.0));
        let b = add_card(&mut board, Point::new(23.0, 243.0));
        let mut selection = Selection::new();
        selection.insert(BoardItem::Card(a.clone()));
        selection.insert(BoardItem::Card(b.clone()));

        // Grab the lower card so the anchor is not first in visual order.
        let m0 = board.card(&members[0]).unwrap().rect();
        let m1 = board.card(&members[1]).unwrap().rect();
        let anchor = board.card(&b).unwrap().rect();
        let goal_mid = (m0.center().y + m1.center().y) / 2.0;
        let grab = Vec2::new(5.0, 5.0);
        let from = anchor.origin() + grab;
        let to = Point::new(1001.0, goal_mid - anchor.height() / 2.0) + grab;

        let mut session =
            DragSession::begin(&board, &selection, BoardItem::Card(b.clone()), from, Modifiers::default(), &cfg)
                .unwrap();
        session.queue_pointer(to);
        session.apply_frame(&mut board, &cfg);
        let target = session.drop_target().cloned().unwrap();
        assert_eq!(target.column_id, column_id);
        assert_eq!(target.index, 1);
        assert!(target.guide_y > m0.y1 && target.guide_y < m1.y0);

        let outcome = session.finish(&mut board, to, &cfg);
        assert_eq!(
            outcome,
            DragOutcome::Inserted {
                column_id: column_id.clone(),
                card_ids: vec![a.clone(), b.clone()],
            }
        );
        let column = board.column(&column_id).unwrap();
        assert_eq!(
            column.card_ids,
            vec![members[0].clone(), a.clone(), b.clone(), members[1].clone()]
        );
        let ys: Vec<f64> = column.card_ids.iter().map(|id| board.card(id).unwrap().y).collect();
        assert!(ys.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_alt_drag_duplicates_free_card() {
        let mut board = Board::new("b", "b");
        let id = add_card(&mut board, Point::new(23.0, 23.0));
        let outcome = drag(
            &mut board,
            &Selection::new(),
            BoardItem::Card(id.clone()),
            Point::new(30.0, 30.0),
            Point::new(80.0, 30.0),
            Modifiers::ALT,
        );
        let DragOutcome::Duplicated(items) = outcome else {
            panic!("expected a duplicate");
        };
        assert_eq!(board.cards.len(), 2);
        let copy = board.card(items[0].as_card().unwrap()).unwrap();
        assert_ne!(copy.id, id);
        assert_eq!(copy.position(), Point::new(67.0, 23.0));
        let original = board.card(&id).unwrap();
        assert_eq!(original.position(), Point::new(23.0, 23.0));
        assert_eq!(original.content, copy.content);
    }

    #[test]
    fn test_alt_drag_does_not_mutate_until_release() {
        let cfg = config();
        let mut board = Board::new("b", "b");
        let (column_id, _) = add_column(&mut board, Point::new(1001.0, 1001.0), 2);
        let before = board.clone();
        let mut session = DragSession::begin(
            &board,
            &Selection::new(),
            BoardItem::Column(column_id),
            Point::new(1010.0, 990.0),
            Modifiers::ALT,
            &cfg,
        )
        .unwrap();
        session.update(&mut board, Point::new(2010.0, 990.0), &cfg);
        assert_eq!(board, before);
        assert!(session.ghost().is_some());

        let outcome = session.finish(&mut board, Point::new(2010.0, 990.0), &cfg);
        assert!(matches!(outcome, DragOutcome::Duplicated(ref items) if items.len() == 1));
        assert_eq!(board.columns.len(), 2);
        assert_eq!(board.cards.len(), 4);
    }

    #[test]
    fn test_alt_click_is_cancelled() {
        let mut board = Board::new("b", "b");
        let id = add_card(&mut board, Point::new(23.0, 23.0));
        let outcome = drag(
            &mut board,
            &Selection::new(),
            BoardItem::Card(id),
            Point::new(30.0, 30.0),
            Point::new(31.0, 30.0),
            Modifiers::ALT,
        );
        assert_eq!(outcome, DragOutcome::Unchanged);
        assert_eq!(board.cards.len(), 1);
    }
}
