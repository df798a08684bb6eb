//! The board controller.
//!
//! [`BoardEngine`] owns the working board together with all interaction
//! state (selection, the active drag or marquee, history) and exposes the
//! operations a host UI calls. It performs no I/O: persistence and link
//! previews are driven by the host, which feeds results back in.

use crate::board::{Board, Column};
use crate::cards::{
    Card, CardContent, CardId, ColumnId, EstimatedTextMeasure, ImageContent, LinkContent,
    LinkMetadata, TextContent, TextMeasure, validate_link_url,
};
use crate::config::BoardConfig;
use crate::drag::{DragOutcome, DragSession};
use crate::grid::snap_card_origin;
use crate::history::History;
use crate::input::{BoardItem, Modifiers};
use crate::layout::layout_board;
use crate::normalize::{RawBoard, normalize_board};
use crate::selection::{Selection, is_click, marquee_select};
use crate::summary::board_summary;
use kurbo::{Point, Rect};
use std::collections::HashMap;

#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;
#[cfg(target_arch = "wasm32")]
use web_time::Instant;

/// Handle for a pending link-preview fetch.
///
/// A newer ticket for the same card supersedes older ones, so late results
/// for a replaced URL are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkFetchTicket {
    pub card_id: CardId,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy)]
struct MarqueeState {
    start: Point,
    current: Point,
    modifiers: Modifiers,
}

/// Controller owning a board and its interaction state.
pub struct BoardEngine {
    board: Board,
    selection: Selection,
    drag: Option<DragSession>,
    marquee: Option<MarqueeState>,
    history: History,
    config: BoardConfig,
    measure: Box<dyn TextMeasure>,
    link_generations: HashMap<CardId, u64>,
    next_generation: u64,
    revision: u64,
}

impl BoardEngine {
    /// Create an engine with the estimated text measurer.
    pub fn new(board: Board, config: BoardConfig) -> Self {
        Self::with_measure(board, config, Box::new(EstimatedTextMeasure::default()))
    }

    /// Create an engine with a host-provided text measurer. The board is
    /// normalized first.
    pub fn with_measure(board: Board, config: BoardConfig, measure: Box<dyn TextMeasure>) -> Self {
        Self::from_raw(RawBoard::from(&board), config, measure)
    }

    /// Create an engine from a persisted, possibly malformed document.
    pub fn from_raw(raw: RawBoard, config: BoardConfig, measure: Box<dyn TextMeasure>) -> Self {
        let board = normalize_board(raw, &config, measure.as_ref());
        let history = History::new(&board, &config);
        Self {
            board,
            selection: Selection::new(),
            drag: None,
            marquee: None,
            history,
            config,
            measure,
            link_generations: HashMap::new(),
            next_generation: 0,
            revision: 0,
        }
    }

    /// Replace the working board, dropping history and interaction state.
    pub fn load(&mut self, raw: RawBoard) {
        self.board = normalize_board(raw, &self.config, self.measure.as_ref());
        self.history.reset(&self.board);
        self.selection.clear();
        self.drag = None;
        self.marquee = None;
        self.link_generations.clear();
        self.revision += 1;
        log::info!("Loaded board {} ({} cards)", self.board.id, self.board.len());
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// The active drag, for live feedback (drop guide, ghost, preview).
    pub fn drag(&self) -> Option<&DragSession> {
        self.drag.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// The marquee rectangle being drawn, if any.
    pub fn marquee_rect(&self) -> Option<Rect> {
        self.marquee.map(|m| Rect::from_points(m.start, m.current))
    }

    /// Counter bumped on every settled change; hosts use it to trigger
    /// autosave.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Plain-text digest of the board for the chat collaborator.
    pub fn summary(&self) -> String {
        board_summary(&self.board)
    }

    /// Topmost card under `point`, else the column whose widget contains it.
    pub fn hit_test(&self, point: Point) -> Option<BoardItem> {
        if let Some(card) = self.board.cards.iter().rev().find(|c| c.rect().contains(point)) {
            return Some(BoardItem::Card(card.id.clone()));
        }
        self.board
            .columns
            .iter()
            .rev()
            .find(|c| self.board.column_bounds(c, &self.config).contains(point))
            .map(|c| BoardItem::Column(c.id.clone()))
    }

    /// Layout and an immediate history step after a structural change.
    fn settle(&mut self) {
        layout_board(&mut self.board, &self.config);
        self.selection.retain_existing(&self.board);
        self.history.commit(&self.board);
        self.revision += 1;
    }

    /// Layout and a debounced history step after a content edit.
    fn edited(&mut self, now: Instant) {
        layout_board(&mut self.board, &self.config);
        self.history.schedule(now);
        self.revision += 1;
    }

    /// Ticket for fetching `url`'s preview, or `None` when it must not be
    /// fetched. Either way older tickets for the card are superseded.
    fn fetch_ticket(&mut self, card_id: &CardId, url: &str) -> Option<LinkFetchTicket> {
        match validate_link_url(url) {
            Ok(_) => Some(self.issue_ticket(card_id.clone())),
            Err(e) => {
                log::debug!("Not fetching preview for {}: {}", card_id, e);
                self.link_generations.remove(card_id);
                None
            }
        }
    }

    fn issue_ticket(&mut self, card_id: CardId) -> LinkFetchTicket {
        self.next_generation += 1;
        self.link_generations.insert(card_id.clone(), self.next_generation);
        LinkFetchTicket {
            card_id,
            generation: self.next_generation,
        }
    }

    // Pointer interaction

    /// Pointer pressed over `target`, or over empty canvas when `None`.
    pub fn pointer_down(&mut self, point: Point, target: Option<BoardItem>, modifiers: Modifiers) -> bool {
        self.cancel_interaction();
        let Some(item) = target else {
            self.marquee = Some(MarqueeState {
                start: point,
                current: point,
                modifiers,
            });
            return true;
        };

        self.selection.click(&self.board, item.clone(), modifiers);
        match DragSession::begin(&self.board, &self.selection, item, point, modifiers, &self.config) {
            Some(session) => {
                self.history.begin_interaction(&self.board);
                self.drag = Some(session);
                true
            }
            None => false,
        }
    }

    /// Pointer moved. Drag moves are queued until the next
    /// [`animation_frame`](Self::animation_frame); returns true if a frame
    /// should be requested.
    pub fn pointer_move(&mut self, point: Point) -> bool {
        if let Some(drag) = self.drag.as_mut() {
            return drag.queue_pointer(point);
        }
        if let Some(marquee) = self.marquee.as_mut() {
            marquee.current = point;
            return true;
        }
        false
    }

    /// Apply the latest queued pointer move.
    pub fn animation_frame(&mut self) -> bool {
        match self.drag.as_mut() {
            Some(drag) => drag.apply_frame(&mut self.board, &self.config),
            None => false,
        }
    }

    /// Pointer released. Resolves the drag or marquee.
    pub fn pointer_up(&mut self, point: Point) -> Option<DragOutcome> {
        if let Some(session) = self.drag.take() {
            let outcome = session.finish(&mut self.board, point, &self.config);
            if let DragOutcome::Duplicated(items) = &outcome {
                self.selection.clear();
                for item in items {
                    self.selection.insert(item.clone());
                }
            }
            self.selection.retain_existing(&self.board);
            if self.history.end_interaction(&self.board) {
                self.revision += 1;
            }
            return Some(outcome);
        }
        if let Some(marquee) = self.marquee.take() {
            if !self.click_empty_canvas(marquee.start, point) {
                self.marquee(Rect::from_points(marquee.start, point), marquee.modifiers);
            }
        }
        None
    }

    /// Clear the selection if the press/release pair was a click.
    pub fn click_empty_canvas(&mut self, start: Point, end: Point) -> bool {
        if !is_click(start, end, &self.config) {
            return false;
        }
        self.selection.clear();
        true
    }

    /// Select everything fully inside `rect`; shift adds to the selection.
    pub fn marquee(&mut self, rect: Rect, modifiers: Modifiers) -> usize {
        let found = marquee_select(&self.board, rect, &self.config);
        if !modifiers.extends_selection() {
            self.selection.clear();
        }
        self.selection.extend(found);
        self.selection.len()
    }

    /// Click-select an item without dragging it.
    pub fn select(&mut self, item: BoardItem, modifiers: Modifiers) -> bool {
        self.selection.click(&self.board, item, modifiers)
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = selection;
        self.selection.retain_existing(&self.board);
    }

    /// Clear the selection and any marquee in progress.
    pub fn escape(&mut self) -> bool {
        let had = !self.selection.is_empty() || self.marquee.is_some();
        self.selection.clear();
        self.marquee = None;
        had
    }

    // Structural commands

    pub fn add_text_card(&mut self, position: Point, text: impl Into<String>) -> CardId {
        self.add_card(position, CardContent::Text(TextContent::new(text)))
    }

    pub fn add_image_card(
        &mut self,
        position: Point,
        src: impl Into<String>,
        natural_width: f64,
        natural_height: f64,
    ) -> CardId {
        self.add_card(
            position,
            CardContent::Image(ImageContent::new(src, natural_width, natural_height)),
        )
    }

    /// Add a link card. A preview ticket is issued only when the URL is
    /// safe to fetch; the card is created either way.
    pub fn add_link_card(&mut self, position: Point, url: &str) -> (CardId, Option<LinkFetchTicket>) {
        let id = self.add_card(position, CardContent::Link(LinkContent::new(url.trim())));
        let ticket = self.fetch_ticket(&id, url);
        (id, ticket)
    }

    fn add_card(&mut self, position: Point, content: CardContent) -> CardId {
        let mut card = Card::new(position, content, &self.config, self.measure.as_ref());
        card.set_position(snap_card_origin(position, card.height, &self.config));
        let id = self.board.add_card(card);
        self.selection = Selection::single(BoardItem::Card(id.clone()));
        self.settle();
        id
    }

    pub fn delete_card(&mut self, id: &CardId) -> bool {
        if self.board.remove_card(id).is_none() {
            return false;
        }
        self.link_generations.remove(id);
        self.board.prune_empty_columns(None);
        self.settle();
        true
    }

    /// Delete a column and all of its cards.
    pub fn delete_column(&mut self, id: &ColumnId) -> bool {
        let Some(column) = self.board.remove_column(id) else {
            return false;
        };
        for card_id in &column.card_ids {
            self.link_generations.remove(card_id);
        }
        self.settle();
        true
    }

    /// Delete every selected card and every selected column with its cards.
    pub fn delete_selection(&mut self) -> bool {
        let columns: Vec<ColumnId> = self.selection.columns().cloned().collect();
        let cards: Vec<CardId> = self.selection.cards().cloned().collect();
        let mut removed = 0;
        for id in &columns {
            if let Some(column) = self.board.remove_column(id) {
                for card_id in &column.card_ids {
                    self.link_generations.remove(card_id);
                }
                removed += 1;
            }
        }
        for id in &cards {
            if self.board.remove_card(id).is_some() {
                self.link_generations.remove(id);
                removed += 1;
            }
        }
        self.selection.clear();
        if removed == 0 {
            return false;
        }
        self.board.strip_dangling();
        self.board.prune_empty_columns(None);
        log::debug!("Deleted {} selected items", removed);
        self.settle();
        true
    }

    /// Turn the selected free cards into a new list, ordered top to bottom
    /// (ties by x, then creation order), anchored at their top-left.
    pub fn create_list_from_selection(&mut self) -> Option<ColumnId> {
        let mut picked: Vec<(f64, f64, usize, CardId)> = self
            .selection
            .cards()
            .filter(|id| self.board.is_free(id))
            .filter_map(|id| {
                let card = self.board.card(id)?;
                Some((card.y, card.x, self.board.card_order(id)?, id.clone()))
            })
            .collect();
        if picked.is_empty() {
            return None;
        }
        picked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)).then(a.2.cmp(&b.2)));

        let top_left = picked
            .iter()
            .fold(Point::new(f64::INFINITY, f64::INFINITY), |acc, (y, x, _, _)| {
                Point::new(acc.x.min(*x), acc.y.min(*y))
            });
        let mut column = Column::new(top_left, &self.config);
        for (_, _, _, id) in picked {
            self.board.detach_card(&id);
            column.card_ids.push(id);
        }
        let stack = self.board.column_stack_height(&column);
        column.set_position(snap_card_origin(top_left, stack, &self.config));
        let column_id = self.board.add_column(column);
        self.board.prune_empty_columns(Some(&column_id));
        self.selection = Selection::single(BoardItem::Column(column_id.clone()));
        self.settle();
        Some(column_id)
    }

    // Content edits

    pub fn set_card_text(&mut self, id: &CardId, text: impl Into<String>, now: Instant) -> bool {
        let Some(card) = self.board.card_mut(id) else {
            return false;
        };
        let CardContent::Text(content) = &mut card.content else {
            return false;
        };
        content.text = text.into();
        card.refresh_size(&self.config, self.measure.as_ref());
        self.edited(now);
        true
    }

    /// Set or clear the note of an image or link card.
    pub fn set_card_note(&mut self, id: &CardId, note: Option<String>, now: Instant) -> bool {
        let Some(card) = self.board.card_mut(id) else {
            return false;
        };
        if !card.set_note(note) {
            return false;
        }
        card.refresh_size(&self.config, self.measure.as_ref());
        self.edited(now);
        true
    }

    /// Expand or collapse a note. Returns the new expanded state.
    pub fn toggle_note(&mut self, id: &CardId, now: Instant) -> Option<bool> {
        let card = self.board.card_mut(id)?;
        let expanded = card.toggle_note()?;
        card.refresh_size(&self.config, self.measure.as_ref());
        self.edited(now);
        Some(expanded)
    }

    pub fn rename_column(&mut self, id: &ColumnId, name: impl Into<String>, now: Instant) -> bool {
        let Some(column) = self.board.column_mut(id) else {
            return false;
        };
        column.name = name.into();
        self.edited(now);
        true
    }

    pub fn rename_board(&mut self, name: impl Into<String>, now: Instant) {
        self.board.name = name.into();
        self.edited(now);
    }

    /// Point a link card at a new URL, resetting its preview. Returns a
    /// fetch ticket when the card is a link and the URL is safe to fetch.
    pub fn set_link_url(&mut self, id: &CardId, url: &str, now: Instant) -> Option<LinkFetchTicket> {
        let card = self.board.card_mut(id)?;
        let link = card.as_link_mut()?;
        let mut fresh = LinkContent::new(url.trim());
        fresh.note = link.note.take();
        fresh.note_expanded = link.note_expanded;
        *link = fresh;
        card.refresh_size(&self.config, self.measure.as_ref());
        self.edited(now);
        self.fetch_ticket(id, url)
    }

    /// Apply fetched link metadata to the current card state.
    ///
    /// Results for superseded tickets, deleted cards or cards that are no
    /// longer links are ignored.
    pub fn apply_link_metadata(&mut self, ticket: &LinkFetchTicket, metadata: &LinkMetadata) -> bool {
        if self.link_generations.get(&ticket.card_id) != Some(&ticket.generation) {
            log::debug!("Ignoring stale link metadata for {}", ticket.card_id);
            return false;
        }
        self.link_generations.remove(&ticket.card_id);
        let Some(card) = self.board.card_mut(&ticket.card_id) else {
            return false;
        };
        let Some(link) = card.as_link_mut() else {
            log::debug!("Card {} is no longer a link", ticket.card_id);
            return false;
        };
        if !link.apply_metadata(metadata) {
            return false;
        }
        card.refresh_size(&self.config, self.measure.as_ref());
        if self.drag.is_some() {
            // Layout runs again when the drag resolves.
            self.revision += 1;
            return true;
        }
        self.settle();
        true
    }

    /// Swap the text measurer (e.g. once real fonts are available) and
    /// re-derive every card height.
    pub fn set_measure(&mut self, measure: Box<dyn TextMeasure>) -> bool {
        self.measure = measure;
        self.refresh_layout()
    }

    /// Re-derive card sizes and column layout. Returns true if anything
    /// changed.
    pub fn refresh_layout(&mut self) -> bool {
        let mut changed = false;
        for card in &mut self.board.cards {
            changed |= card.refresh_size(&self.config, self.measure.as_ref());
        }
        changed |= layout_board(&mut self.board, &self.config);
        if changed {
            // Heights are not part of the signature, so this only refreshes
            // the committed copy. A pending edit or live drag commits later.
            if !self.history.has_pending() && !self.history.is_interacting() {
                self.history.commit(&self.board);
            }
            self.revision += 1;
        }
        changed
    }

    // History

    /// Commit a due debounced edit.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.history.tick(now, &self.board)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo() || self.history.has_pending()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo(&mut self) -> bool {
        self.cancel_interaction();
        match self.history.undo(&self.board) {
            Some(board) => {
                self.restore(board);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        self.cancel_interaction();
        match self.history.redo(&self.board) {
            Some(board) => {
                self.restore(board);
                true
            }
            None => false,
        }
    }

    /// Drop any live drag or marquee, undoing the drag's uncommitted moves.
    fn cancel_interaction(&mut self) {
        self.marquee = None;
        if let Some(session) = self.drag.take() {
            session.cancel(&mut self.board, &self.config);
            self.history.cancel_interaction();
            log::debug!("Cancelled drag in progress");
        }
    }

    fn restore(&mut self, board: Board) {
        self.board = board;
        self.selection.clear();
        self.revision += 1;
    }
}
