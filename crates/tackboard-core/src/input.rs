//! Pointer and keyboard input primitives.

use crate::cards::{CardId, ColumnId};
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    /// Only shift held.
    pub const SHIFT: Self = Self {
        shift: true,
        ctrl: false,
        alt: false,
        meta: false,
    };
    /// Only alt held.
    pub const ALT: Self = Self {
        shift: false,
        ctrl: false,
        alt: true,
        meta: false,
    };

    /// Whether the duplicate-drag modifier is held.
    pub fn duplicates(&self) -> bool {
        self.alt
    }

    /// Whether the additive-selection modifier is held.
    pub fn extends_selection(&self) -> bool {
        self.shift
    }
}

/// A selectable, draggable thing on the board.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BoardItem {
    Card(CardId),
    Column(ColumnId),
}

impl BoardItem {
    pub fn as_card(&self) -> Option<&CardId> {
        match self {
            BoardItem::Card(id) => Some(id),
            BoardItem::Column(_) => None,
        }
    }

    pub fn as_column(&self) -> Option<&ColumnId> {
        match self {
            BoardItem::Card(_) => None,
            BoardItem::Column(id) => Some(id),
        }
    }
}

/// Coalesces pointer moves between paint frames.
///
/// Only the latest position survives; intermediate ones are dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerQueue {
    pending: Option<Point>,
}

impl PointerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pointer move. Returns true if a frame should be requested
    /// (nothing was pending yet).
    pub fn push(&mut self, point: Point) -> bool {
        self.pending.replace(point).is_none()
    }

    /// Take the position to apply this frame.
    pub fn take(&mut self) -> Option<Point> {
        self.pending.take()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop any pending position.
    pub fn clear(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_keeps_latest_only() {
        let mut queue = PointerQueue::new();
        assert!(queue.push(Point::new(1.0, 1.0)));
        assert!(!queue.push(Point::new(2.0, 2.0)));
        assert!(!queue.push(Point::new(3.0, 3.0)));
        assert_eq!(queue.take(), Some(Point::new(3.0, 3.0)));
        assert_eq!(queue.take(), None);
    }

    #[test]
    fn test_queue_clear() {
        let mut queue = PointerQueue::new();
        queue.push(Point::new(1.0, 1.0));
        queue.clear();
        assert!(!queue.is_pending());
    }

    #[test]
    fn test_modifier_helpers() {
        assert!(Modifiers::ALT.duplicates());
        assert!(!Modifiers::ALT.extends_selection());
        assert!(Modifiers::SHIFT.extends_selection());
        assert!(!Modifiers::default().duplicates());
    }

    #[test]
    fn test_board_item_accessors() {
        let card = BoardItem::Card(CardId::from("a"));
        let column = BoardItem::Column(ColumnId::from("c"));
        assert_eq!(card.as_card(), Some(&CardId::from("a")));
        assert!(card.as_column().is_none());
        assert_eq!(column.as_column(), Some(&ColumnId::from("c")));
    }
}
