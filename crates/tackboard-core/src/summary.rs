//! Plain-text board digest handed to the chat collaborator as context.

use crate::board::Board;
use crate::cards::{Card, CardContent, plain_text};
use std::fmt::Write;

fn describe(card: &Card, out: &mut String) {
    match &card.content {
        CardContent::Text(t) => {
            let _ = writeln!(out, "- {}", plain_text(&t.text).trim());
        }
        CardContent::Image(i) => {
            let _ = writeln!(out, "- [image] {}", i.src);
        }
        CardContent::Link(l) => {
            let _ = write!(out, "- [link] {} <{}>", l.title, l.url);
            if let Some(site) = l.site_name.as_deref().filter(|s| !s.is_empty()) {
                let _ = write!(out, " ({site})");
            }
            out.push('\n');
            if let Some(description) = l.description.as_deref().filter(|d| !d.is_empty()) {
                let _ = writeln!(out, "  {}", description);
            }
        }
    }
    if let Some(note) = card.note() {
        let _ = writeln!(out, "  note: {}", plain_text(note).trim());
    }
}

/// Summarize a board: each list with its cards in order, then free cards.
pub fn board_summary(board: &Board) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Board: {}", board.name);
    for column in &board.columns {
        let _ = writeln!(out, "\nList: {}", column.name);
        for card in board.column_cards(column) {
            describe(card, &mut out);
        }
    }
    let mut free = board.free_cards().peekable();
    if free.peek().is_some() {
        out.push_str("\nFree cards:\n");
        for card in free {
            describe(card, &mut out);
        }
    }
    out
}
