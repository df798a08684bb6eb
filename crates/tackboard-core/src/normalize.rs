//! Tolerant loading of persisted boards.
//!
//! Persisted documents may be partial or hand-edited. [`RawBoard`] accepts
//! anything shaped roughly like a board and [`normalize_board`] turns it
//! into a [`Board`] that satisfies every model invariant. Normalizing an
//! already-normalized board is a fixed point.

use crate::board::{Board, Column, DEFAULT_BOARD_NAME, DEFAULT_COLUMN_NAME};
use crate::cards::{
    Card, CardContent, CardId, ColumnId, ImageContent, LinkContent, TextContent, TextMeasure,
    content_height,
};
use crate::config::BoardConfig;
use crate::grid::snap_card_origin;
use crate::layout::layout_board;
use kurbo::Point;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashSet;

/// A board as found on disk, before validation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawBoard {
    #[serde(deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient_vec")]
    pub cards: Vec<RawCard>,
    #[serde(deserialize_with = "lenient_vec")]
    pub columns: Vec<RawColumn>,
}

/// A card as found on disk; every variant's fields are optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawCard {
    #[serde(deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(rename = "type", deserialize_with = "lenient_string")]
    pub kind: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub x: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub y: Option<f64>,
    #[serde(deserialize_with = "lenient_string")]
    pub text: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub src: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub natural_width: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub natural_height: Option<f64>,
    #[serde(deserialize_with = "lenient_string")]
    pub url: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub image: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub site_name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub note: Option<String>,
    #[serde(deserialize_with = "lenient_bool")]
    pub note_expanded: Option<bool>,
}

/// A column as found on disk.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawColumn {
    #[serde(deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub x: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub y: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub gap: Option<f64>,
    #[serde(deserialize_with = "lenient_vec")]
    pub card_ids: Vec<String>,
}

impl RawBoard {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

impl From<&Board> for RawBoard {
    fn from(board: &Board) -> Self {
        match serde_json::to_value(board).and_then(RawBoard::from_value) {
            Ok(raw) => raw,
            Err(e) => {
                log::error!("Failed to convert board {} to raw form: {}", board.id, e);
                RawBoard::default()
            }
        }
    }
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite()))
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_bool())
}

/// Accept a missing/null/non-array field as empty and drop elements that
/// fail to parse.
fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                log::warn!("Skipping malformed board entry: {}", e);
                None
            }
        })
        .collect())
}

fn raw_content(raw: &RawCard) -> CardContent {
    let note = raw.note.clone().filter(|n| !n.trim().is_empty());
    let note_expanded = raw.note_expanded.unwrap_or(false);
    match raw.kind.as_deref() {
        Some("image") => CardContent::Image(ImageContent {
            src: raw.src.clone().unwrap_or_default(),
            natural_width: raw.natural_width.unwrap_or(0.0),
            natural_height: raw.natural_height.unwrap_or(0.0),
            note,
            note_expanded,
        }),
        Some("link") => {
            let url = raw.url.clone().unwrap_or_default();
            CardContent::Link(LinkContent {
                title: raw
                    .title
                    .clone()
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| url.clone()),
                url,
                description: raw.description.clone(),
                image: raw.image.clone().filter(|i| !i.is_empty()),
                site_name: raw.site_name.clone(),
                note,
                note_expanded,
            })
        }
        other => {
            if let Some(kind) = other.filter(|k| *k != "text") {
                log::warn!("Unknown card type {:?}, loading as text", kind);
            }
            CardContent::Text(TextContent::new(raw.text.clone().unwrap_or_default()))
        }
    }
}

/// Turn a raw board into a valid one.
///
/// - missing ids are generated, duplicate ids keep their first occurrence;
/// - widths are forced to the card width and heights re-derived from content;
/// - positions are snapped to the grid and clamped to the board;
/// - column gaps default when missing or negative;
/// - column members must exist and belong to one column only;
/// - empty columns are dropped and every column is laid out.
pub fn normalize_board(raw: RawBoard, config: &BoardConfig, measure: &dyn TextMeasure) -> Board {
    let id = raw
        .id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let name = raw
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BOARD_NAME.to_string());
    let mut board = Board::new(id, name);

    let mut seen_cards: HashSet<CardId> = HashSet::new();
    for raw_card in &raw.cards {
        let card_id = raw_card
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .map(CardId::from)
            .unwrap_or_default();
        if !seen_cards.insert(card_id.clone()) {
            log::warn!("Dropping duplicate card id {}", card_id);
            continue;
        }
        let content = raw_content(raw_card);
        let height = content_height(&content, config, measure);
        let origin = snap_card_origin(
            Point::new(raw_card.x.unwrap_or(0.0), raw_card.y.unwrap_or(0.0)),
            height,
            config,
        );
        board.cards.push(Card {
            id: card_id,
            x: origin.x,
            y: origin.y,
            width: config.card_width,
            height,
            content,
        });
    }

    let mut claimed: HashSet<CardId> = HashSet::new();
    let mut seen_columns: HashSet<ColumnId> = HashSet::new();
    for raw_column in &raw.columns {
        let column_id = raw_column
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .map(ColumnId::from)
            .unwrap_or_default();
        if !seen_columns.insert(column_id.clone()) {
            log::warn!("Dropping duplicate column id {}", column_id);
            continue;
        }

        let mut card_ids = Vec::with_capacity(raw_column.card_ids.len());
        for raw_id in &raw_column.card_ids {
            let card_id = CardId::from(raw_id.as_str());
            if !seen_cards.contains(&card_id) {
                log::debug!("Column {} referenced missing card {}", column_id, card_id);
                continue;
            }
            if !claimed.insert(card_id.clone()) {
                log::warn!("Card {} claimed by more than one column", card_id);
                continue;
            }
            card_ids.push(card_id);
        }
        if card_ids.is_empty() {
            log::debug!("Dropping empty column {}", column_id);
            continue;
        }

        let gap = raw_column
            .gap
            .filter(|g| *g >= 0.0)
            .unwrap_or(config.column_gap);
        let mut column = Column {
            id: column_id,
            name: raw_column
                .name
                .clone()
                .unwrap_or_else(|| DEFAULT_COLUMN_NAME.to_string()),
            x: 0.0,
            y: 0.0,
            width: config.card_width,
            gap,
            card_ids,
        };
        let stack = board.column_stack_height(&column);
        let origin = snap_card_origin(
            Point::new(raw_column.x.unwrap_or(0.0), raw_column.y.unwrap_or(0.0)),
            stack,
            config,
        );
        column.set_position(origin);
        board.columns.push(column);
    }

    layout_board(&mut board, config);
    board
}

/// Parse and normalize a board JSON document in one step.
pub fn normalize_json(json: &str, config: &BoardConfig, measure: &dyn TextMeasure) -> Result<Board, serde_json::Error> {
    Ok(normalize_board(RawBoard::from_json(json)?, config, measure))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::EstimatedTextMeasure;
    use crate::grid::snap_to_grid;
    use pretty_assertions::assert_eq;

    fn normalize(json: &str) -> Board {
        normalize_json(json, &BoardConfig::default(), &EstimatedTextMeasure::default()).unwrap()
    }

    const SAMPLE: &str = r#"{
        "id": "board-1",
        "name": "Ideas",
        "cards": [
            { "id": "t1", "type": "text", "x": 103.4, "y": 97, "width": 10, "height": 3, "text": "hello **world**" },
            { "id": "i1", "type": "image", "x": 700, "y": 40, "width": 264, "height": 1,
              "src": "assets/a.png", "naturalWidth": 800, "naturalHeight": 600, "note": "n", "noteExpanded": true },
            { "id": "l1", "type": "link", "x": 0, "y": 0, "width": 264, "height": 1,
              "url": "https://example.com", "title": "", "image": "assets/link-1.png" },
            { "id": "l2", "type": "text", "x": 2000, "y": 2000, "width": 264, "height": 1, "text": "b" }
        ],
        "columns": [
            { "id": "c1", "name": "Todo", "x": 300, "y": 300, "width": 99, "gap": 22, "cardIds": ["l1", "missing", "l2"] }
        ]
    }"#;

    #[test]
    fn test_normalize_forces_width_and_grid() {
        let config = BoardConfig::default();
        let board = normalize(SAMPLE);
        for card in &board.cards {
            assert_eq!(card.width, config.card_width);
            assert_eq!(card.height % config.grid_size, 0.0);
            assert_eq!(snap_to_grid(card.x, 22.0, 1.0), card.x);
            assert_eq!(snap_to_grid(card.y, 22.0, 1.0), card.y);
        }
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let config = BoardConfig::default();
        let measure = EstimatedTextMeasure::default();
        let once = normalize(SAMPLE);
        let twice = normalize_board(RawBoard::from(&once), &config, &measure);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_missing_columns_and_fields_default() {
        let board = normalize(r#"{ "id": "b", "name": "n", "cards": [ { "id": "a", "type": "text" } ] }"#);
        assert!(board.columns.is_empty());
        assert_eq!(board.cards.len(), 1);
        assert_eq!(board.cards[0].position(), Point::new(1.0, 1.0));
    }

    #[test]
    fn test_malformed_entries_recover() {
        let board = normalize(
            r#"{ "id": "b", "cards": [ { "id": "a", "type": "text", "x": "5", "y": null },
                                       42,
                                       { "id": "b", "type": "mystery", "text": "t" } ],
                  "columns": null }"#,
        );
        assert_eq!(board.name, DEFAULT_BOARD_NAME);
        assert_eq!(board.cards.len(), 2);
        assert_eq!(board.cards[0].x, 1.0);
        assert_eq!(board.cards[1].kind(), "text");
    }

    #[test]
    fn test_column_references_are_validated() {
        let board = normalize(SAMPLE);
        let column = &board.columns[0];
        assert_eq!(column.card_ids, vec![CardId::from("l1"), CardId::from("l2")]);
        assert_eq!(column.width, BoardConfig::default().card_width);
        let first = board.card(&CardId::from("l1")).unwrap();
        assert_eq!(first.position(), column.position());
    }

    #[test]
    fn test_card_claimed_twice_keeps_first_column() {
        let board = normalize(
            r#"{ "id": "b", "name": "n",
                 "cards": [ { "id": "a", "type": "text" }, { "id": "b", "type": "text" } ],
                 "columns": [ { "id": "c1", "x": 0, "y": 0, "cardIds": ["a"] },
                              { "id": "c2", "x": 500, "y": 0, "cardIds": ["a", "b"] } ] }"#,
        );
        assert_eq!(board.columns[0].card_ids, vec![CardId::from("a")]);
        assert_eq!(board.columns[1].card_ids, vec![CardId::from("b")]);
    }

    #[test]
    fn test_missing_gap_uses_default_and_empty_columns_drop() {
        let board = normalize(
            r#"{ "id": "b", "name": "n",
                 "cards": [ { "id": "a", "type": "text" } ],
                 "columns": [ { "id": "c1", "x": 0, "y": 0, "cardIds": ["a"] },
                              { "id": "c2", "x": 0, "y": 0, "cardIds": ["gone"] } ] }"#,
        );
        assert_eq!(board.columns.len(), 1);
        assert_eq!(board.columns[0].gap, BoardConfig::default().column_gap);
        assert_eq!(board.columns[0].name, DEFAULT_COLUMN_NAME);
    }

    #[test]
    fn test_out_of_bounds_positions_are_clamped() {
        let config = BoardConfig::default();
        let board = normalize(
            r#"{ "id": "b", "name": "n",
                 "cards": [ { "id": "a", "type": "text", "x": -400, "y": 1e9 } ] }"#,
        );
        let card = &board.cards[0];
        assert!(card.x >= 0.0);
        assert!(card.y + card.height <= config.board_height);
    }

    #[test]
    fn test_link_title_falls_back_to_url() {
        let board = normalize(SAMPLE);
        let link = board.card(&CardId::from("l1")).unwrap().as_link().unwrap();
        assert_eq!(link.title, "https://example.com");
    }
}
