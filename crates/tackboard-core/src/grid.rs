//! Grid snapping and board-extent math.
//!
//! Every coordinate that lands on the board goes through these helpers so
//! cards stay aligned to the visual grid and never leave the board.

use crate::config::BoardConfig;
use kurbo::{Point, Rect, Size, Vec2};

/// Tolerance used when rounding sizes up, so `88.0000001` stays `88`.
const CEIL_EPSILON: f64 = 1e-6;

/// Round `value` to the nearest multiple of `grid_size`, shifted by `offset`.
pub fn snap_to_grid(value: f64, grid_size: f64, offset: f64) -> f64 {
    ((value - offset) / grid_size).round() * grid_size + offset
}

/// Round a size up to the next grid multiple.
pub fn ceil_to_grid(value: f64, grid_size: f64) -> f64 {
    ((value - CEIL_EPSILON) / grid_size).ceil().max(0.0) * grid_size
}

/// Restrict `value` to `[lo, hi]`. Non-finite input collapses to `lo`.
pub fn clamp(value: f64, lo: f64, hi: f64) -> f64 {
    if !value.is_finite() {
        return lo;
    }
    if hi < lo {
        return lo;
    }
    value.clamp(lo, hi)
}

/// Snap `value` to the grid while keeping it inside `[lo, hi]`.
///
/// When the nearest grid line falls outside the range, the next line
/// inward is used instead.
pub fn snap_within(value: f64, lo: f64, hi: f64, grid_size: f64, offset: f64) -> f64 {
    let mut snapped = snap_to_grid(clamp(value, lo, hi), grid_size, offset);
    if snapped > hi {
        snapped -= grid_size;
    }
    if snapped < lo {
        snapped += grid_size;
    }
    clamp(snapped, lo, hi)
}

/// Snap a card origin to the grid inside the board extent.
pub fn snap_card_origin(point: Point, height: f64, config: &BoardConfig) -> Point {
    Point::new(
        snap_within(
            point.x,
            0.0,
            config.max_card_x(),
            config.grid_size,
            config.grid_offset,
        ),
        snap_within(
            point.y,
            0.0,
            config.max_y_for(height),
            config.grid_size,
            config.grid_offset,
        ),
    )
}

/// Clamp a card origin inside the board extent without snapping.
pub fn clamp_card_origin(point: Point, height: f64, config: &BoardConfig) -> Point {
    Point::new(
        clamp(point.x, 0.0, config.max_card_x()),
        clamp(point.y, 0.0, config.max_y_for(height)),
    )
}

/// Board extent as a rectangle anchored at the origin.
pub fn board_rect(config: &BoardConfig) -> Rect {
    Rect::from_origin_size(Point::ZERO, Size::new(config.board_width, config.board_height))
}

/// True when `inner` lies entirely inside `outer` (edges may touch).
pub fn rect_contains(outer: Rect, inner: Rect) -> bool {
    inner.x0 >= outer.x0 && inner.y0 >= outer.y0 && inner.x1 <= outer.x1 && inner.y1 <= outer.y1
}

/// Bounding box of a set of rectangles.
pub fn union_bounds<I: IntoIterator<Item = Rect>>(rects: I) -> Option<Rect> {
    rects.into_iter().fold(None, |acc, r| match acc {
        Some(acc) => Some(r.union(acc)),
        None => Some(r),
    })
}

/// Clamp a translation so `bounds + delta` stays inside the board.
pub fn clamp_delta(bounds: Rect, delta: Vec2, config: &BoardConfig) -> Vec2 {
    Vec2::new(
        clamp(delta.x, -bounds.x0, config.board_width - bounds.x1),
        clamp(delta.y, -bounds.y0, config.board_height - bounds.y1),
    )
}

/// Snap a group translation so the anchor lands on the grid, then pull it
/// back inside the board one grid step at a time.
pub fn snap_group_delta(bounds: Rect, anchor: Point, delta: Vec2, config: &BoardConfig) -> Vec2 {
    let grid = config.grid_size;
    let target = Point::new(
        snap_to_grid(anchor.x + delta.x, grid, config.grid_offset),
        snap_to_grid(anchor.y + delta.y, grid, config.grid_offset),
    );
    let mut snapped = target - anchor;

    let step_inside = |d: f64, lo_edge: f64, hi_edge: f64, extent: f64| -> f64 {
        let mut d = d;
        if hi_edge + d > extent {
            d -= ((hi_edge + d - extent) / grid).ceil() * grid;
        }
        if lo_edge + d < 0.0 {
            d += ((-(lo_edge + d)) / grid).ceil() * grid;
        }
        d
    };
    snapped.x = step_inside(snapped.x, bounds.x0, bounds.x1, config.board_width);
    snapped.y = step_inside(snapped.y, bounds.y0, bounds.y1, config.board_height);

    // A group larger than the board cannot stay aligned; fall back to a clamp.
    clamp_delta(bounds, snapped, config)
}

/// Euclidean distance between two pointer positions.
pub fn distance(a: Point, b: Point) -> f64 {
    (b - a).hypot()
}
