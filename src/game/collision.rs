//! Continuous collision detection between moving gatherers and static items.
//!
//! A gatherer is the segment a dog swept during one tick plus a capture
//! radius; an item is a point with its own radius (loot is width 0, offices
//! 0.5). Events are reported in chronological order within the tick, with
//! `time` being the position along the segment (0 = tick start, 1 = end).

use super::geom::Position;

/// A static collectable target.
#[derive(Debug, Clone, Copy)]
pub struct Item {
    pub position: Position,
    pub width: f64,
}

/// A moving collector: the segment covered during the tick plus a radius.
#[derive(Debug, Clone, Copy)]
pub struct Gatherer {
    pub start_pos: Position,
    pub end_pos: Position,
    pub width: f64,
}

/// One gatherer/item intersection within a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GatheringEvent {
    pub item_id: usize,
    pub gatherer_id: usize,
    pub sq_distance: f64,
    pub time: f64,
}

/// Capability set the detector needs; implemented by the session over its
/// live loot or the map's offices.
pub trait ItemGathererProvider {
    fn items_count(&self) -> usize;
    fn item(&self, idx: usize) -> Item;
    fn gatherers_count(&self) -> usize;
    fn gatherer(&self, idx: usize) -> Gatherer;
}

/// Projection of a point onto a movement segment.
#[derive(Debug, Clone, Copy)]
pub struct CollectionResult {
    /// Squared perpendicular distance from the point to the segment line.
    pub sq_distance: f64,
    /// Position of the projection along the segment, 0 at start, 1 at end.
    pub proj_ratio: f64,
}

impl CollectionResult {
    pub fn is_collected(&self, collect_radius: f64) -> bool {
        self.proj_ratio >= 0.0
            && self.proj_ratio <= 1.0
            && self.sq_distance <= collect_radius * collect_radius
    }
}

/// Project item position `c` onto the segment `a -> b`.
///
/// The displacement must be non-zero; callers skip stationary gatherers.
pub fn try_collect_point(a: Position, b: Position, c: Position) -> CollectionResult {
    debug_assert!(b.x != a.x || b.y != a.y);
    let u_x = c.x - a.x;
    let u_y = c.y - a.y;
    let v_x = b.x - a.x;
    let v_y = b.y - a.y;
    let u_dot_v = u_x * v_x + u_y * v_y;
    let u_len2 = u_x * u_x + u_y * u_y;
    let v_len2 = v_x * v_x + v_y * v_y;

    CollectionResult {
        sq_distance: u_len2 - (u_dot_v * u_dot_v) / v_len2,
        proj_ratio: u_dot_v / v_len2,
    }
}

/// Find every gather event for the provider's gatherers and items, sorted
/// ascending by time. Gatherers with zero displacement produce no events.
pub fn find_gather_events(provider: &dyn ItemGathererProvider) -> Vec<GatheringEvent> {
    let mut events = Vec::new();

    for gatherer_idx in 0..provider.gatherers_count() {
        let gatherer = provider.gatherer(gatherer_idx);

        if gatherer.start_pos == gatherer.end_pos {
            continue;
        }

        for item_idx in 0..provider.items_count() {
            let item = provider.item(item_idx);
            let result = try_collect_point(gatherer.start_pos, gatherer.end_pos, item.position);

            // The hit test uses the gatherer radius only; item widths ride
            // along for providers but do not widen the capture band.
            if result.is_collected(gatherer.width) {
                events.push(GatheringEvent {
                    item_id: item_idx,
                    gatherer_id: gatherer_idx,
                    sq_distance: result.sq_distance,
                    time: result.proj_ratio,
                });
            }
        }
    }

    // Stable sort keeps provider order deterministic for equal times.
    events.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap_or(std::cmp::Ordering::Equal));

    events
}
