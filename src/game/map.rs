//! Immutable map topology: roads, buildings, offices and the constrained
//! movement that keeps dogs on the road union.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use super::geom::{MoveResult, Offset, Position, Rectangle, Speed};

/// Half-width of the drivable band around a road centerline.
pub const ROAD_HALF_WIDTH: f64 = 0.4;

/// Capture radius of a dog acting as a gatherer.
pub const DOG_WIDTH: f64 = 0.6;

/// Half-width of an office as a drop-off item.
pub const OFFICE_WIDTH: f64 = 0.5;

/// An axis-aligned road segment. Start and end share exactly one coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Road {
    start: Position,
    end: Position,
}

impl Road {
    pub fn horizontal(start: Position, end_x: f64) -> Self {
        Self {
            start,
            end: Position::new(end_x, start.y),
        }
    }

    pub fn vertical(start: Position, end_y: f64) -> Self {
        Self {
            start,
            end: Position::new(start.x, end_y),
        }
    }

    pub fn is_horizontal(&self) -> bool {
        self.start.y == self.end.y
    }

    pub fn is_vertical(&self) -> bool {
        self.start.x == self.end.x
    }

    pub fn start(&self) -> Position {
        self.start
    }

    pub fn end(&self) -> Position {
        self.end
    }

    pub fn min_x(&self) -> f64 {
        self.start.x.min(self.end.x)
    }

    pub fn max_x(&self) -> f64 {
        self.start.x.max(self.end.x)
    }

    pub fn min_y(&self) -> f64 {
        self.start.y.min(self.end.y)
    }

    pub fn max_y(&self) -> f64 {
        self.start.y.max(self.end.y)
    }

    /// Drivable rectangle: the segment widened by the road half-width on
    /// every side.
    fn borders(&self) -> (Position, Position) {
        (
            Position::new(self.min_x() - ROAD_HALF_WIDTH, self.min_y() - ROAD_HALF_WIDTH),
            Position::new(self.max_x() + ROAD_HALF_WIDTH, self.max_y() + ROAD_HALF_WIDTH),
        )
    }

    pub fn contains(&self, pos: Position) -> bool {
        let (min, max) = self.borders();
        pos.x >= min.x && pos.y >= min.y && pos.x <= max.x && pos.y <= max.y
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Building {
    pub bounds: Rectangle,
}

/// A drop-off point where a dog banks its bag for score.
#[derive(Debug, Clone, PartialEq)]
pub struct Office {
    pub id: String,
    pub position: Position,
    pub offset: Offset,
}

#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("duplicate office id: {0}")]
    DuplicateOffice(String),
}

/// Per-map topology and tuning, immutable after the config file is loaded.
#[derive(Debug)]
pub struct Map {
    id: String,
    name: String,
    roads: Vec<Road>,
    buildings: Vec<Building>,
    offices: Vec<Office>,
    dog_speed: f64,
    bag_capacity: usize,
    loot_types: Vec<serde_json::Value>,
}

impl Map {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            roads: Vec::new(),
            buildings: Vec::new(),
            offices: Vec::new(),
            dog_speed: 1.0,
            bag_capacity: 3,
            loot_types: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn roads(&self) -> &[Road] {
        &self.roads
    }

    pub fn buildings(&self) -> &[Building] {
        &self.buildings
    }

    pub fn offices(&self) -> &[Office] {
        &self.offices
    }

    pub fn dog_speed(&self) -> f64 {
        self.dog_speed
    }

    pub fn set_dog_speed(&mut self, speed: f64) {
        self.dog_speed = speed;
    }

    pub fn bag_capacity(&self) -> usize {
        self.bag_capacity
    }

    pub fn set_bag_capacity(&mut self, capacity: usize) {
        self.bag_capacity = capacity;
    }

    pub fn loot_types(&self) -> &[serde_json::Value] {
        &self.loot_types
    }

    pub fn set_loot_types(&mut self, loot_types: Vec<serde_json::Value>) {
        self.loot_types = loot_types;
    }

    /// Score value of a loot type, 0 when the config omits it.
    pub fn loot_value(&self, type_index: usize) -> i64 {
        self.loot_types
            .get(type_index)
            .and_then(|t| t.get("value"))
            .and_then(|v| v.as_i64())
            .unwrap_or(0)
    }

    pub fn add_road(&mut self, road: Road) {
        self.roads.push(road);
    }

    pub fn add_building(&mut self, building: Building) {
        self.buildings.push(building);
    }

    pub fn add_office(&mut self, office: Office) -> Result<(), MapError> {
        if self.offices.iter().any(|o| o.id == office.id) {
            return Err(MapError::DuplicateOffice(office.id));
        }
        self.offices.push(office);
        Ok(())
    }

    /// Axis-aligned bounding box of the road union, road width included.
    pub fn exact_movement_bounds(&self) -> (Position, Position) {
        if self.roads.is_empty() {
            return (Position::default(), Position::default());
        }

        let mut min = Position::new(f64::MAX, f64::MAX);
        let mut max = Position::new(f64::MIN, f64::MIN);
        for road in &self.roads {
            min.x = min.x.min(road.min_x() - ROAD_HALF_WIDTH);
            min.y = min.y.min(road.min_y() - ROAD_HALF_WIDTH);
            max.x = max.x.max(road.max_x() + ROAD_HALF_WIDTH);
            max.y = max.y.max(road.max_y() + ROAD_HALF_WIDTH);
        }
        (min, max)
    }

    pub fn is_on_road(&self, pos: Position) -> bool {
        self.roads.iter().any(|road| road.contains(pos))
    }

    /// Spawn point used when spawn randomization is off: the start endpoint
    /// of the first road.
    pub fn start_position(&self) -> Position {
        self.roads
            .first()
            .map(|road| road.start())
            .unwrap_or_default()
    }

    /// A uniform point on a uniformly chosen road's centerline, inset from
    /// the endpoints by the road half-width when the interior allows it.
    pub fn random_position(&self, rng: &mut ChaCha8Rng) -> Position {
        let Some(road) = self.roads.get(rng.gen_range(0..self.roads.len().max(1))) else {
            return Position::default();
        };

        if road.is_horizontal() {
            let mut min_x = road.min_x() + ROAD_HALF_WIDTH;
            let mut max_x = road.max_x() - ROAD_HALF_WIDTH;
            if min_x >= max_x {
                min_x = road.min_x();
                max_x = road.max_x();
            }
            Position::new(rng.gen_range(min_x..=max_x), road.start().y)
        } else {
            let mut min_y = road.min_y() + ROAD_HALF_WIDTH;
            let mut max_y = road.max_y() - ROAD_HALF_WIDTH;
            if min_y >= max_y {
                min_y = road.min_y();
                max_y = road.max_y();
            }
            Position::new(road.start().x, rng.gen_range(min_y..=max_y))
        }
    }

    /// Advance a dog by `speed * delta_time`, constrained to the road union.
    ///
    /// The raw target is clamped to the movement bounds first; if the
    /// clamped point is on some road it is accepted as-is. Otherwise the
    /// target is projected onto each road that contains the start point,
    /// along the axis matching the movement direction, and the closest
    /// valid projection wins. With no valid projection the dog stays put.
    /// `hit_boundary` is set whenever the dog did not reach the raw target.
    pub fn move_dog(&self, start: Position, speed: Speed, delta_time: f64) -> MoveResult {
        let mut result = MoveResult {
            position: start,
            hit_boundary: false,
        };

        if self.roads.is_empty() {
            return result;
        }

        let target = Position::new(
            start.x + speed.vx * delta_time,
            start.y + speed.vy * delta_time,
        );

        let (min_bound, max_bound) = self.exact_movement_bounds();

        let mut final_position = target;
        if target.x < min_bound.x {
            final_position.x = min_bound.x;
            result.hit_boundary = true;
        } else if target.x > max_bound.x {
            final_position.x = max_bound.x;
            result.hit_boundary = true;
        }
        if target.y < min_bound.y {
            final_position.y = min_bound.y;
            result.hit_boundary = true;
        } else if target.y > max_bound.y {
            final_position.y = max_bound.y;
            result.hit_boundary = true;
        }

        // A dog at an intersection lies on several roads at once; all of
        // them are candidates for the projection below.
        let mut current_roads: Vec<&Road> = Vec::new();
        for road in &self.roads {
            if road.contains(final_position) {
                result.position = final_position;
                return result;
            }
            if road.contains(start) {
                current_roads.push(road);
            }
        }

        let mut best_position = start;
        let mut min_distance_sq = f64::MAX;

        for road in current_roads {
            let projected = if road.is_horizontal() && speed.vy != 0.0 {
                // Leaving a horizontal road vertically: land on the edge in
                // the direction of travel.
                let road_y = if speed.vy > 0.0 {
                    road.start().y + ROAD_HALF_WIDTH
                } else {
                    road.start().y - ROAD_HALF_WIDTH
                };
                Position::new(
                    final_position
                        .x
                        .clamp(road.min_x() - ROAD_HALF_WIDTH, road.max_x() + ROAD_HALF_WIDTH),
                    road_y,
                )
            } else if road.is_horizontal() && speed.vx != 0.0 {
                let road_y = road.start().y + ROAD_HALF_WIDTH;
                Position::new(
                    final_position
                        .x
                        .clamp(road.min_x() - ROAD_HALF_WIDTH, road.max_x() + ROAD_HALF_WIDTH),
                    road_y,
                )
            } else if road.is_vertical() && speed.vx != 0.0 {
                let road_x = if speed.vx > 0.0 {
                    road.start().x + ROAD_HALF_WIDTH
                } else {
                    road.start().x - ROAD_HALF_WIDTH
                };
                Position::new(
                    road_x,
                    final_position
                        .y
                        .clamp(road.min_y() - ROAD_HALF_WIDTH, road.max_y() + ROAD_HALF_WIDTH),
                )
            } else if road.is_vertical() && speed.vy != 0.0 {
                Position::new(
                    final_position.x,
                    final_position
                        .y
                        .clamp(road.min_y() - ROAD_HALF_WIDTH, road.max_y() + ROAD_HALF_WIDTH),
                )
            } else {
                continue;
            };

            if road.contains(projected) {
                let distance_sq = final_position.sq_distance_to(projected);
                if distance_sq < min_distance_sq {
                    min_distance_sq = distance_sq;
                    best_position = projected;
                }
            }
        }

        let hit_road_boundary =
            best_position.x != final_position.x || best_position.y != final_position.y;

        result.position = best_position;
        result.hit_boundary = result.hit_boundary || hit_road_boundary;
        result
    }
}
