//! Game config file loading: parses the JSON map set into the model.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::game::geom::{Offset, Position, Rectangle, Size};
use crate::game::loot::LootGeneratorConfig;
use crate::game::map::{Building, Map, Office, Road};
use crate::game::world::Game;

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("road must have exactly one of x1/y1 (map {map_id})")]
    InvalidRoad { map_id: String },

    #[error("duplicate map id: {0}")]
    DuplicateMap(String),

    #[error("duplicate office id {office_id} on map {map_id}")]
    DuplicateOffice { map_id: String, office_id: String },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GameConfig {
    #[serde(default = "default_dog_speed")]
    default_dog_speed: f64,
    #[serde(default = "default_bag_capacity")]
    default_bag_capacity: usize,
    #[serde(default = "default_retirement_time")]
    dog_retirement_time: f64,
    loot_generator_config: Option<LootGeneratorSection>,
    maps: Vec<MapConfig>,
}

fn default_dog_speed() -> f64 {
    1.0
}

fn default_bag_capacity() -> usize {
    3
}

fn default_retirement_time() -> f64 {
    60.0
}

#[derive(Debug, Deserialize)]
struct LootGeneratorSection {
    /// Base period in seconds.
    period: f64,
    probability: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MapConfig {
    id: String,
    name: String,
    dog_speed: Option<f64>,
    bag_capacity: Option<usize>,
    #[serde(default)]
    roads: Vec<RoadConfig>,
    #[serde(default)]
    buildings: Vec<BuildingConfig>,
    #[serde(default)]
    offices: Vec<OfficeConfig>,
    #[serde(default)]
    loot_types: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RoadConfig {
    x0: i64,
    y0: i64,
    x1: Option<i64>,
    y1: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct BuildingConfig {
    x: i64,
    y: i64,
    w: i64,
    h: i64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
struct OfficeConfig {
    id: String,
    x: i64,
    y: i64,
    offset_x: i64,
    offset_y: i64,
}

/// Load a full [`Game`] from the config file at `path`.
pub fn load_game(path: &Path) -> Result<Game, LoaderError> {
    let content = std::fs::read_to_string(path).map_err(|source| LoaderError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let config: GameConfig = serde_json::from_str(&content)?;
    build_game(config)
}

/// Load a game from an in-memory JSON string (used by tests).
pub fn load_game_from_str(content: &str) -> Result<Game, LoaderError> {
    let config: GameConfig = serde_json::from_str(content)?;
    build_game(config)
}

fn build_game(config: GameConfig) -> Result<Game, LoaderError> {
    let mut game = Game::new();

    if let Some(section) = &config.loot_generator_config {
        game.set_loot_generator_config(LootGeneratorConfig {
            base_interval: Duration::from_secs_f64(section.period),
            probability: section.probability,
        });
    }
    game.set_dog_retirement_time(config.dog_retirement_time);

    for map_config in config.maps {
        let map = build_map(&map_config, config.default_dog_speed, config.default_bag_capacity)?;
        game.add_map(map)
            .map_err(|_| LoaderError::DuplicateMap(map_config.id.clone()))?;
    }

    Ok(game)
}

fn build_map(
    config: &MapConfig,
    default_dog_speed: f64,
    default_bag_capacity: usize,
) -> Result<Map, LoaderError> {
    let mut map = Map::new(config.id.clone(), config.name.clone());
    map.set_dog_speed(config.dog_speed.unwrap_or(default_dog_speed));
    map.set_bag_capacity(config.bag_capacity.unwrap_or(default_bag_capacity));

    for road in &config.roads {
        let start = Position::new(road.x0 as f64, road.y0 as f64);
        let road = match (road.x1, road.y1) {
            (Some(x1), None) => Road::horizontal(start, x1 as f64),
            (None, Some(y1)) => Road::vertical(start, y1 as f64),
            _ => {
                return Err(LoaderError::InvalidRoad {
                    map_id: config.id.clone(),
                })
            }
        };
        map.add_road(road);
    }

    for building in &config.buildings {
        map.add_building(Building {
            bounds: Rectangle {
                position: Position::new(building.x as f64, building.y as f64),
                size: Size {
                    width: building.w as f64,
                    height: building.h as f64,
                },
            },
        });
    }

    for office in &config.offices {
        map.add_office(Office {
            id: office.id.clone(),
            position: Position::new(office.x as f64, office.y as f64),
            offset: Offset {
                dx: office.offset_x as f64,
                dy: office.offset_y as f64,
            },
        })
        .map_err(|_| LoaderError::DuplicateOffice {
            map_id: config.id.clone(),
            office_id: office.id.clone(),
        })?;
    }

    map.set_loot_types(config.loot_types.clone());

    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "defaultDogSpeed": 3.0,
        "defaultBagCapacity": 3,
        "dogRetirementTime": 15.0,
        "lootGeneratorConfig": { "period": 5.0, "probability": 0.5 },
        "maps": [
            {
                "id": "map1",
                "name": "Map 1",
                "dogSpeed": 4.0,
                "bagCapacity": 5,
                "roads": [
                    { "x0": 0, "y0": 0, "x1": 40 },
                    { "x0": 40, "y0": 0, "y1": 30 }
                ],
                "buildings": [
                    { "x": 5, "y": 5, "w": 30, "h": 20 }
                ],
                "offices": [
                    { "id": "o0", "x": 40, "y": 30, "offsetX": 5, "offsetY": 0 }
                ],
                "lootTypes": [
                    { "name": "key", "file": "key.obj", "value": 10 },
                    { "name": "wallet", "file": "wallet.obj", "value": 30 }
                ]
            },
            {
                "id": "map2",
                "name": "Map 2",
                "roads": [ { "x0": 0, "y0": 0, "y1": 20 } ]
            }
        ]
    }"#;

    #[test]
    fn sample_config_loads() {
        let game = load_game_from_str(SAMPLE).unwrap();
        assert_eq!(game.maps().len(), 2);
        assert_eq!(game.dog_retirement_time(), 15.0);

        let map1 = game.find_map("map1").unwrap();
        assert_eq!(map1.name(), "Map 1");
        assert_eq!(map1.dog_speed(), 4.0);
        assert_eq!(map1.bag_capacity(), 5);
        assert_eq!(map1.roads().len(), 2);
        assert!(map1.roads()[0].is_horizontal());
        assert!(map1.roads()[1].is_vertical());
        assert_eq!(map1.buildings().len(), 1);
        assert_eq!(map1.offices().len(), 1);
        assert_eq!(map1.offices()[0].offset.dx, 5.0);
        assert_eq!(map1.loot_value(0), 10);
        assert_eq!(map1.loot_value(1), 30);

        // map2 falls back to top-level defaults.
        let map2 = game.find_map("map2").unwrap();
        assert_eq!(map2.dog_speed(), 3.0);
        assert_eq!(map2.bag_capacity(), 3);
    }

    #[test]
    fn road_with_both_or_neither_endpoint_is_invalid() {
        let bad = r#"{ "maps": [ { "id": "m", "name": "M",
            "roads": [ { "x0": 0, "y0": 0, "x1": 5, "y1": 5 } ] } ] }"#;
        assert!(matches!(
            load_game_from_str(bad),
            Err(LoaderError::InvalidRoad { .. })
        ));

        let bad = r#"{ "maps": [ { "id": "m", "name": "M",
            "roads": [ { "x0": 0, "y0": 0 } ] } ] }"#;
        assert!(matches!(
            load_game_from_str(bad),
            Err(LoaderError::InvalidRoad { .. })
        ));
    }

    #[test]
    fn duplicate_map_ids_are_rejected() {
        let bad = r#"{ "maps": [
            { "id": "m", "name": "A", "roads": [ { "x0": 0, "y0": 0, "x1": 5 } ] },
            { "id": "m", "name": "B", "roads": [ { "x0": 0, "y0": 0, "x1": 5 } ] }
        ] }"#;
        assert!(matches!(
            load_game_from_str(bad),
            Err(LoaderError::DuplicateMap(_))
        ));
    }

    #[test]
    fn duplicate_office_ids_are_rejected() {
        let bad = r#"{ "maps": [ { "id": "m", "name": "M",
            "roads": [ { "x0": 0, "y0": 0, "x1": 5 } ],
            "offices": [
                { "id": "o", "x": 0, "y": 0, "offsetX": 0, "offsetY": 0 },
                { "id": "o", "x": 5, "y": 0, "offsetX": 0, "offsetY": 0 }
            ] } ] }"#;
        assert!(matches!(
            load_game_from_str(bad),
            Err(LoaderError::DuplicateOffice { .. })
        ));
    }

    #[test]
    fn missing_maps_key_is_a_parse_error() {
        assert!(matches!(
            load_game_from_str("{}"),
            Err(LoaderError::Parse(_))
        ));
    }
}
