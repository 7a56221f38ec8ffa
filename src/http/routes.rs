//! HTTP route definitions

use std::collections::HashMap;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::app::AppState;
use crate::game::geom::{round6, Direction, Speed};
use crate::game::map::Map;
use crate::util::token::is_valid_token;

use super::error::ApiError;
use super::files::serve_static;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/maps", get(get_maps_handler).fallback(get_head_only))
        .route("/api/v1/maps/:id", get(get_map_handler).fallback(get_head_only))
        .route("/api/v1/game/join", post(join_handler).fallback(post_only))
        .route("/api/v1/game/players", get(players_handler).fallback(get_head_only))
        .route("/api/v1/game/state", get(game_state_handler).fallback(get_head_only))
        .route("/api/v1/game/player/action", post(action_handler).fallback(post_only))
        .route("/api/v1/game/tick", post(tick_handler).fallback(post_only))
        .route("/api/v1/game/records", get(records_handler).fallback(get_head_only))
        .fallback(serve_static)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Helpers
// ============================================================================

async fn post_only() -> ApiError {
    ApiError::InvalidMethod("POST")
}

async fn get_head_only() -> ApiError {
    ApiError::InvalidMethod("GET, HEAD")
}

/// JSON success response with the mandatory no-cache header.
fn json_response(body: serde_json::Value) -> Response {
    let mut response = Json(body).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache"),
    );
    response
}

/// Extract and syntactically validate the bearer token.
fn bearer_token(headers: &HeaderMap) -> Result<String, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(ApiError::InvalidToken("Authorization header is required"))?;

    let token = value
        .strip_prefix("Bearer ")
        .ok_or(ApiError::InvalidToken("Invalid authorization format"))?;

    if !is_valid_token(token) {
        return Err(ApiError::InvalidToken("Invalid token format"));
    }
    Ok(token.to_string())
}

fn require_json_content_type(headers: &HeaderMap) -> Result<(), ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok());
    if content_type != Some("application/json") {
        return Err(ApiError::InvalidArgument("Invalid content type".into()));
    }
    Ok(())
}

// ============================================================================
// Health endpoint
// ============================================================================

async fn health_handler(State(state): State<AppState>) -> Response {
    let world = state.world.lock().await;
    json_response(json!({
        "status": "ok",
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "sessions": world.game.sessions().len(),
        "players": world.game.player_count(),
    }))
}

// ============================================================================
// Map endpoints
// ============================================================================

async fn get_maps_handler(State(state): State<AppState>) -> Response {
    let world = state.world.lock().await;
    let maps: Vec<serde_json::Value> = world
        .game
        .maps()
        .iter()
        .map(|map| json!({ "id": map.id(), "name": map.name() }))
        .collect();
    json_response(serde_json::Value::Array(maps))
}

async fn get_map_handler(
    State(state): State<AppState>,
    Path(map_id): Path<String>,
) -> Result<Response, ApiError> {
    let world = state.world.lock().await;
    let map = world.game.find_map(&map_id).ok_or(ApiError::MapNotFound)?;
    Ok(json_response(map_to_json(map)))
}

fn map_to_json(map: &Map) -> serde_json::Value {
    let roads: Vec<serde_json::Value> = map
        .roads()
        .iter()
        .map(|road| {
            let start = road.start();
            let end = road.end();
            if road.is_horizontal() {
                json!({ "x0": start.x as i64, "y0": start.y as i64, "x1": end.x as i64 })
            } else {
                json!({ "x0": start.x as i64, "y0": start.y as i64, "y1": end.y as i64 })
            }
        })
        .collect();

    let buildings: Vec<serde_json::Value> = map
        .buildings()
        .iter()
        .map(|building| {
            json!({
                "x": building.bounds.position.x as i64,
                "y": building.bounds.position.y as i64,
                "w": building.bounds.size.width as i64,
                "h": building.bounds.size.height as i64,
            })
        })
        .collect();

    let offices: Vec<serde_json::Value> = map
        .offices()
        .iter()
        .map(|office| {
            json!({
                "id": office.id,
                "x": office.position.x as i64,
                "y": office.position.y as i64,
                "offsetX": office.offset.dx as i64,
                "offsetY": office.offset.dy as i64,
            })
        })
        .collect();

    json!({
        "id": map.id(),
        "name": map.name(),
        "roads": roads,
        "buildings": buildings,
        "offices": offices,
        "lootTypes": map.loot_types(),
    })
}

// ============================================================================
// Join endpoint
// ============================================================================

#[derive(Debug, Deserialize)]
struct JoinRequest {
    #[serde(rename = "userName")]
    user_name: String,
    #[serde(rename = "mapId")]
    map_id: String,
}

async fn join_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Response, ApiError> {
    require_json_content_type(&headers)?;

    let request: JoinRequest = serde_json::from_str(&body)
        .map_err(|_| ApiError::InvalidArgument("Join game request parse error".into()))?;

    if request.user_name.is_empty() {
        return Err(ApiError::InvalidArgument("Invalid name".into()));
    }

    let mut world = state.world.lock().await;
    if world.game.find_map(&request.map_id).is_none() {
        return Err(ApiError::MapNotFound);
    }

    let token = world.tokens.generate();
    let player_id = world
        .game
        .join(
            &request.user_name,
            &request.map_id,
            token.clone(),
            state.config.randomize_spawn_points,
        )
        .map_err(|_| ApiError::MapNotFound)?;

    Ok(json_response(json!({
        "authToken": token,
        "playerId": player_id,
    })))
}

// ============================================================================
// Player endpoints
// ============================================================================

async fn players_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let token = bearer_token(&headers)?;

    let world = state.world.lock().await;
    let session = world
        .game
        .find_session_by_token(&token)
        .filter(|session| session.find_player_by_token(&token).is_some())
        .ok_or(ApiError::UnknownToken)?;

    let mut players = serde_json::Map::new();
    for player in session.players() {
        players.insert(
            player.id().to_string(),
            json!({ "name": player.dog().name() }),
        );
    }

    Ok(json_response(serde_json::Value::Object(players)))
}

async fn game_state_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let token = bearer_token(&headers)?;

    let world = state.world.lock().await;
    let session = world
        .game
        .find_session_by_token(&token)
        .filter(|session| session.find_player_by_token(&token).is_some())
        .ok_or(ApiError::UnknownToken)?;

    let mut players = serde_json::Map::new();
    for player in session.players() {
        let dog = player.dog();
        let bag: Vec<serde_json::Value> = player
            .bag()
            .iter()
            .map(|loot| json!({ "id": loot.id, "type": loot.type_index }))
            .collect();

        players.insert(
            player.id().to_string(),
            json!({
                "pos": [round6(dog.position().x), round6(dog.position().y)],
                "speed": [round6(dog.speed().vx), round6(dog.speed().vy)],
                "dir": dog.direction().as_wire(),
                "bag": bag,
                "score": player.score(),
            }),
        );
    }

    let mut lost_objects = serde_json::Map::new();
    for loot in session.loots() {
        lost_objects.insert(
            loot.id.to_string(),
            json!({
                "type": loot.type_index,
                "pos": [round6(loot.position.x), round6(loot.position.y)],
            }),
        );
    }

    Ok(json_response(json!({
        "players": players,
        "lostObjects": lost_objects,
    })))
}

async fn action_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Response, ApiError> {
    let token = bearer_token(&headers)?;

    let mut world = state.world.lock().await;
    if world.game.find_player_by_token(&token).is_none() {
        return Err(ApiError::UnknownToken);
    }

    require_json_content_type(&headers)?;

    let parsed: serde_json::Value = serde_json::from_str(&body)
        .map_err(|_| ApiError::InvalidArgument("Failed to parse player action JSON".into()))?;
    let move_value = parsed
        .get("move")
        .ok_or_else(|| ApiError::InvalidArgument("Missing move field".into()))?;
    let move_str = move_value
        .as_str()
        .ok_or_else(|| ApiError::InvalidArgument("Invalid move value".into()))?;

    let map_id = world
        .game
        .find_player_by_token(&token)
        .map(|player| player.dog().map_id().to_string())
        .ok_or(ApiError::UnknownToken)?;
    let dog_speed = world
        .game
        .find_map(&map_id)
        .map(Map::dog_speed)
        .ok_or_else(|| ApiError::Internal("Map not found".into()))?;

    let player = world
        .game
        .find_player_by_token_mut(&token)
        .ok_or(ApiError::UnknownToken)?;
    let dog = player.dog_mut();

    match move_str {
        "L" => {
            dog.set_direction(Direction::West);
            dog.set_speed(Speed::new(-dog_speed, 0.0));
        }
        "R" => {
            dog.set_direction(Direction::East);
            dog.set_speed(Speed::new(dog_speed, 0.0));
        }
        "U" => {
            dog.set_direction(Direction::North);
            dog.set_speed(Speed::new(0.0, -dog_speed));
        }
        "D" => {
            dog.set_direction(Direction::South);
            dog.set_speed(Speed::new(0.0, dog_speed));
        }
        "" => dog.stop(),
        _ => return Err(ApiError::InvalidArgument("Invalid move direction".into())),
    }

    Ok(json_response(json!({})))
}

// ============================================================================
// Tick endpoint
// ============================================================================

async fn tick_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Response, ApiError> {
    if !state.config.manual_tick_enabled() {
        return Err(ApiError::BadRequest("Invalid endpoint".into()));
    }

    require_json_content_type(&headers)?;

    let parsed: serde_json::Value = serde_json::from_str(&body)
        .map_err(|_| ApiError::InvalidArgument("Failed to parse tick request JSON".into()))?;
    let delta_value = parsed
        .get("timeDelta")
        .ok_or_else(|| ApiError::InvalidArgument("Missing timeDelta field".into()))?;
    if !delta_value.is_i64() && !delta_value.is_u64() {
        return Err(ApiError::InvalidArgument("Invalid timeDelta value".into()));
    }
    let time_delta_ms = delta_value
        .as_u64()
        .ok_or_else(|| ApiError::InvalidArgument("Invalid timeDelta value".into()))?;

    let pending = {
        let mut world = state.world.lock().await;
        world.advance(Duration::from_millis(time_delta_ms))
    };

    // Auto-save writes happen off the lock; failures never fail the tick.
    if let Some(snapshot) = pending {
        if let Err(err) = snapshot.write() {
            error!(%err, path = %snapshot.path().display(), "Failed to auto-save game state");
        }
    }

    Ok(json_response(json!({})))
}

// ============================================================================
// Records endpoint
// ============================================================================

async fn records_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let start: u64 = match params.get("start") {
        Some(raw) => raw
            .parse::<i64>()
            .ok()
            .filter(|v| *v >= 0)
            .map(|v| v as u64)
            .ok_or_else(|| ApiError::InvalidArgument("Invalid start parameter".into()))?,
        None => 0,
    };

    let max_items: u64 = match params.get("maxItems") {
        Some(raw) => raw
            .parse::<i64>()
            .ok()
            .filter(|v| *v > 0 && *v <= 100)
            .map(|v| v as u64)
            .ok_or_else(|| ApiError::InvalidArgument("maxItems must be in (0, 100]".into()))?,
        None => 100,
    };

    let records = state
        .records
        .get_records(start, max_items)
        .await
        .map_err(|err| {
            error!(%err, "Failed to fetch records");
            ApiError::Internal("Failed to fetch records".into())
        })?;

    let body = serde_json::to_value(&records)
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    Ok(json_response(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_validation() {
        let mut headers = HeaderMap::new();
        assert!(matches!(
            bearer_token(&headers),
            Err(ApiError::InvalidToken(_))
        ));

        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert!(matches!(
            bearer_token(&headers),
            Err(ApiError::InvalidToken(_))
        ));

        headers.insert(
            header::AUTHORIZATION,
            format!("Bearer {}", "a".repeat(31)).parse().unwrap(),
        );
        assert!(matches!(
            bearer_token(&headers),
            Err(ApiError::InvalidToken(_))
        ));

        let token = "0123456789abcdef0123456789abcdef";
        headers.insert(
            header::AUTHORIZATION,
            format!("Bearer {token}").parse().unwrap(),
        );
        assert_eq!(bearer_token(&headers).unwrap(), token);
    }

    #[test]
    fn content_type_must_be_json() {
        let mut headers = HeaderMap::new();
        assert!(require_json_content_type(&headers).is_err());

        headers.insert(header::CONTENT_TYPE, "text/plain".parse().unwrap());
        assert!(require_json_content_type(&headers).is_err());

        headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        assert!(require_json_content_type(&headers).is_ok());
    }

    #[test]
    fn map_json_shape() {
        use crate::game::geom::{Offset, Position};
        use crate::game::map::{Office, Road};

        let mut map = Map::new("town", "Town");
        map.add_road(Road::horizontal(Position::new(0.0, 0.0), 40.0));
        map.add_road(Road::vertical(Position::new(40.0, 0.0), 30.0));
        map.add_office(Office {
            id: "o0".into(),
            position: Position::new(40.0, 30.0),
            offset: Offset { dx: 5.0, dy: 0.0 },
        })
        .unwrap();
        map.set_loot_types(vec![json!({"name": "key", "value": 10})]);

        let value = map_to_json(&map);
        assert_eq!(value["id"], "town");
        assert_eq!(value["roads"][0], json!({"x0": 0, "y0": 0, "x1": 40}));
        assert_eq!(value["roads"][1], json!({"x0": 40, "y0": 0, "y1": 30}));
        assert_eq!(
            value["offices"][0],
            json!({"id": "o0", "x": 40, "y": 30, "offsetX": 5, "offsetY": 0})
        );
        assert_eq!(value["lootTypes"][0]["value"], 10);
    }
}
