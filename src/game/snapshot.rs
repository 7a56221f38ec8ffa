//! Durable state snapshots: the serde model of the state file, capture and
//! restore against a live [`Game`], and the atomic on-disk write.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::geom::{round6, Direction, Position, Speed};
use super::loot::Loot;
use super::session::{Dog, Player};
use super::world::Game;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to write state file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateFile {
    pub sessions: Vec<SessionState>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionState {
    pub id: String,
    pub map_id: String,
    pub next_loot_id: u64,
    pub players: Vec<PlayerState>,
    pub loots: Vec<LootState>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerState {
    pub id: u64,
    pub token: String,
    pub score: i64,
    pub bag_capacity: usize,
    pub dog: DogState,
    pub bag: Vec<LootState>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DogState {
    pub id: String,
    pub name: String,
    pub map_id: String,
    pub position: PointState,
    pub speed: VelocityState,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PointState {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct VelocityState {
    pub vx: f64,
    pub vy: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LootState {
    pub id: u64,
    #[serde(rename = "type")]
    pub type_index: usize,
    pub value: i64,
    pub position: PointState,
}

impl LootState {
    fn capture(loot: &Loot) -> Self {
        Self {
            id: loot.id,
            type_index: loot.type_index,
            value: loot.value,
            position: PointState {
                x: round6(loot.position.x),
                y: round6(loot.position.y),
            },
        }
    }

    fn restore(&self) -> Loot {
        Loot {
            id: self.id,
            type_index: self.type_index,
            position: Position::new(self.position.x, self.position.y),
            value: self.value,
        }
    }
}

/// Capture the whole game into the state-file model, rounding coordinates
/// to wire precision.
pub fn capture(game: &Game) -> StateFile {
    let sessions = game
        .sessions()
        .iter()
        .map(|session| SessionState {
            id: session.id().to_string(),
            map_id: session.map_id().to_string(),
            next_loot_id: session.next_loot_id(),
            players: session.players().iter().map(capture_player).collect(),
            loots: session.loots().iter().map(LootState::capture).collect(),
        })
        .collect();

    StateFile { sessions }
}

fn capture_player(player: &Player) -> PlayerState {
    let dog = player.dog();
    PlayerState {
        id: player.id(),
        token: player.token().to_string(),
        score: player.score(),
        bag_capacity: player.bag_capacity(),
        dog: DogState {
            id: dog.id().to_string(),
            name: dog.name().to_string(),
            map_id: dog.map_id().to_string(),
            position: PointState {
                x: round6(dog.position().x),
                y: round6(dog.position().y),
            },
            speed: VelocityState {
                vx: round6(dog.speed().vx),
                vy: round6(dog.speed().vy),
            },
            direction: dog.direction(),
        },
        bag: player.bag().iter().map(LootState::capture).collect(),
    }
}

/// Load a state file back into a fresh game. Sessions whose map is unknown
/// are skipped with a warning; id sequences continue past the restored
/// maxima and the token index is rebuilt.
pub fn restore(game: &mut Game, state: &StateFile) {
    let mut max_player_id: Option<u64> = None;

    for session_state in &state.sessions {
        let session = match game.get_or_create_session(&session_state.map_id) {
            Ok(session) => session,
            Err(err) => {
                warn!(map_id = %session_state.map_id, %err, "Skipping session from state file");
                continue;
            }
        };

        session.set_next_loot_id(session_state.next_loot_id);

        for loot_state in &session_state.loots {
            session.add_loot(loot_state.restore());
        }

        let mut tokens = Vec::with_capacity(session_state.players.len());
        for player_state in &session_state.players {
            let mut dog = Dog::new(
                player_state.dog.id.clone(),
                player_state.dog.name.clone(),
                player_state.dog.map_id.clone(),
            );
            dog.set_position(Position::new(
                player_state.dog.position.x,
                player_state.dog.position.y,
            ));
            dog.snapshot_previous_position();
            dog.set_speed(Speed::new(
                player_state.dog.speed.vx,
                player_state.dog.speed.vy,
            ));
            dog.set_direction(player_state.dog.direction);

            let mut player = Player::new(
                player_state.id,
                dog,
                player_state.token.clone(),
                player_state.bag_capacity,
            );
            player.add_score(player_state.score);
            for loot_state in &player_state.bag {
                player.add_to_bag(loot_state.restore());
            }

            max_player_id = Some(max_player_id.map_or(player_state.id, |m| m.max(player_state.id)));
            tokens.push(player_state.token.clone());
            session.add_player(player);
        }

        let session_idx = game
            .sessions()
            .iter()
            .position(|s| s.map_id() == session_state.map_id)
            .expect("session restored above");
        for token in tokens {
            game.register_token(token, session_idx);
        }
    }

    if let Some(max_id) = max_player_id {
        game.bump_next_player_id(max_id + 1);
    }
}

/// Write the state file atomically: serialize to `<path>.tmp`, then rename
/// over the target so readers never observe a torn file.
pub fn save_to_path(path: &Path, state: &StateFile) -> Result<(), SnapshotError> {
    let payload = serde_json::to_string(state)?;
    write_payload(path, &payload)
}

/// Atomic write of an already-rendered payload.
pub fn write_payload(path: &Path, payload: &str) -> Result<(), SnapshotError> {
    let mut tmp_path = path.as_os_str().to_owned();
    tmp_path.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_path);

    std::fs::write(&tmp_path, payload)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Read a state file, tolerating absence, emptiness and malformed content.
/// Anything unreadable yields `None` with a warning; the caller starts fresh.
pub fn load_from_path(path: &Path) -> Option<StateFile> {
    if !path.exists() {
        warn!(path = %path.display(), "State file does not exist, starting fresh");
        return None;
    }

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            warn!(path = %path.display(), %err, "Cannot read state file, starting fresh");
            return None;
        }
    };

    if content.trim().is_empty() {
        warn!(path = %path.display(), "State file is empty, starting fresh");
        return None;
    }

    match serde_json::from_str(&content) {
        Ok(state) => Some(state),
        Err(err) => {
            warn!(path = %path.display(), %err, "Malformed state file, starting fresh");
            None
        }
    }
}
