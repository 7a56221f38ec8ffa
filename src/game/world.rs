//! The authoritative game: all maps, all live sessions, and the per-tick
//! update that drives them.

use std::collections::HashMap;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::sync::mpsc;
use tracing::warn;

use super::loot::{LootGenerator, LootGeneratorConfig};
use super::map::Map;
use super::session::{Dog, GameSession, Player, RetiredPlayer};

/// Default inactivity window before a player is retired, in seconds.
pub const DEFAULT_RETIREMENT_TIME: f64 = 60.0;

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("map with id {0} already exists")]
    DuplicateMap(String),

    #[error("map not found: {0}")]
    MapNotFound(String),
}

/// Authoritative world state. All access goes through the API strand; the
/// struct itself is single-threaded.
pub struct Game {
    maps: Vec<Map>,
    map_id_to_index: HashMap<String, usize>,
    sessions: Vec<GameSession>,
    /// Token -> session index; the player is resolved inside that session.
    token_to_session: HashMap<String, usize>,
    loot_generator_config: Option<LootGeneratorConfig>,
    dog_retirement_time: f64,
    next_player_id: u64,
    rng: ChaCha8Rng,
    retired_tx: Option<mpsc::UnboundedSender<RetiredPlayer>>,
}

impl Game {
    pub fn new() -> Self {
        Self {
            maps: Vec::new(),
            map_id_to_index: HashMap::new(),
            sessions: Vec::new(),
            token_to_session: HashMap::new(),
            loot_generator_config: None,
            dog_retirement_time: DEFAULT_RETIREMENT_TIME,
            next_player_id: 0,
            rng: ChaCha8Rng::from_entropy(),
            retired_tx: None,
        }
    }

    /// Deterministic RNG for tests.
    pub fn with_seed(seed: u64) -> Self {
        let mut game = Self::new();
        game.rng = ChaCha8Rng::seed_from_u64(seed);
        game
    }

    pub fn maps(&self) -> &[Map] {
        &self.maps
    }

    pub fn sessions(&self) -> &[GameSession] {
        &self.sessions
    }

    pub fn add_map(&mut self, map: Map) -> Result<(), GameError> {
        if self.map_id_to_index.contains_key(map.id()) {
            return Err(GameError::DuplicateMap(map.id().to_string()));
        }
        self.map_id_to_index.insert(map.id().to_string(), self.maps.len());
        self.maps.push(map);
        Ok(())
    }

    pub fn find_map(&self, id: &str) -> Option<&Map> {
        self.map_id_to_index.get(id).map(|&idx| &self.maps[idx])
    }

    pub fn set_loot_generator_config(&mut self, config: LootGeneratorConfig) {
        self.loot_generator_config = Some(config);
    }

    pub fn dog_retirement_time(&self) -> f64 {
        self.dog_retirement_time
    }

    pub fn set_dog_retirement_time(&mut self, seconds: f64) {
        self.dog_retirement_time = seconds;
    }

    /// Where retirement records are delivered; the consumer persists them
    /// off the strand.
    pub fn set_retired_sink(&mut self, tx: mpsc::UnboundedSender<RetiredPlayer>) {
        self.retired_tx = Some(tx);
    }

    pub fn find_session_by_map_id(&self, map_id: &str) -> Option<&GameSession> {
        self.sessions.iter().find(|s| s.map_id() == map_id)
    }

    /// Session for a map, created lazily on first use. Sessions are never
    /// removed; retirement empties them instead.
    pub fn get_or_create_session(&mut self, map_id: &str) -> Result<&mut GameSession, GameError> {
        if !self.map_id_to_index.contains_key(map_id) {
            return Err(GameError::MapNotFound(map_id.to_string()));
        }

        if let Some(idx) = self.sessions.iter().position(|s| s.map_id() == map_id) {
            return Ok(&mut self.sessions[idx]);
        }

        let mut session = GameSession::new(format!("{map_id}_session"), map_id);
        if let Some(config) = self.loot_generator_config {
            session.set_loot_generator(LootGenerator::from_config(config));
        }
        self.sessions.push(session);
        Ok(self.sessions.last_mut().expect("session just pushed"))
    }

    /// Create a player on a map and register their token.
    ///
    /// Returns the new player id. The spawn point is the first road's start
    /// unless `randomize_spawn` asks for a random point on the road union.
    pub fn join(
        &mut self,
        user_name: &str,
        map_id: &str,
        token: String,
        randomize_spawn: bool,
    ) -> Result<u64, GameError> {
        let map_index = *self
            .map_id_to_index
            .get(map_id)
            .ok_or_else(|| GameError::MapNotFound(map_id.to_string()))?;

        let spawn = if randomize_spawn {
            self.maps[map_index].random_position(&mut self.rng)
        } else {
            self.maps[map_index].start_position()
        };
        let bag_capacity = self.maps[map_index].bag_capacity();

        let mut dog = Dog::new(format!("{user_name}_{map_id}"), user_name, map_id);
        dog.set_position(spawn);
        dog.snapshot_previous_position();

        let player_id = self.next_player_id;
        self.next_player_id += 1;

        let session = self.get_or_create_session(map_id)?;
        session.add_player(Player::new(player_id, dog, token.clone(), bag_capacity));

        let session_idx = self
            .sessions
            .iter()
            .position(|s| s.map_id() == map_id)
            .expect("session exists after join");
        self.token_to_session.insert(token, session_idx);

        Ok(player_id)
    }

    /// Register a token restored from a snapshot.
    pub fn register_token(&mut self, token: String, session_idx: usize) {
        self.token_to_session.insert(token, session_idx);
    }

    /// Keep the monotonic player-id sequence ahead of restored ids.
    pub fn bump_next_player_id(&mut self, floor: u64) {
        self.next_player_id = self.next_player_id.max(floor);
    }

    pub fn find_player_by_token(&self, token: &str) -> Option<&Player> {
        let idx = *self.token_to_session.get(token)?;
        self.sessions.get(idx)?.find_player_by_token(token)
    }

    pub fn find_player_by_token_mut(&mut self, token: &str) -> Option<&mut Player> {
        let idx = *self.token_to_session.get(token)?;
        self.sessions.get_mut(idx)?.find_player_by_token_mut(token)
    }

    /// Session of the player holding `token`.
    pub fn find_session_by_token(&self, token: &str) -> Option<&GameSession> {
        let idx = *self.token_to_session.get(token)?;
        self.sessions.get(idx)
    }

    pub fn player_count(&self) -> usize {
        self.sessions.iter().map(|s| s.players().len()).sum()
    }

    /// Advance every session by `delta_time` seconds and dispatch retirement
    /// records to the sink.
    pub fn update_state(&mut self, delta_time: f64) {
        let mut retired = Vec::new();

        let maps = &self.maps;
        let map_index = &self.map_id_to_index;
        for session in &mut self.sessions {
            let Some(&idx) = map_index.get(session.map_id()) else {
                continue;
            };
            session.update_state(
                delta_time,
                &maps[idx],
                &mut self.rng,
                self.dog_retirement_time,
                &mut retired,
            );
        }

        for record in retired {
            self.token_to_session.remove(&record.token);
            if let Some(tx) = &self.retired_tx {
                if tx.send(record).is_err() {
                    warn!("Retirement sink is closed, dropping record");
                }
            }
        }
    }

}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}
