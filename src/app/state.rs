//! Application state shared across routes

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::config::Config;
use crate::game::snapshot::{self, SnapshotError};
use crate::game::world::Game;
use crate::store::RecordStore;
use crate::util::token::TokenGenerator;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// The strand: every simulation mutation and read goes through this
    /// lock, so the game itself is effectively single-threaded.
    pub world: Arc<Mutex<World>>,
    pub records: RecordStore,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Config, world: World, records: RecordStore) -> Self {
        Self {
            config: Arc::new(config),
            world: Arc::new(Mutex::new(world)),
            records,
            started_at: Instant::now(),
        }
    }
}

/// Everything the strand guards: the game, the token source, and the
/// auto-save accumulator.
pub struct World {
    pub game: Game,
    pub tokens: TokenGenerator,
    persistence: Option<Persistence>,
}

struct Persistence {
    state_file: PathBuf,
    save_period: Option<Duration>,
    since_last_save: Duration,
}

/// A snapshot rendered under the lock, to be written after it is released.
pub struct PendingSnapshot {
    path: PathBuf,
    payload: String,
}

impl PendingSnapshot {
    pub fn write(&self) -> Result<(), SnapshotError> {
        snapshot::write_payload(&self.path, &self.payload)
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl World {
    pub fn new(game: Game, config: &Config) -> Self {
        let persistence = config.state_file.as_ref().map(|path| Persistence {
            state_file: path.clone(),
            save_period: (config.save_state_period > 0)
                .then(|| Duration::from_millis(config.save_state_period)),
            since_last_save: Duration::ZERO,
        });

        Self {
            game,
            tokens: TokenGenerator::new(),
            persistence,
        }
    }

    /// Advance the simulation by `delta` and report a snapshot when the
    /// auto-save period has elapsed. Both the tick driver and the manual
    /// tick endpoint come through here.
    pub fn advance(&mut self, delta: Duration) -> Option<PendingSnapshot> {
        self.game.update_state(delta.as_secs_f64());

        let save_due = {
            let persistence = self.persistence.as_mut()?;
            let period = persistence.save_period?;
            persistence.since_last_save += delta;
            if persistence.since_last_save < period {
                false
            } else {
                persistence.since_last_save = Duration::ZERO;
                true
            }
        };

        save_due.then(|| self.render_snapshot()).flatten()
    }

    /// Render the current state for persistence, if a state file is
    /// configured. Used by auto-save and the final shutdown save.
    pub fn render_snapshot(&self) -> Option<PendingSnapshot> {
        let persistence = self.persistence.as_ref()?;
        let state = snapshot::capture(&self.game);
        match serde_json::to_string(&state) {
            Ok(payload) => Some(PendingSnapshot {
                path: persistence.state_file.clone(),
                payload,
            }),
            Err(err) => {
                tracing::error!(%err, "Failed to encode state snapshot");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::geom::Position;
    use crate::game::map::{Map, Road};

    fn config_with_save(period_ms: u64) -> Config {
        Config {
            server_addr: "127.0.0.1:8080".parse().unwrap(),
            log_level: "info".into(),
            db_url: "postgres://unused".into(),
            config_file: "config.json".into(),
            tick_period: 0,
            www_root: "static".into(),
            randomize_spawn_points: false,
            state_file: Some(std::env::temp_dir().join("dogpark-world-test.json")),
            save_state_period: period_ms,
        }
    }

    fn game() -> Game {
        let mut game = Game::with_seed(1);
        let mut map = Map::new("m", "M");
        map.add_road(Road::horizontal(Position::new(0.0, 0.0), 5.0));
        game.add_map(map).unwrap();
        game
    }

    #[test]
    fn advance_reports_snapshot_when_save_period_elapses() {
        let mut world = World::new(game(), &config_with_save(1000));

        assert!(world.advance(Duration::from_millis(400)).is_none());
        assert!(world.advance(Duration::from_millis(400)).is_none());
        let due = world.advance(Duration::from_millis(400));
        assert!(due.is_some());
        // Accumulator reset: the next short tick is not due again.
        assert!(world.advance(Duration::from_millis(400)).is_none());
    }

    #[test]
    fn zero_save_period_never_auto_saves_but_final_save_works() {
        let mut world = World::new(game(), &config_with_save(0));
        assert!(world.advance(Duration::from_secs(100)).is_none());
        assert!(world.render_snapshot().is_some());
    }

    #[test]
    fn no_state_file_disables_persistence() {
        let mut config = config_with_save(1000);
        config.state_file = None;
        let mut world = World::new(game(), &config);
        assert!(world.advance(Duration::from_secs(10)).is_none());
        assert!(world.render_snapshot().is_none());
    }
}
