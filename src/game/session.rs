//! Live per-map state: players, their dogs, loose loot, and the tick update
//! that moves everything forward.

use std::collections::HashSet;
use std::time::Duration;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use super::collision::{self, Gatherer, Item, ItemGathererProvider};
use super::geom::{Direction, Position, Speed};
use super::loot::{Loot, LootGenerator};
use super::map::{Map, Office, DOG_WIDTH, OFFICE_WIDTH};

/// Speeds below this are treated as standing still for idle tracking.
const IDLE_EPSILON: f64 = 1e-10;

/// A player's avatar in the world.
#[derive(Debug, Clone, PartialEq)]
pub struct Dog {
    id: String,
    name: String,
    map_id: String,
    position: Position,
    previous_position: Position,
    speed: Speed,
    direction: Direction,
}

impl Dog {
    pub fn new(id: impl Into<String>, name: impl Into<String>, map_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            map_id: map_id.into(),
            position: Position::default(),
            previous_position: Position::default(),
            speed: Speed::ZERO,
            direction: Direction::North,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn map_id(&self) -> &str {
        &self.map_id
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    pub fn previous_position(&self) -> Position {
        self.previous_position
    }

    pub fn snapshot_previous_position(&mut self) {
        self.previous_position = self.position;
    }

    pub fn speed(&self) -> Speed {
        self.speed
    }

    pub fn set_speed(&mut self, speed: Speed) {
        self.speed = speed;
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    pub fn stop(&mut self) {
        self.speed = Speed::ZERO;
    }

    /// A dog counts as moving when either speed component is non-zero.
    pub fn is_moving(&self) -> bool {
        self.speed.is_nonzero()
    }
}

/// A joined player: one dog plus bag, score and timing state.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    id: u64,
    dog: Dog,
    token: String,
    bag: Vec<Loot>,
    bag_capacity: usize,
    score: i64,
    play_time: f64,
    idle_time: f64,
}

impl Player {
    pub fn new(id: u64, dog: Dog, token: String, bag_capacity: usize) -> Self {
        Self {
            id,
            dog,
            token,
            bag: Vec::new(),
            bag_capacity,
            score: 0,
            play_time: 0.0,
            idle_time: 0.0,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn dog(&self) -> &Dog {
        &self.dog
    }

    pub fn dog_mut(&mut self) -> &mut Dog {
        &mut self.dog
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn bag(&self) -> &[Loot] {
        &self.bag
    }

    pub fn bag_capacity(&self) -> usize {
        self.bag_capacity
    }

    pub fn is_bag_full(&self) -> bool {
        self.bag.len() >= self.bag_capacity
    }

    pub fn add_to_bag(&mut self, loot: Loot) {
        if self.bag.len() < self.bag_capacity {
            self.bag.push(loot);
        }
    }

    pub fn clear_bag(&mut self) {
        self.bag.clear();
    }

    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn add_score(&mut self, delta: i64) {
        self.score += delta;
    }

    pub fn play_time(&self) -> f64 {
        self.play_time
    }

    pub fn add_play_time(&mut self, dt: f64) {
        self.play_time += dt;
    }

    pub fn idle_time(&self) -> f64 {
        self.idle_time
    }

    pub fn add_idle_time(&mut self, dt: f64) {
        self.idle_time += dt;
    }

    pub fn reset_idle_time(&mut self) {
        self.idle_time = 0.0;
    }
}

/// Final record of a player leaving the world through retirement.
#[derive(Debug, Clone, PartialEq)]
pub struct RetiredPlayer {
    pub name: String,
    pub score: i64,
    pub play_time: f64,
    pub token: String,
}

/// Gatherers for both collision passes: the segment each dog swept this tick.
struct PlayerGatherers<'a>(&'a [Player]);

impl PlayerGatherers<'_> {
    fn gatherer(&self, idx: usize) -> Gatherer {
        let dog = self.0[idx].dog();
        Gatherer {
            start_pos: dog.previous_position(),
            end_pos: dog.position(),
            width: DOG_WIDTH,
        }
    }
}

/// Loot pickups: point items against dog gatherers.
struct LootProvider<'a> {
    loots: &'a [Loot],
    players: PlayerGatherers<'a>,
}

impl ItemGathererProvider for LootProvider<'_> {
    fn items_count(&self) -> usize {
        self.loots.len()
    }

    fn item(&self, idx: usize) -> Item {
        Item {
            position: self.loots[idx].position,
            width: 0.0,
        }
    }

    fn gatherers_count(&self) -> usize {
        self.players.0.len()
    }

    fn gatherer(&self, idx: usize) -> Gatherer {
        self.players.gatherer(idx)
    }
}

/// Drop-offs: offices against dog gatherers.
struct OfficeProvider<'a> {
    offices: &'a [Office],
    players: PlayerGatherers<'a>,
}

impl ItemGathererProvider for OfficeProvider<'_> {
    fn items_count(&self) -> usize {
        self.offices.len()
    }

    fn item(&self, idx: usize) -> Item {
        Item {
            position: self.offices[idx].position,
            width: OFFICE_WIDTH,
        }
    }

    fn gatherers_count(&self) -> usize {
        self.players.0.len()
    }

    fn gatherer(&self, idx: usize) -> Gatherer {
        self.players.gatherer(idx)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickEventKind {
    Loot,
    Office,
}

#[derive(Debug, Clone, Copy)]
struct TickEvent {
    time: f64,
    kind: TickEventKind,
    gatherer_id: usize,
    item_id: usize,
}

/// The live world of one map.
#[derive(Debug)]
pub struct GameSession {
    id: String,
    map_id: String,
    players: Vec<Player>,
    loots: Vec<Loot>,
    next_loot_id: u64,
    loot_generator: Option<LootGenerator>,
}

impl GameSession {
    pub fn new(id: impl Into<String>, map_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            map_id: map_id.into(),
            players: Vec::new(),
            loots: Vec::new(),
            next_loot_id: 0,
            loot_generator: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn map_id(&self) -> &str {
        &self.map_id
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn loots(&self) -> &[Loot] {
        &self.loots
    }

    pub fn next_loot_id(&self) -> u64 {
        self.next_loot_id
    }

    pub fn set_next_loot_id(&mut self, id: u64) {
        self.next_loot_id = id;
    }

    pub fn set_loot_generator(&mut self, generator: LootGenerator) {
        self.loot_generator = Some(generator);
    }

    pub fn add_player(&mut self, player: Player) {
        self.players.push(player);
    }

    pub fn add_loot(&mut self, loot: Loot) {
        self.next_loot_id = self.next_loot_id.max(loot.id + 1);
        self.loots.push(loot);
    }

    pub fn find_player_by_token(&self, token: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.token() == token)
    }

    pub fn find_player_by_token_mut(&mut self, token: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.token() == token)
    }

    /// One simulation step for this session.
    ///
    /// Order is load-bearing: time bookkeeping, loot spawn, previous-position
    /// snapshot, motion, collisions, retirement. Collision handling indexes
    /// players by gatherer id, which is only valid because retirement is the
    /// sole remover of players and runs last.
    pub fn update_state(
        &mut self,
        delta_time: f64,
        map: &Map,
        rng: &mut ChaCha8Rng,
        retirement_time: f64,
        retired: &mut Vec<RetiredPlayer>,
    ) {
        for player in &mut self.players {
            player.add_play_time(delta_time);

            let speed = player.dog().speed();
            let is_idle = speed.vx.abs() < IDLE_EPSILON && speed.vy.abs() < IDLE_EPSILON;
            if is_idle {
                player.add_idle_time(delta_time);
            } else {
                player.reset_idle_time();
            }
        }

        self.spawn_loot(delta_time, map, rng);

        for player in &mut self.players {
            player.dog_mut().snapshot_previous_position();
        }

        for player in &mut self.players {
            let dog = player.dog_mut();
            if dog.is_moving() {
                let result = map.move_dog(dog.position(), dog.speed(), delta_time);
                dog.set_position(result.position);
                if result.hit_boundary {
                    dog.stop();
                }
            }
        }

        self.handle_collisions(map);

        self.retire_inactive_players(retirement_time, retired);
    }

    fn spawn_loot(&mut self, delta_time: f64, map: &Map, rng: &mut ChaCha8Rng) {
        let Some(generator) = self.loot_generator.as_mut() else {
            return;
        };
        if map.loot_types().is_empty() {
            return;
        }

        let new_count = generator.generate(
            Duration::from_secs_f64(delta_time),
            self.loots.len(),
            self.players.len(),
        );

        for _ in 0..new_count {
            let type_index = rng.gen_range(0..map.loot_types().len());
            let position = map.random_position(rng);
            let loot = Loot {
                id: self.next_loot_id,
                type_index,
                position,
                value: map.loot_value(type_index),
            };
            self.next_loot_id += 1;
            self.loots.push(loot);
        }
    }

    /// Merge loot and office events into one timeline and apply them.
    fn handle_collisions(&mut self, map: &Map) {
        let loot_events = collision::find_gather_events(&LootProvider {
            loots: &self.loots,
            players: PlayerGatherers(&self.players),
        });
        let office_events = collision::find_gather_events(&OfficeProvider {
            offices: map.offices(),
            players: PlayerGatherers(&self.players),
        });

        let mut all_events: Vec<TickEvent> = Vec::with_capacity(loot_events.len() + office_events.len());
        all_events.extend(loot_events.iter().map(|e| TickEvent {
            time: e.time,
            kind: TickEventKind::Loot,
            gatherer_id: e.gatherer_id,
            item_id: e.item_id,
        }));
        all_events.extend(office_events.iter().map(|e| TickEvent {
            time: e.time,
            kind: TickEventKind::Office,
            gatherer_id: e.gatherer_id,
            item_id: e.item_id,
        }));
        all_events.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap_or(std::cmp::Ordering::Equal));

        let mut collected: HashSet<u64> = HashSet::new();

        for event in all_events {
            if event.gatherer_id >= self.players.len() {
                continue;
            }

            match event.kind {
                TickEventKind::Loot => {
                    if event.item_id >= self.loots.len() {
                        continue;
                    }
                    let loot = self.loots[event.item_id].clone();
                    if collected.contains(&loot.id) {
                        continue;
                    }
                    let player = &mut self.players[event.gatherer_id];
                    if !player.is_bag_full() {
                        collected.insert(loot.id);
                        player.add_to_bag(loot);
                    }
                }
                TickEventKind::Office => {
                    let player = &mut self.players[event.gatherer_id];
                    let total: i64 = player.bag().iter().map(|loot| loot.value).sum();
                    player.add_score(total);
                    player.clear_bag();
                }
            }
        }

        self.loots.retain(|loot| !collected.contains(&loot.id));
    }

    fn retire_inactive_players(&mut self, retirement_time: f64, retired: &mut Vec<RetiredPlayer>) {
        if !self.players.iter().any(|p| p.idle_time() >= retirement_time) {
            return;
        }

        let mut active = Vec::with_capacity(self.players.len());
        for player in self.players.drain(..) {
            if player.idle_time() >= retirement_time {
                info!(
                    map_id = %self.map_id,
                    player_id = player.id(),
                    name = %player.dog().name(),
                    score = player.score(),
                    "Player retired after inactivity"
                );
                retired.push(RetiredPlayer {
                    name: player.dog().name().to_string(),
                    score: player.score(),
                    play_time: player.play_time(),
                    token: player.token().to_string(),
                });
            } else {
                active.push(player);
            }
        }
        self.players = active;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::geom::Offset;
    use crate::game::map::Road;
    use rand::SeedableRng;
    use std::time::Duration;

    fn straight_map() -> Map {
        let mut map = Map::new("m1", "Straight");
        map.add_road(Road::horizontal(Position::new(0.0, 0.0), 20.0));
        map.set_dog_speed(4.0);
        map.set_loot_types(vec![serde_json::json!({"name": "key", "value": 10})]);
        map
    }

    fn join(session: &mut GameSession, id: u64, at: Position) -> String {
        let token = format!("{id:032x}");
        let mut dog = Dog::new(format!("dog_{id}"), format!("player{id}"), "m1");
        dog.set_position(at);
        dog.snapshot_previous_position();
        session.add_player(Player::new(id, dog, token.clone(), 3));
        token
    }

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    #[test]
    fn play_time_and_idle_time_accrue() {
        let map = straight_map();
        let mut session = GameSession::new("m1_session", "m1");
        join(&mut session, 0, Position::new(0.0, 0.0));

        let mut retired = Vec::new();
        session.update_state(1.5, &map, &mut rng(), 60.0, &mut retired);
        let player = &session.players()[0];
        assert_eq!(player.play_time(), 1.5);
        assert_eq!(player.idle_time(), 1.5);

        session.players[0].dog_mut().set_speed(Speed::new(4.0, 0.0));
        session.update_state(0.5, &map, &mut rng(), 60.0, &mut retired);
        let player = &session.players()[0];
        assert_eq!(player.play_time(), 2.0);
        assert_eq!(player.idle_time(), 0.0);
    }

    #[test]
    fn boundary_hit_stops_the_dog() {
        let map = straight_map();
        let mut session = GameSession::new("m1_session", "m1");
        join(&mut session, 0, Position::new(19.0, 0.0));
        session.players[0].dog_mut().set_speed(Speed::new(10.0, 0.0));

        let mut retired = Vec::new();
        session.update_state(1.0, &map, &mut rng(), 60.0, &mut retired);

        let dog = session.players()[0].dog();
        assert_eq!(dog.position(), Position::new(20.4, 0.0));
        assert_eq!(dog.speed(), Speed::ZERO);
    }

    #[test]
    fn pickup_collects_loot_into_bag() {
        let map = straight_map();
        let mut session = GameSession::new("m1_session", "m1");
        join(&mut session, 0, Position::new(0.0, 0.0));
        session.add_loot(Loot {
            id: 0,
            type_index: 0,
            position: Position::new(2.0, 0.0),
            value: 10,
        });
        session.players[0].dog_mut().set_speed(Speed::new(4.0, 0.0));

        let mut retired = Vec::new();
        session.update_state(1.0, &map, &mut rng(), 60.0, &mut retired);

        let player = &session.players()[0];
        assert_eq!(player.bag().len(), 1);
        assert_eq!(player.bag()[0].id, 0);
        assert!(session.loots().is_empty());
    }

    #[test]
    fn full_bag_leaves_loot_on_the_ground() {
        let map = straight_map();
        let mut session = GameSession::new("m1_session", "m1");
        join(&mut session, 0, Position::new(0.0, 0.0));
        for id in 0..4 {
            session.add_loot(Loot {
                id,
                type_index: 0,
                position: Position::new(1.0 + id as f64, 0.0),
                value: 10,
            });
        }
        session.players[0].dog_mut().set_speed(Speed::new(10.0, 0.0));

        let mut retired = Vec::new();
        session.update_state(1.0, &map, &mut rng(), 60.0, &mut retired);

        let player = &session.players()[0];
        assert_eq!(player.bag().len(), 3);
        assert_eq!(session.loots().len(), 1);
        assert_eq!(session.loots()[0].id, 3);
    }

    #[test]
    fn pickup_then_deliver_in_one_tick() {
        let mut map = straight_map();
        map.add_office(Office {
            id: "o1".into(),
            position: Position::new(3.0, 0.0),
            offset: Offset::default(),
        })
        .unwrap();

        let mut session = GameSession::new("m1_session", "m1");
        join(&mut session, 0, Position::new(0.0, 0.0));
        session.add_loot(Loot {
            id: 0,
            type_index: 0,
            position: Position::new(1.0, 0.0),
            value: 10,
        });
        session.players[0].dog_mut().set_speed(Speed::new(4.0, 0.0));

        let mut retired = Vec::new();
        session.update_state(1.0, &map, &mut rng(), 60.0, &mut retired);

        let player = &session.players()[0];
        assert!(player.bag().is_empty());
        assert_eq!(player.score(), 10);
        assert!(session.loots().is_empty());
    }

    #[test]
    fn office_before_loot_banks_nothing_for_that_loot() {
        let mut map = straight_map();
        map.add_office(Office {
            id: "o1".into(),
            position: Position::new(1.0, 0.0),
            offset: Offset::default(),
        })
        .unwrap();

        let mut session = GameSession::new("m1_session", "m1");
        join(&mut session, 0, Position::new(0.0, 0.0));
        session.add_loot(Loot {
            id: 0,
            type_index: 0,
            position: Position::new(3.0, 0.0),
            value: 10,
        });
        session.players[0].dog_mut().set_speed(Speed::new(4.0, 0.0));

        let mut retired = Vec::new();
        session.update_state(1.0, &map, &mut rng(), 60.0, &mut retired);

        // Passed the office first, then grabbed the loot: it stays bagged.
        let player = &session.players()[0];
        assert_eq!(player.score(), 0);
        assert_eq!(player.bag().len(), 1);
    }

    #[test]
    fn spawned_loot_ids_are_strictly_monotonic() {
        let map = straight_map();
        let mut session = GameSession::new("m1_session", "m1");
        session.set_loot_generator(LootGenerator::with_random(
            Duration::from_millis(1000),
            0.9,
            || 1.0,
        ));
        for id in 0..4 {
            join(&mut session, id, Position::new(0.0, 0.0));
        }

        let mut retired = Vec::new();
        for _ in 0..5 {
            session.update_state(1.0, &map, &mut rng(), 600.0, &mut retired);
        }

        let mut seen = HashSet::new();
        let mut last = None;
        for loot in session.loots() {
            assert!(seen.insert(loot.id), "duplicate loot id {}", loot.id);
            if let Some(prev) = last {
                assert!(loot.id > prev);
            }
            last = Some(loot.id);
            assert!(map.is_on_road(loot.position));
        }
        assert!(!session.loots().is_empty());
    }

    #[test]
    fn idle_player_retires_with_final_score() {
        let map = straight_map();
        let mut session = GameSession::new("m1_session", "m1");
        join(&mut session, 0, Position::new(0.0, 0.0));
        session.players[0].add_score(42);

        let mut retired = Vec::new();
        for _ in 0..3 {
            session.update_state(10.0, &map, &mut rng(), 30.0, &mut retired);
        }

        assert!(session.players().is_empty());
        assert_eq!(retired.len(), 1);
        assert_eq!(retired[0].name, "player0");
        assert_eq!(retired[0].score, 42);
        assert_eq!(retired[0].play_time, 30.0);
    }

    #[test]
    fn moving_player_does_not_retire() {
        let map = straight_map();
        let mut session = GameSession::new("m1_session", "m1");
        join(&mut session, 0, Position::new(0.0, 0.0));
        session.players[0].dog_mut().set_speed(Speed::new(0.1, 0.0));

        let mut retired = Vec::new();
        session.update_state(100.0, &map, &mut rng(), 30.0, &mut retired);

        assert_eq!(session.players().len(), 1);
        assert!(retired.is_empty());
    }

    #[test]
    fn positions_stay_on_the_road_union() {
        let mut map = Map::new("cross", "Cross");
        map.add_road(Road::horizontal(Position::new(0.0, 0.0), 10.0));
        map.add_road(Road::vertical(Position::new(5.0, -5.0), 5.0));
        map.set_dog_speed(3.0);

        let mut session = GameSession::new("cross_session", "cross");
        join(&mut session, 0, Position::new(0.0, 0.0));

        let mut rng = rng();
        let mut retired = Vec::new();
        let speeds = [
            Speed::new(3.0, 0.0),
            Speed::new(0.0, 3.0),
            Speed::new(-3.0, 0.0),
            Speed::new(0.0, -3.0),
        ];
        for step in 0..40 {
            let speed = speeds[step % speeds.len()];
            session.players[0].dog_mut().set_speed(speed);
            session.update_state(0.7, &map, &mut rng, 600.0, &mut retired);
            let pos = session.players()[0].dog().position();
            assert!(map.is_on_road(pos), "dog left the roads at {pos:?}");
        }
    }
}
