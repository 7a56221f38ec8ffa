//! Loot items and the probabilistic spawner that keeps the map stocked.

use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::geom::Position;

/// A lost object lying on the map (or carried in a bag).
#[derive(Debug, Clone, PartialEq)]
pub struct Loot {
    /// Session-scoped monotonic id.
    pub id: u64,
    /// Index into the map's loot-type table.
    pub type_index: usize,
    pub position: Position,
    /// Score awarded when the loot is banked at an office.
    pub value: i64,
}

/// Immutable spawner settings carried by the game and cloned into each
/// session when it is created.
#[derive(Debug, Clone, Copy)]
pub struct LootGeneratorConfig {
    pub base_interval: Duration,
    pub probability: f64,
}

/// Decides how many new loot items appear during a tick.
///
/// The generator accumulates the time since it last produced anything; the
/// longer the drought, the closer the effective spawn probability creeps to
/// 1. Production never exceeds the current shortage (looters minus live
/// loot), so the total loot count stays bounded by the looter count.
pub struct LootGenerator {
    base_interval: Duration,
    probability: f64,
    time_without_loot: Duration,
    random: Box<dyn FnMut() -> f64 + Send>,
}

impl LootGenerator {
    /// Spawner with an entropy-seeded random source.
    pub fn new(base_interval: Duration, probability: f64) -> Self {
        let mut rng = ChaCha8Rng::from_entropy();
        Self::with_random(base_interval, probability, move || rng.gen_range(0.0..=1.0))
    }

    pub fn from_config(config: LootGeneratorConfig) -> Self {
        Self::new(config.base_interval, config.probability)
    }

    /// Spawner with an injected random source; used by tests for
    /// deterministic behavior.
    pub fn with_random(
        base_interval: Duration,
        probability: f64,
        random: impl FnMut() -> f64 + Send + 'static,
    ) -> Self {
        Self {
            base_interval,
            probability,
            time_without_loot: Duration::ZERO,
            random: Box::new(random),
        }
    }

    /// Number of loot items to spawn for a tick of `delta`.
    ///
    /// The drought accumulator advances before the shortage check, so calls
    /// without a shortage still build up pressure. It resets only when loot
    /// was actually produced.
    pub fn generate(&mut self, delta: Duration, loot_count: usize, looter_count: usize) -> usize {
        self.time_without_loot += delta;

        let shortage = looter_count.saturating_sub(loot_count);
        if shortage == 0 {
            return 0;
        }

        // The exponent saturates the probability toward 1 on its own; only
        // the product with the random draw needs clamping.
        let ratio = self.time_without_loot.as_secs_f64() / self.base_interval.as_secs_f64();
        let probability =
            ((1.0 - (1.0 - self.probability).powf(ratio)) * (self.random)()).clamp(0.0, 1.0);
        let generated = (shortage as f64 * probability).round() as usize;

        if generated > 0 {
            self.time_without_loot = Duration::ZERO;
        }
        generated
    }
}

impl std::fmt::Debug for LootGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LootGenerator")
            .field("base_interval", &self.base_interval)
            .field("probability", &self.probability)
            .field("time_without_loot", &self.time_without_loot)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn zero_delta_generates_nothing() {
        let mut gen = LootGenerator::with_random(ms(1000), 0.5, || 1.0);
        assert_eq!(gen.generate(ms(0), 0, 10), 0);
    }

    #[test]
    fn no_looters_generates_nothing() {
        let mut gen = LootGenerator::with_random(ms(1000), 0.5, || 1.0);
        assert_eq!(gen.generate(ms(1000), 0, 0), 0);
        assert_eq!(gen.generate(ms(5000), 5, 0), 0);
    }

    #[test]
    fn no_shortage_generates_nothing() {
        let mut gen = LootGenerator::with_random(ms(1000), 0.5, || 1.0);
        assert_eq!(gen.generate(ms(1000), 10, 5), 0);
    }

    #[test]
    fn exact_probability_with_fixed_random() {
        let mut gen = LootGenerator::with_random(ms(1000), 0.5, || 0.5);
        // ratio 1 -> effective p 0.5, draw 0.5 -> round(10 * 0.25) = 3
        assert_eq!(gen.generate(ms(1000), 0, 10), 3);
    }

    #[test]
    fn partial_interval_ratio() {
        let mut gen = LootGenerator::with_random(ms(2000), 0.8, || 0.6);
        // ratio 0.75 -> 1 - 0.2^0.75 ~= 0.7012, * 0.6 ~= 0.4207 -> round(5 * 0.4207) = 2
        assert_eq!(gen.generate(ms(1500), 5, 10), 2);
    }

    #[test]
    fn one_base_interval_at_full_draw() {
        let mut gen = LootGenerator::with_random(ms(1000), 0.8, || 1.0);
        // ratio 1 -> effective p 0.8 -> round(10 * 0.8) = 8
        assert_eq!(gen.generate(ms(1000), 0, 10), 8);
    }

    #[test]
    fn zero_draw_generates_nothing() {
        let mut gen = LootGenerator::with_random(ms(1000), 0.5, || 0.0);
        assert_eq!(gen.generate(ms(1000), 0, 10), 0);
        assert_eq!(gen.generate(ms(5000), 5, 10), 0);
    }

    #[test]
    fn long_drought_saturates_to_full_shortage() {
        let mut gen = LootGenerator::with_random(ms(1000), 0.8, || 1.0);
        assert_eq!(gen.generate(ms(10_000), 0, 10), 10);
    }

    #[test]
    fn accumulator_resets_after_production() {
        let mut gen = LootGenerator::with_random(ms(1000), 0.5, || 1.0);
        let first = gen.generate(ms(1000), 0, 10);
        assert!(first > 0);
        // Fresh accumulator: a short tick right after barely spawns.
        assert_eq!(gen.generate(ms(100), first, 10), 0);
    }

    #[test]
    fn cumulative_production_never_exceeds_looters() {
        let mut gen = LootGenerator::with_random(ms(1000), 0.8, || 1.0);
        let looters = 5;
        let mut total = 0;
        for _ in 0..10 {
            total += gen.generate(ms(1000), total, looters);
            assert!(total <= looters);
        }
    }

    #[test]
    fn saturated_drought_fills_shortage_exactly() {
        let mut gen = LootGenerator::with_random(ms(1000), 0.9, || 1.0);
        assert_eq!(gen.generate(ms(10_000), 0, 3), 3);
    }
}
