//! Background tick driver: advances the simulation on a fixed cadence with
//! real measured deltas, and writes due auto-save snapshots.

use std::time::{Duration, Instant};

use tracing::{debug, error, info};

use super::state::AppState;

/// Run the tick loop until the task is aborted at shutdown.
///
/// Each wake measures the real elapsed time since the previous tick, so the
/// simulation stays honest even when the interval slips. Snapshot writes
/// happen after the strand lock is released.
pub async fn run(state: AppState, tick_period: Duration) {
    info!(period_ms = tick_period.as_millis() as u64, "Tick driver started");

    let mut interval = tokio::time::interval(tick_period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    // The first interval tick fires immediately; consume it so the first
    // measured delta spans a real period.
    interval.tick().await;
    let mut last_tick = Instant::now();

    loop {
        interval.tick().await;

        let now = Instant::now();
        let delta = now - last_tick;
        last_tick = now;

        let pending = {
            let mut world = state.world.lock().await;
            world.advance(delta)
        };

        if let Some(snapshot) = pending {
            match snapshot.write() {
                Ok(()) => debug!(path = %snapshot.path().display(), "Auto-saved game state"),
                Err(err) => {
                    error!(%err, path = %snapshot.path().display(), "Failed to auto-save game state")
                }
            }
        }
    }
}
