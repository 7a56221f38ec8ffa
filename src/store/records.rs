//! Durable leaderboard of retired players, backed by Postgres.

use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::info;

use crate::game::RetiredPlayer;

/// One leaderboard row as served by the records endpoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlayerRecord {
    pub name: String,
    pub score: i64,
    /// Play time in seconds.
    #[serde(rename = "playTime")]
    pub play_time: f64,
}

/// Record store operations. The single-connection pool serializes all
/// database access internally.
#[derive(Clone)]
pub struct RecordStore {
    pool: PgPool,
}

impl RecordStore {
    /// Connect and make sure the schema exists. A failure here is a startup
    /// error; the process exits non-zero.
    pub async fn connect(db_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(db_url)
            .await?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS retired_players (
                id           BIGSERIAL PRIMARY KEY,
                name         TEXT NOT NULL,
                score        INTEGER NOT NULL,
                play_time_ms BIGINT NOT NULL,
                created_at   TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS retired_players_score_idx
                ON retired_players (score DESC, play_time_ms ASC, name ASC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert one retirement record. Play time is stored in milliseconds.
    pub async fn add_record(&self, record: &RetiredPlayer) -> Result<(), sqlx::Error> {
        let play_time_ms = seconds_to_millis(record.play_time);

        sqlx::query("INSERT INTO retired_players (name, score, play_time_ms) VALUES ($1, $2, $3)")
            .bind(&record.name)
            .bind(record.score as i32)
            .bind(play_time_ms)
            .execute(&self.pool)
            .await?;

        info!(
            name = %record.name,
            score = record.score,
            play_time = record.play_time,
            "Retirement record saved"
        );
        Ok(())
    }

    /// A page of the leaderboard, best first: score descending, then play
    /// time ascending, then name.
    pub async fn get_records(
        &self,
        start: u64,
        max_items: u64,
    ) -> Result<Vec<PlayerRecord>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT name, score, play_time_ms FROM retired_players
            ORDER BY score DESC, play_time_ms ASC, name ASC
            OFFSET $1 LIMIT $2
            "#,
        )
        .bind(start as i64)
        .bind(max_items as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(PlayerRecord {
                    name: row.try_get("name")?,
                    score: i64::from(row.try_get::<i32, _>("score")?),
                    play_time: millis_to_seconds(row.try_get::<i64, _>("play_time_ms")?),
                })
            })
            .collect()
    }
}

fn seconds_to_millis(seconds: f64) -> i64 {
    (seconds * 1000.0) as i64
}

fn millis_to_seconds(millis: i64) -> f64 {
    millis as f64 / 1000.0
}
