//! SQLite storage layer: append-only rank history plus a refreshable
//! summoner-identity cache, behind a bounded connection pool.

use std::str::FromStr;
use std::time::Duration;

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use tracing::{debug, info};

use crate::error::AppError;

mod migrations;
mod models;

pub use models::{CachedSummoner, RankSample};

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) and migrate the database. The schema is in
    /// place before the pool is handed to any caller.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, AppError> {
        info!("🗄️ Opening database {url}");

        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        migrations::run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("🗄️ Database connections closed");
    }

    // === Rank samples ===

    /// Append a rank sample unless it matches the latest stored sample for
    /// the queue (tier, division and lp all identical). Returns whether a
    /// row was inserted.
    pub async fn store_rank_sample(
        &self,
        match_id: Option<&str>,
        queue_type: &str,
        tier: &str,
        division: &str,
        lp: i32,
    ) -> Result<bool, AppError> {
        if let Some(current) = self.latest_rank(queue_type).await? {
            if current.tier == tier && current.division == division && current.lp == lp {
                debug!(queue_type, "no rank change detected");
                return Ok(false);
            }
        }

        sqlx::query(
            "INSERT INTO rank_samples (match_id, queue_type, tier, division, lp)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(match_id)
        .bind(queue_type)
        .bind(tier)
        .bind(division)
        .bind(lp)
        .execute(&self.pool)
        .await?;

        info!(queue_type, tier, division, lp, "stored new rank sample");
        Ok(true)
    }

    /// Most recent sample for a queue type, ties broken by insertion order.
    pub async fn latest_rank(&self, queue_type: &str) -> Result<Option<RankSample>, AppError> {
        let sample = sqlx::query_as::<_, RankSample>(
            "SELECT id, match_id, queue_type, tier, division, lp, timestamp
             FROM rank_samples
             WHERE queue_type = ?
             ORDER BY timestamp DESC, id DESC
             LIMIT 1",
        )
        .bind(queue_type)
        .fetch_optional(&self.pool)
        .await?;
        Ok(sample)
    }

    /// Samples in the trailing `days` window, ascending by timestamp.
    pub async fn rank_history(
        &self,
        queue_type: Option<&str>,
        days: i64,
    ) -> Result<Vec<RankSample>, AppError> {
        let window_secs = days * 86_400;

        let samples = match queue_type {
            Some(queue) => {
                sqlx::query_as::<_, RankSample>(
                    "SELECT id, match_id, queue_type, tier, division, lp, timestamp
                     FROM rank_samples
                     WHERE queue_type = ? AND timestamp >= unixepoch() - ?
                     ORDER BY timestamp ASC, id ASC",
                )
                .bind(queue)
                .bind(window_secs)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, RankSample>(
                    "SELECT id, match_id, queue_type, tier, division, lp, timestamp
                     FROM rank_samples
                     WHERE timestamp >= unixepoch() - ?
                     ORDER BY timestamp ASC, id ASC",
                )
                .bind(window_secs)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(samples)
    }

    // === Summoner identity cache ===

    /// Insert-or-replace keyed by puuid.
    pub async fn upsert_summoner(
        &self,
        puuid: &str,
        summoner_id: &str,
        game_name: &str,
        tag_line: &str,
        data: &serde_json::Value,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT OR REPLACE INTO summoner_cache
             (puuid, summoner_id, game_name, tag_line, data, last_updated)
             VALUES (?, ?, ?, ?, ?, unixepoch())",
        )
        .bind(puuid)
        .bind(summoner_id)
        .bind(game_name)
        .bind(tag_line)
        .bind(data.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Cached identity by display name, treated as a miss once older than
    /// `max_age_hours`.
    pub async fn cached_summoner_by_name(
        &self,
        game_name: &str,
        max_age_hours: i64,
    ) -> Result<Option<CachedSummoner>, AppError> {
        let summoner = sqlx::query_as::<_, CachedSummoner>(
            "SELECT puuid, summoner_id, game_name, tag_line, data, last_updated
             FROM summoner_cache
             WHERE LOWER(game_name) = LOWER(?) AND last_updated > unixepoch() - ?",
        )
        .bind(game_name)
        .bind(max_age_hours * 3_600)
        .fetch_optional(&self.pool)
        .await?;
        Ok(summoner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> Database {
        Database::connect("sqlite::memory:", 1).await.unwrap()
    }

    #[tokio::test]
    async fn identical_sample_is_deduplicated() {
        let db = test_db().await;

        let inserted = db
            .store_rank_sample(Some("EUW1_1"), "RANKED_SOLO_5x5", "GOLD", "II", 40)
            .await
            .unwrap();
        assert!(inserted);

        // Same tier/division/lp: no new row.
        let inserted = db
            .store_rank_sample(None, "RANKED_SOLO_5x5", "GOLD", "II", 40)
            .await
            .unwrap();
        assert!(!inserted);

        let history = db.rank_history(Some("RANKED_SOLO_5x5"), 1).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn changed_sample_becomes_the_new_latest() {
        let db = test_db().await;

        db.store_rank_sample(None, "RANKED_SOLO_5x5", "GOLD", "II", 40)
            .await
            .unwrap();
        let inserted = db
            .store_rank_sample(Some("EUW1_2"), "RANKED_SOLO_5x5", "GOLD", "II", 55)
            .await
            .unwrap();
        assert!(inserted);

        let latest = db.latest_rank("RANKED_SOLO_5x5").await.unwrap().unwrap();
        assert_eq!(latest.lp, 55);
        assert_eq!(latest.match_id.as_deref(), Some("EUW1_2"));
    }

    #[tokio::test]
    async fn latest_rank_is_scoped_per_queue() {
        let db = test_db().await;

        db.store_rank_sample(None, "RANKED_SOLO_5x5", "GOLD", "II", 40)
            .await
            .unwrap();
        db.store_rank_sample(None, "RANKED_FLEX_SR", "SILVER", "I", 75)
            .await
            .unwrap();

        let solo = db.latest_rank("RANKED_SOLO_5x5").await.unwrap().unwrap();
        assert_eq!((solo.tier.as_str(), solo.lp), ("GOLD", 40));

        let flex = db.latest_rank("RANKED_FLEX_SR").await.unwrap().unwrap();
        assert_eq!((flex.tier.as_str(), flex.lp), ("SILVER", 75));

        assert!(db.latest_rank("RANKED_TFT").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn history_excludes_samples_outside_the_window() {
        let db = test_db().await;

        db.store_rank_sample(None, "RANKED_SOLO_5x5", "GOLD", "II", 40)
            .await
            .unwrap();
        // Backdate a sample past the trailing window.
        sqlx::query(
            "INSERT INTO rank_samples (queue_type, tier, division, lp, timestamp)
             VALUES (?, ?, ?, ?, unixepoch() - 10 * 86400)",
        )
        .bind("RANKED_SOLO_5x5")
        .bind("SILVER")
        .bind("I")
        .bind(99)
        .execute(&db.pool)
        .await
        .unwrap();

        let history = db.rank_history(Some("RANKED_SOLO_5x5"), 7).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].lp, 40);

        let all = db.rank_history(None, 30).await.unwrap();
        assert_eq!(all.len(), 2);
        // Ascending by timestamp: the backdated row comes first.
        assert_eq!(all[0].lp, 99);
    }

    #[tokio::test]
    async fn summoner_upsert_is_idempotent_and_replaces() {
        let db = test_db().await;

        db.upsert_summoner(
            "puuid-1",
            "summ-1",
            "Stalked",
            "EUW",
            &serde_json::json!({"profileIconId": 1}),
        )
        .await
        .unwrap();
        db.upsert_summoner(
            "puuid-1",
            "summ-1",
            "Stalked",
            "EUW",
            &serde_json::json!({"profileIconId": 2}),
        )
        .await
        .unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM summoner_cache")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(count, 1);

        let cached = db
            .cached_summoner_by_name("stalked", 24)
            .await
            .unwrap()
            .unwrap();
        assert!(cached.data.contains("2"));
    }

    #[tokio::test]
    async fn stale_summoner_cache_is_a_miss() {
        let db = test_db().await;

        db.upsert_summoner("puuid-1", "summ-1", "Stalked", "EUW", &serde_json::json!({}))
            .await
            .unwrap();
        sqlx::query("UPDATE summoner_cache SET last_updated = unixepoch() - 48 * 3600")
            .execute(&db.pool)
            .await
            .unwrap();

        assert!(
            db.cached_summoner_by_name("Stalked", 24)
                .await
                .unwrap()
                .is_none()
        );
    }
}
