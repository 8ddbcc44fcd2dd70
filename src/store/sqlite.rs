//! SQLite-backed video store.
//!
//! One row per accepted video, keyed by URL. Batches are written in a single
//! transaction with `INSERT OR IGNORE`, so re-saving a known URL is a no-op.

use super::VideoStore;
use crate::admission::AcceptedRecord;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS videos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT UNIQUE NOT NULL,
    title TEXT,
    topic TEXT,
    view_count INTEGER DEFAULT 0,
    duration_minutes INTEGER DEFAULT 0,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);
"#;

/// SQLite caps bound parameters per statement; stay well below it
const QUERY_CHUNK: usize = 500;

#[derive(Clone)]
pub struct SqliteVideoStore {
    pool: SqlitePool,
}

impl SqliteVideoStore {
    /// Open (or create) the database at `db_path`, creating parent directories as needed
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open SQLite database {}", db_path.display()))?;

        sqlx::query(SCHEMA_SQL)
            .execute(&pool)
            .await
            .context("Failed to initialize database schema")?;
        Self::migrate(&pool).await?;

        info!("🗄️ Video database ready: {}", db_path.display());
        Ok(Self { pool })
    }

    /// Bring tables written by older versions up to the current columns
    async fn migrate(pool: &SqlitePool) -> Result<()> {
        let columns: Vec<String> = sqlx::query("PRAGMA table_info(videos)")
            .fetch_all(pool)
            .await
            .context("Failed to inspect videos table")?
            .into_iter()
            .map(|row| row.get::<String, _>("name"))
            .collect();

        if !columns.iter().any(|c| c == "duration_minutes") {
            sqlx::query("ALTER TABLE videos ADD COLUMN duration_minutes INTEGER DEFAULT 0")
                .execute(pool)
                .await
                .context("Failed to add duration_minutes column")?;
            info!("🗄️ Added duration_minutes column to existing database");
        }
        Ok(())
    }

    /// Total number of stored videos
    pub async fn count(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM videos")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count videos")?;
        Ok(row.0)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl VideoStore for SqliteVideoStore {
    async fn query_unknown(&self, urls: &[String]) -> Result<Vec<String>> {
        let mut existing = HashSet::new();

        for chunk in urls.chunks(QUERY_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let query_str = format!("SELECT url FROM videos WHERE url IN ({})", placeholders);

            let mut query = sqlx::query(&query_str);
            for url in chunk {
                query = query.bind(url);
            }

            let rows = query
                .fetch_all(&self.pool)
                .await
                .context("Failed to filter existing URLs")?;
            for row in rows {
                existing.insert(row.get::<String, _>("url"));
            }
        }

        info!("🗄️ {} of {} URLs already stored", existing.len(), urls.len());
        Ok(urls
            .iter()
            .filter(|url| !existing.contains(*url))
            .cloned()
            .collect())
    }

    async fn save_batch(&self, records: &[AcceptedRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let mut inserted = 0;

        for record in records {
            let result = sqlx::query(
                "INSERT OR IGNORE INTO videos (url, title, topic, view_count, duration_minutes) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&record.url)
            .bind(&record.title)
            .bind(&record.topic)
            .bind(i64::try_from(record.popularity_score).unwrap_or(i64::MAX))
            .bind(i64::try_from(record.duration_minutes).unwrap_or(i64::MAX))
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to insert {}", record.url))?;
            inserted += result.rows_affected();
        }

        tx.commit().await.context("Failed to commit video batch")?;

        debug!("Inserted {} of {} records", inserted, records.len());
        info!("💾 Saved {} new videos", inserted);
        Ok(inserted)
    }
}
