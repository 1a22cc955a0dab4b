//! SQLite-based summary store.
//!
//! Two tables: `videos` (one row per video, refreshed on every persist) and
//! `summaries` keyed by (video_id, language, length_class). Topics and tags
//! are stored as JSON text. Search filtering runs in Rust.

use super::{matches, sort_recent_first, CatalogEntry, Persisted, SummaryKey, SummaryRecord, SummaryStore};
use crate::error::{RecapError, Result};
use crate::source::VideoMetadata;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS videos (
        video_id TEXT PRIMARY KEY,
        title TEXT,
        channel TEXT,
        view_count INTEGER,
        duration_seconds INTEGER,
        published_at TEXT,
        subscriber_count INTEGER,
        thumbnail_url TEXT,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS summaries (
        video_id TEXT NOT NULL REFERENCES videos(video_id) ON DELETE CASCADE,
        language TEXT NOT NULL,
        length_class TEXT NOT NULL,
        summary_text TEXT NOT NULL,
        topics TEXT NOT NULL,
        transcript TEXT,
        tags TEXT NOT NULL,
        created_at TEXT NOT NULL,
        PRIMARY KEY (video_id, language, length_class)
    );

    CREATE INDEX IF NOT EXISTS idx_summaries_created_at ON summaries(created_at);
"#;

const ENTRY_COLUMNS: &str = r#"
    s.video_id, s.language, s.length_class, s.summary_text, s.topics,
    s.transcript, s.tags, s.created_at,
    v.title, v.channel, v.view_count, v.duration_seconds, v.published_at,
    v.subscriber_count, v.thumbnail_url
"#;

/// SQLite-based summary store.
pub struct SqliteSummaryStore {
    conn: Mutex<Connection>,
}

impl SqliteSummaryStore {
    /// Open (or create) a store at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(&conn)?;

        info!("Initialized SQLite summary store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init(conn: &Connection) -> Result<()> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RecapError::Store(format!("Failed to acquire lock: {}", e)))
    }

    fn query_entries(conn: &Connection, filter: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<CatalogEntry>> {
        let sql = format!(
            "SELECT {} FROM summaries s JOIN videos v ON v.video_id = s.video_id {} ORDER BY s.created_at DESC",
            ENTRY_COLUMNS, filter
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(args, entry_from_row)?;

        let mut entries = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        sort_recent_first(&mut entries);
        Ok(entries)
    }
}

#[async_trait]
impl SummaryStore for SqliteSummaryStore {
    #[instrument(skip(self), fields(key = %key))]
    async fn lookup(&self, key: &SummaryKey) -> Result<Option<SummaryRecord>> {
        let conn = self.conn()?;

        let record = conn
            .query_row(
                r#"
                SELECT video_id, language, length_class, summary_text, topics,
                       transcript, tags, created_at
                FROM summaries
                WHERE video_id = ?1 AND language = ?2 AND length_class = ?3
                "#,
                params![key.video_id, key.language.as_str(), key.length.as_str()],
                record_from_row,
            )
            .optional()?;

        debug!("Lookup {}: {}", key, if record.is_some() { "hit" } else { "miss" });
        Ok(record)
    }

    #[instrument(skip(self, video, record), fields(key = %record.key()))]
    async fn persist(&self, video: &VideoMetadata, record: &SummaryRecord) -> Result<Persisted> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            r#"
            INSERT INTO videos
            (video_id, title, channel, view_count, duration_seconds, published_at,
             subscriber_count, thumbnail_url, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(video_id) DO UPDATE SET
                title = excluded.title,
                channel = excluded.channel,
                view_count = excluded.view_count,
                duration_seconds = excluded.duration_seconds,
                published_at = excluded.published_at,
                subscriber_count = excluded.subscriber_count,
                thumbnail_url = excluded.thumbnail_url,
                updated_at = excluded.updated_at
            "#,
            params![
                video.video_id,
                video.title,
                video.channel,
                video.view_count.map(|n| n as i64),
                video.duration_seconds.map(i64::from),
                video.published_at.map(|d| d.format("%Y-%m-%d").to_string()),
                video.subscriber_count.map(|n| n as i64),
                video.thumbnail_url,
                Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true),
            ],
        )?;

        let inserted = tx.execute(
            r#"
            INSERT INTO summaries
            (video_id, language, length_class, summary_text, topics, transcript, tags, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(video_id, language, length_class) DO NOTHING
            "#,
            params![
                record.video_id,
                record.language.as_str(),
                record.length.as_str(),
                record.summary_text,
                serde_json::to_string(&record.topics)?,
                record.transcript,
                serde_json::to_string(&record.tags)?,
                record.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
            ],
        )?;

        tx.commit()?;

        if inserted == 0 {
            debug!("Summary {} already stored", record.key());
            Ok(Persisted::AlreadyExists)
        } else {
            info!("Stored summary {}", record.key());
            Ok(Persisted::Created)
        }
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn get(&self, key: &SummaryKey) -> Result<Option<CatalogEntry>> {
        let conn = self.conn()?;
        let entries = Self::query_entries(
            &conn,
            "WHERE s.video_id = ?1 AND s.language = ?2 AND s.length_class = ?3",
            params![key.video_id, key.language.as_str(), key.length.as_str()],
        )?;
        Ok(entries.into_iter().next())
    }

    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<CatalogEntry>> {
        let conn = self.conn()?;
        Self::query_entries(&conn, "", params![])
    }

    #[instrument(skip(self))]
    async fn search(&self, query: &str, tags: &BTreeSet<String>) -> Result<Vec<CatalogEntry>> {
        let conn = self.conn()?;
        let entries: Vec<CatalogEntry> = Self::query_entries(&conn, "", params![])?
            .into_iter()
            .filter(|e| matches(e, query, tags))
            .collect();

        debug!("Search matched {} summaries", entries.len());
        Ok(entries)
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn update_tags(&self, key: &SummaryKey, tags: BTreeSet<String>) -> Result<SummaryRecord> {
        {
            let conn = self.conn()?;
            let updated = conn.execute(
                "UPDATE summaries SET tags = ?1 WHERE video_id = ?2 AND language = ?3 AND length_class = ?4",
                params![
                    serde_json::to_string(&tags)?,
                    key.video_id,
                    key.language.as_str(),
                    key.length.as_str()
                ],
            )?;
            if updated == 0 {
                return Err(RecapError::NotFound(format!("no summary for {}", key)));
            }
        }

        self.lookup(key)
            .await?
            .ok_or_else(|| RecapError::NotFound(format!("no summary for {}", key)))
    }

    #[instrument(skip(self))]
    async fn delete_video(&self, video_id: &str) -> Result<usize> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        let summaries = tx.execute("DELETE FROM summaries WHERE video_id = ?1", params![video_id])?;
        let videos = tx.execute("DELETE FROM videos WHERE video_id = ?1", params![video_id])?;
        tx.commit()?;

        if videos == 0 && summaries == 0 {
            return Err(RecapError::NotFound(format!("no video {}", video_id)));
        }

        info!("Deleted video {} and {} summaries", video_id, summaries);
        Ok(summaries)
    }

    #[instrument(skip(self))]
    async fn get_video(&self, video_id: &str) -> Result<Option<VideoMetadata>> {
        let conn = self.conn()?;

        let video = conn
            .query_row(
                r#"
                SELECT video_id, title, channel, view_count, duration_seconds, published_at,
                       subscriber_count, thumbnail_url
                FROM videos
                WHERE video_id = ?1
                "#,
                params![video_id],
                |row| video_from_row(row, 1),
            )
            .optional()?;

        Ok(video)
    }
}

fn conversion_error(idx: usize, err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

fn parse_column<T: std::str::FromStr<Err = String>>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e: String| conversion_error(idx, e))
}

fn json_column<T: serde::de::DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

/// Summary columns 0..8: video_id, language, length_class, summary_text,
/// topics, transcript, tags, created_at.
fn record_from_row(row: &Row) -> rusqlite::Result<SummaryRecord> {
    let created_at: String = row.get(7)?;

    Ok(SummaryRecord {
        video_id: row.get(0)?,
        language: parse_column(row, 1)?,
        length: parse_column(row, 2)?,
        summary_text: row.get(3)?,
        topics: json_column(row, 4)?,
        transcript: row.get(5)?,
        tags: json_column(row, 6)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_error(7, e))?,
    })
}

/// Video id from column 0, then title, channel, view_count,
/// duration_seconds, published_at, subscriber_count and thumbnail_url
/// starting at `base`.
fn video_from_row(row: &Row, base: usize) -> rusqlite::Result<VideoMetadata> {
    let video_id: String = row.get(0)?;
    let published_at: Option<String> = row.get(base + 4)?;

    Ok(VideoMetadata {
        video_id,
        title: row.get(base)?,
        channel: row.get(base + 1)?,
        view_count: row.get::<_, Option<i64>>(base + 2)?.map(|n| n as u64),
        duration_seconds: row.get::<_, Option<i64>>(base + 3)?.map(|n| n as u32),
        published_at: published_at.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
        subscriber_count: row.get::<_, Option<i64>>(base + 5)?.map(|n| n as u64),
        thumbnail_url: row.get(base + 6)?,
    })
}

fn entry_from_row(row: &Row) -> rusqlite::Result<CatalogEntry> {
    Ok(CatalogEntry {
        summary: record_from_row(row)?,
        video: video_from_row(row, 8)?,
    })
}
