//! SQLite-backed post history.
//! Every firing leaves exactly one row — published or failed — so dashboards
//! and retry linkage survive restarts.

use chrono::{DateTime, Utc};
use localboost_core::error::{LocalBoostError, Result};
use localboost_core::types::{AutomatedPost, PostStatus};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// SQLite store for automated post records.
pub struct PostHistory {
    conn: rusqlite::Connection,
}

impl PostHistory {
    /// Open or create the post history database.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = rusqlite::Connection::open(path)
            .map_err(|e| LocalBoostError::Storage(format!("DB open: {e}")))?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open the default database (~/.localboost/posts.db).
    pub fn open_default() -> Result<Self> {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let dir = home.join(".localboost");
        std::fs::create_dir_all(&dir).ok();
        Self::open(&dir.join("posts.db"))
    }

    /// Run migrations to create tables.
    fn migrate(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
            -- One row per firing (scheduled or manual)
            CREATE TABLE IF NOT EXISTS automated_posts (
                id TEXT PRIMARY KEY,
                schedule_id TEXT,                -- NULL for one-off manual posts
                business_profile_id TEXT NOT NULL,
                content_template TEXT NOT NULL,
                scheduled_time TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'scheduled',
                platforms TEXT NOT NULL DEFAULT '[]',        -- JSON array
                generated_content TEXT,
                media_urls TEXT NOT NULL DEFAULT '[]',       -- JSON array
                platform_results TEXT NOT NULL DEFAULT '[]', -- JSON array
                failure_reason TEXT,
                retry_of TEXT,
                area TEXT,
                created_at TEXT NOT NULL,
                published_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_posts_schedule
                ON automated_posts(schedule_id, created_at);
         ",
            )
            .map_err(|e| LocalBoostError::Storage(format!("Migration: {e}")))?;
        Ok(())
    }

    /// Save a post record (insert or overwrite by id).
    pub fn save(&self, post: &AutomatedPost) -> Result<()> {
        let platforms = serde_json::to_string(&post.platforms)
            .map_err(|e| LocalBoostError::Storage(format!("Serialize platforms: {e}")))?;
        let media_urls = serde_json::to_string(&post.media_urls)
            .map_err(|e| LocalBoostError::Storage(format!("Serialize media: {e}")))?;
        let platform_results = serde_json::to_string(&post.platform_results)
            .map_err(|e| LocalBoostError::Storage(format!("Serialize results: {e}")))?;
        let status = match post.status {
            PostStatus::Scheduled => "scheduled",
            PostStatus::Published => "published",
            PostStatus::Failed => "failed",
        };

        self.conn
            .execute(
                "INSERT OR REPLACE INTO automated_posts
                 (id, schedule_id, business_profile_id, content_template, scheduled_time, status,
                  platforms, generated_content, media_urls, platform_results, failure_reason,
                  retry_of, area, created_at, published_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                rusqlite::params![
                    post.id.to_string(),
                    post.schedule_id.map(|u| u.to_string()),
                    post.business_profile_id,
                    post.content_template,
                    post.scheduled_time.to_rfc3339(),
                    status,
                    platforms,
                    post.generated_content,
                    media_urls,
                    platform_results,
                    post.failure_reason,
                    post.retry_of.map(|u| u.to_string()),
                    post.area,
                    post.created_at.to_rfc3339(),
                    post.published_at.map(|t| t.to_rfc3339()),
                ],
            )
            .map_err(|e| LocalBoostError::Storage(format!("Save post: {e}")))?;
        Ok(())
    }

    /// Most recent posts across all schedules, newest first.
    pub fn recent(&self, limit: usize) -> Vec<AutomatedPost> {
        let mut stmt = match self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM automated_posts ORDER BY created_at DESC LIMIT ?1"
        )) {
            Ok(s) => s,
            Err(_) => return Vec::new(),
        };
        let rows = stmt.query_map([limit as i64], post_from_row).ok();
        rows.map(|r| r.filter_map(|p| p.ok()).collect())
            .unwrap_or_default()
    }

    /// Posts for one schedule, newest first.
    pub fn for_schedule(&self, schedule_id: Uuid, limit: usize) -> Vec<AutomatedPost> {
        let mut stmt = match self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM automated_posts
             WHERE schedule_id = ?1 ORDER BY created_at DESC LIMIT ?2"
        )) {
            Ok(s) => s,
            Err(_) => return Vec::new(),
        };
        let rows = stmt
            .query_map(
                rusqlite::params![schedule_id.to_string(), limit as i64],
                post_from_row,
            )
            .ok();
        rows.map(|r| r.filter_map(|p| p.ok()).collect())
            .unwrap_or_default()
    }

    /// The newest post for one schedule, if any. Feeds retry linkage: a new
    /// firing records `retry_of` when this one failed.
    pub fn latest_for_schedule(&self, schedule_id: Uuid) -> Option<AutomatedPost> {
        self.for_schedule(schedule_id, 1).into_iter().next()
    }

    /// Row counts grouped by status, for the info endpoint.
    pub fn counts_by_status(&self) -> HashMap<String, u64> {
        let mut stmt = match self
            .conn
            .prepare("SELECT status, COUNT(*) FROM automated_posts GROUP BY status")
        {
            Ok(s) => s,
            Err(_) => return HashMap::new(),
        };
        stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })
        .ok()
        .map(|r| r.filter_map(|x| x.ok()).collect())
        .unwrap_or_default()
    }
}

const COLUMNS: &str = "id, schedule_id, business_profile_id, content_template, scheduled_time, \
                       status, platforms, generated_content, media_urls, platform_results, \
                       failure_reason, retry_of, area, created_at, published_at";

fn post_from_row(row: &rusqlite::Row) -> rusqlite::Result<AutomatedPost> {
    let id: String = row.get(0)?;
    let schedule_id: Option<String> = row.get(1)?;
    let business_profile_id: String = row.get(2)?;
    let content_template: String = row.get(3)?;
    let scheduled_time: String = row.get(4)?;
    let status: String = row.get(5)?;
    let platforms: String = row.get(6)?;
    let generated_content: Option<String> = row.get(7)?;
    let media_urls: String = row.get(8)?;
    let platform_results: String = row.get(9)?;
    let failure_reason: Option<String> = row.get(10)?;
    let retry_of: Option<String> = row.get(11)?;
    let area: Option<String> = row.get(12)?;
    let created_at: String = row.get(13)?;
    let published_at: Option<String> = row.get(14)?;

    Ok(AutomatedPost {
        id: Uuid::parse_str(&id).unwrap_or_else(|_| Uuid::nil()),
        schedule_id: schedule_id.and_then(|s| Uuid::parse_str(&s).ok()),
        business_profile_id,
        content_template,
        scheduled_time: parse_instant(&scheduled_time),
        status: match status.as_str() {
            "published" => PostStatus::Published,
            "failed" => PostStatus::Failed,
            _ => PostStatus::Scheduled,
        },
        platforms: serde_json::from_str(&platforms).unwrap_or_default(),
        generated_content,
        media_urls: serde_json::from_str(&media_urls).unwrap_or_default(),
        platform_results: serde_json::from_str(&platform_results).unwrap_or_default(),
        failure_reason,
        retry_of: retry_of.and_then(|s| Uuid::parse_str(&s).ok()),
        area,
        created_at: parse_instant(&created_at),
        published_at: published_at
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|d| d.with_timezone(&Utc)),
    })
}

fn parse_instant(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
