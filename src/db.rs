use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("cannot create database directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("store connection lock poisoned")]
    Poisoned,
    #[error("a record for {0} already exists")]
    Duplicate(String),
}

/// A stored job, one per `detail_url`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRecord {
    pub title: String,
    pub company: String,
    pub location: String,
    pub detail_url: String,
    pub summary: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

/// Persistent store seen by the pipeline: point lookup plus single insert.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn exists(&self, detail_url: &str) -> Result<bool, StoreError>;

    /// Insert one record and return its row id.
    async fn insert(&self, record: &JobRecord) -> Result<i64, StoreError>;
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self, StoreError> {
        if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_schema(conn)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::with_schema(Connection::open_in_memory()?)
    }

    fn with_schema(conn: Connection) -> Result<Self, StoreError> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM jobs", [], |r| r.get(0))?)
    }

    /// Record count per category, largest first.
    pub fn category_counts(&self) -> Result<Vec<(String, usize)>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT category, COUNT(*) FROM jobs GROUP BY category ORDER BY COUNT(*) DESC, category",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Newest records first, optionally restricted to one category.
    pub fn recent(&self, category: Option<&str>, limit: usize) -> Result<Vec<JobRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT title, company, location, detail_url, summary, category, created_at
             FROM jobs
             WHERE ?1 IS NULL OR category = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(rusqlite::params![category, limit as i64], |row| {
                Ok(JobRecord {
                    title: row.get(0)?,
                    company: row.get(1)?,
                    location: row.get(2)?,
                    detail_url: row.get(3)?,
                    summary: row.get(4)?,
                    category: row.get(5)?,
                    created_at: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS jobs (
            id          INTEGER PRIMARY KEY,
            title       TEXT NOT NULL,
            company     TEXT NOT NULL,
            location    TEXT NOT NULL,
            detail_url  TEXT NOT NULL,
            summary     TEXT NOT NULL,
            category    TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_jobs_detail_url ON jobs(detail_url);
        CREATE INDEX IF NOT EXISTS idx_jobs_category ON jobs(category);
        ",
    )
}

#[async_trait]
impl JobStore for SqliteStore {
    async fn exists(&self, detail_url: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM jobs WHERE detail_url = ?1",
                [detail_url],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    async fn insert(&self, record: &JobRecord) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT INTO jobs (title, company, location, detail_url, summary, category, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                record.title,
                record.company,
                record.location,
                record.detail_url,
                record.summary,
                record.category,
                record.created_at,
            ],
        );

        match inserted {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(StoreError::Duplicate(record.detail_url.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
