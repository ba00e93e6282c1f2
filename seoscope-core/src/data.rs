use crate::cache::{Cache, CacheKey, CacheKind, current_timestamp};
use rusqlite::{Connection, OptionalExtension, Result, params};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// sqlite-backed cache and baseline store.
pub struct Database {
    conn: Mutex<Connection>,
}

/// Snapshot of a full run, kept for later comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub site: String,
    pub date: String,
    pub health_score: u8,
    pub top_queries: Vec<String>,
    pub created_at: i64,
}

impl Database {
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        let db = Database {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    pub fn in_memory() -> Result<Self> {
        let db = Database {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn init_schema(&self) -> Result<()> {
        self.conn().execute_batch(
            "
            CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                kind TEXT NOT NULL CHECK(kind IN ('pagespeed', 'performance', 'crawl', 'page_text', 'search')),
                subject TEXT NOT NULL,
                fetched_at INTEGER NOT NULL,
                value TEXT NOT NULL       -- JSON
            );

            CREATE INDEX IF NOT EXISTS idx_cache_kind ON cache_entries(kind, fetched_at);

            CREATE TABLE IF NOT EXISTS baselines (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                site TEXT NOT NULL,
                date TEXT NOT NULL,
                health_score INTEGER NOT NULL CHECK(health_score BETWEEN 0 AND 100),
                top_queries TEXT NOT NULL, -- JSON array
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_baselines_site ON baselines(site, created_at);
            ",
        )?;
        Ok(())
    }

    // Cache entries
    pub fn cache_get(&self, key: &CacheKey, now: i64) -> Result<Option<Value>> {
        let row: Option<(i64, String)> = self
            .conn()
            .query_row(
                "SELECT fetched_at, value FROM cache_entries WHERE key = ?1",
                params![&key.digest],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((fetched_at, raw)) = row else {
            return Ok(None);
        };
        if !key.kind.is_fresh(fetched_at, now) {
            debug!("Cache entry for {} expired", key.subject);
            return Ok(None);
        }
        Ok(serde_json::from_str(&raw).ok())
    }

    pub fn cache_put(&self, key: &CacheKey, value: &Value, fetched_at: i64) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO cache_entries (key, kind, subject, fetched_at, value)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                &key.digest,
                key.kind.as_str(),
                &key.subject,
                fetched_at,
                value.to_string(),
            ],
        )?;
        Ok(())
    }

    pub fn clear_cache(&self) -> Result<usize> {
        self.conn().execute("DELETE FROM cache_entries", [])
    }

    /// Deletes entries whose TTL has passed, returning how many went.
    pub fn purge_expired(&self, now: i64) -> Result<usize> {
        let conn = self.conn();
        let mut removed = 0;
        for kind in CacheKind::ALL {
            removed += conn.execute(
                "DELETE FROM cache_entries WHERE kind = ?1 AND fetched_at <= ?2",
                params![kind.as_str(), now - kind.ttl_secs()],
            )?;
        }
        Ok(removed)
    }

    pub fn cache_counts(&self) -> Result<Vec<(String, i64)>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT kind, COUNT(*) FROM cache_entries GROUP BY kind ORDER BY kind")?;
        let counts = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>>>()?;
        Ok(counts)
    }

    // Baselines
    pub fn save_baseline(&self, baseline: &Baseline) -> Result<i64> {
        let top_queries =
            serde_json::to_string(&baseline.top_queries).unwrap_or_else(|_| "[]".to_string());
        let conn = self.conn();
        conn.execute(
            "INSERT INTO baselines (site, date, health_score, top_queries, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                &baseline.site,
                &baseline.date,
                baseline.health_score,
                top_queries,
                baseline.created_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn latest_baseline(&self, site: &str) -> Result<Option<Baseline>> {
        self.conn()
            .query_row(
                "SELECT site, date, health_score, top_queries, created_at FROM baselines
                 WHERE site = ?1 ORDER BY created_at DESC, id DESC LIMIT 1",
                params![site],
                |row| {
                    let top_queries: String = row.get(3)?;
                    Ok(Baseline {
                        site: row.get(0)?,
                        date: row.get(1)?,
                        health_score: row.get(2)?,
                        top_queries: serde_json::from_str(&top_queries).unwrap_or_default(),
                        created_at: row.get(4)?,
                    })
                },
            )
            .optional()
    }
}

impl Cache for Database {
    fn get(&self, key: &CacheKey) -> Option<Value> {
        match self.cache_get(key, current_timestamp()) {
            Ok(value) => value,
            Err(e) => {
                warn!("Cache read failed for {}: {}", key.subject, e);
                None
            }
        }
    }

    fn put(&self, key: &CacheKey, value: &Value) {
        if let Err(e) = self.cache_put(key, value, current_timestamp()) {
            warn!("Cache write failed for {}: {}", key.subject, e);
        }
    }
}
