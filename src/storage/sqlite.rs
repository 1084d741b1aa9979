//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::PageStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{PageRecord, RunRecord, RunStatus};
use crate::SpiderError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

const PAGE_COLUMNS: &str = "id, run_id, url, final_url, domain, depth, parent_url, status, \
     http_status, content_type, title, metadata, attempts, elapsed_ms, error_message, recorded_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(SpiderError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, SpiderError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, SpiderError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn count(&self, sql: &str, run_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(sql, params![run_id], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        seed_url: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?).unwrap_or(RunStatus::Failed),
    })
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<PageRecord> {
    let status: String = row.get(7)?;
    Ok(PageRecord {
        id: row.get(0)?,
        run_id: row.get(1)?,
        url: row.get(2)?,
        final_url: row.get(3)?,
        domain: row.get(4)?,
        depth: row.get(5)?,
        parent_url: row.get(6)?,
        status: PageStatus::from_db_string(&status).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                7,
                rusqlite::types::Type::Text,
                format!("unknown page status: {}", status).into(),
            )
        })?,
        http_status: row.get(8)?,
        content_type: row.get(9)?,
        title: row.get(10)?,
        metadata: row.get(11)?,
        attempts: row.get(12)?,
        elapsed_ms: row.get::<_, Option<i64>>(13)?.map(|ms| ms as u64),
        error_message: row.get(14)?,
        recorded_at: row.get(15)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str, seed_url: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, seed_url, status) VALUES (?1, ?2, ?3, ?4)",
            params![now, config_hash, seed_url, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, seed_url, status FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, seed_url, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Page Management =====

    fn insert_page(&mut self, page: &PageRecord) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO pages (run_id, url, final_url, domain, depth, parent_url, status,
                 http_status, content_type, title, metadata, attempts, elapsed_ms,
                 error_message, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
             ON CONFLICT(run_id, url) DO UPDATE SET
                 final_url = excluded.final_url,
                 status = excluded.status,
                 http_status = excluded.http_status,
                 content_type = excluded.content_type,
                 title = excluded.title,
                 metadata = excluded.metadata,
                 attempts = excluded.attempts,
                 elapsed_ms = excluded.elapsed_ms,
                 error_message = excluded.error_message,
                 recorded_at = excluded.recorded_at",
            params![
                page.run_id,
                page.url,
                page.final_url,
                page.domain,
                page.depth,
                page.parent_url,
                page.status.to_db_string(),
                page.http_status,
                page.content_type,
                page.title,
                page.metadata,
                page.attempts,
                page.elapsed_ms.map(|ms| ms as i64),
                page.error_message,
                page.recorded_at,
            ],
        )?;

        let id = self.conn.query_row(
            "SELECT id FROM pages WHERE run_id = ?1 AND url = ?2",
            params![page.run_id, page.url],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn get_page_by_url(&self, run_id: i64, url: &str) -> StorageResult<Option<PageRecord>> {
        let sql = format!(
            "SELECT {} FROM pages WHERE run_id = ?1 AND url = ?2",
            PAGE_COLUMNS
        );
        let page = self
            .conn
            .query_row(&sql, params![run_id, url], page_from_row)
            .optional()?;
        Ok(page)
    }

    fn get_pages_by_status(
        &self,
        run_id: i64,
        status: PageStatus,
    ) -> StorageResult<Vec<PageRecord>> {
        let sql = format!(
            "SELECT {} FROM pages WHERE run_id = ?1 AND status = ?2 ORDER BY id",
            PAGE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let pages = stmt
            .query_map(params![run_id, status.to_db_string()], page_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pages)
    }

    // ===== Link Management =====

    fn insert_links(
        &mut self,
        run_id: i64,
        from_url: &str,
        to_urls: &[String],
    ) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO links (run_id, from_url, to_url) VALUES (?1, ?2, ?3)",
            )?;
            for to_url in to_urls {
                stmt.execute(params![run_id, from_url, to_url])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get_outgoing_links(&self, run_id: i64, from_url: &str) -> StorageResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT to_url FROM links WHERE run_id = ?1 AND from_url = ?2 ORDER BY id")?;
        let links = stmt
            .query_map(params![run_id, from_url], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(links)
    }

    fn count_links(&self, run_id: i64) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM links WHERE run_id = ?1", run_id)
    }

    // ===== Statistics =====

    fn count_pages_by_status(&self, run_id: i64, status: PageStatus) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE run_id = ?1 AND status = ?2",
            params![run_id, status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_total_pages(&self, run_id: i64) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM pages WHERE run_id = ?1", run_id)
    }

    fn count_unique_domains(&self, run_id: i64) -> StorageResult<u64> {
        self.count(
            "SELECT COUNT(DISTINCT domain) FROM pages WHERE run_id = ?1",
            run_id,
        )
    }

    fn max_depth(&self, run_id: i64) -> StorageResult<Option<u32>> {
        let depth = self.conn.query_row(
            "SELECT MAX(depth) FROM pages WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(depth)
    }

    fn get_depth_breakdown(&self, run_id: i64) -> StorageResult<HashMap<u32, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT depth, COUNT(*) FROM pages WHERE run_id = ?1 GROUP BY depth")?;
        let breakdown = stmt
            .query_map(params![run_id], |row| {
                Ok((row.get::<_, u32>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(breakdown)
    }

    fn get_http_error_summary(&self, run_id: i64) -> StorageResult<HashMap<u16, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT http_status, COUNT(*) FROM pages
             WHERE run_id = ?1 AND status = ?2 AND http_status IS NOT NULL
             GROUP BY http_status",
        )?;
        let summary = stmt
            .query_map(
                params![run_id, PageStatus::HttpError.to_db_string()],
                |row| Ok((row.get::<_, u16>(0)?, row.get::<_, i64>(1)? as u64)),
            )?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(summary)
    }
}
