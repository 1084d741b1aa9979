//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Run tracking (one row per crawl, with the config hash)
//! - Page outcome persistence (fetched, failed and skipped pages)
//! - Link relationship tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::PageStatus;
use crate::SpiderError;

use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
pub fn open_storage(path: &Path) -> Result<SqliteStorage, SpiderError> {
    SqliteStorage::new(path)
}

/// Represents one page outcome in the database
#[derive(Debug, Clone, PartialEq)]
pub struct PageRecord {
    /// Row id; ignored on insert
    pub id: i64,
    pub run_id: i64,
    pub url: String,
    pub final_url: Option<String>,
    pub domain: String,
    pub depth: u32,
    pub parent_url: Option<String>,
    pub status: PageStatus,
    pub http_status: Option<u16>,
    pub content_type: Option<String>,
    pub title: Option<String>,
    /// `PageMetadata` serialized as JSON
    pub metadata: Option<String>,
    pub attempts: u32,
    pub elapsed_ms: Option<u64>,
    pub error_message: Option<String>,
    pub recorded_at: String,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub seed_url: String,
    pub status: RunStatus,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Aborted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "aborted" => Some(Self::Aborted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
