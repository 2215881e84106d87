//! Comment store for threadline.
//!
//! A single flat SQLite table holds every comment. Tree structure lives in
//! the `group_id`/`parent_id`/`level`/`position` columns, so ordering a
//! target's rows by `(group_id, position)` yields a depth-first traversal
//! without recursive queries.

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]

pub(crate) mod query;

pub use query::{CommentRecord, NewComment, Target};

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Database holding the comment table.
pub struct CommentDb {
    conn: Connection,
}

impl CommentDb {
    /// Open or create a comment database at the given path.
    ///
    /// Creates parent directories if they don't exist.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create parent directories: {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        // Readers (pagination) keep going while a placement holds the write lock
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .context("Failed to enable WAL journal mode")?;

        Ok(Self { conn })
    }

    /// Create an in-memory comment database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Ok(Self { conn })
    }

    /// Initialize the database schema.
    ///
    /// Creates the comment table and its indexes if they don't exist.
    pub fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(SCHEMA_SQL)
            .context("Failed to initialize schema")?;
        Ok(())
    }

    /// Set how long a writer waits for the database lock before giving up.
    pub fn set_busy_timeout(&self, timeout: Duration) -> Result<()> {
        self.conn
            .busy_timeout(timeout)
            .context("Failed to set busy timeout")?;
        Ok(())
    }

    /// Get a reference to the underlying connection (for advanced queries).
    #[must_use]
    pub const fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ============================================================================
// Schema SQL
// ============================================================================

// (group_id, position) is not UNIQUE: SQLite checks uniqueness row by row,
// which the sibling-shift UPDATE would trip. Writers are serialized instead.
const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS comments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    target_type TEXT NOT NULL,
    target_id TEXT NOT NULL,
    group_id INTEGER NOT NULL,
    parent_id INTEGER NOT NULL,
    level INTEGER NOT NULL CHECK (level >= 0),
    position INTEGER NOT NULL,
    nested_count INTEGER NOT NULL DEFAULT 0 CHECK (nested_count >= 0),
    is_public INTEGER NOT NULL DEFAULT 1 CHECK (is_public IN (0, 1)),
    is_removed INTEGER NOT NULL DEFAULT 0 CHECK (is_removed IN (0, 1)),
    author TEXT NOT NULL,
    body TEXT NOT NULL,
    submitted_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_comments_target_group_position
    ON comments(target_type, target_id, group_id, position);
CREATE INDEX IF NOT EXISTS idx_comments_group_position ON comments(group_id, position);
CREATE INDEX IF NOT EXISTS idx_comments_parent ON comments(parent_id);
";

// ============================================================================
// Tests
// ============================================================================
