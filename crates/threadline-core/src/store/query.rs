//! Query and write primitives for the comment table.
//!
//! Read accessors hang off [`CommentDb`]. Write primitives take a bare
//! `&Connection` so callers can run them inside a transaction; none of them
//! open a transaction of their own.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use thiserror::Error;

use super::CommentDb;
use crate::paginate::RootGroup;

// ============================================================================
// Record Types
// ============================================================================

/// The object a comment is attached to, e.g. `article:42`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Target {
    pub target_type: String,
    pub target_id: String,
}

impl Target {
    #[must_use]
    pub fn new(target_type: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self {
            target_type: target_type.into(),
            target_id: target_id.into(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.target_type, self.target_id)
    }
}

/// Error parsing a `TYPE:ID` target string.
#[derive(Debug, Error)]
#[error("Invalid target '{0}': expected TYPE:ID")]
pub struct TargetParseError(String);

impl FromStr for Target {
    type Err = TargetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((kind, id)) if !kind.is_empty() && !id.is_empty() => Ok(Self::new(kind, id)),
            _ => Err(TargetParseError(s.to_string())),
        }
    }
}

/// One stored comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentRecord {
    pub id: i64,
    pub target_type: String,
    pub target_id: String,
    pub group_id: i64,
    pub parent_id: i64,
    pub level: i64,
    pub position: i64,
    pub nested_count: i64,
    pub is_public: bool,
    pub is_removed: bool,
    pub author: String,
    pub body: String,
    pub submitted_at: String,
}

impl CommentRecord {
    /// Roots point at themselves.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.parent_id == self.id
    }

    /// Whether the comment counts toward its ancestors' nested counts.
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.is_public && !self.is_removed
    }

    #[must_use]
    pub fn target(&self) -> Target {
        Target::new(self.target_type.clone(), self.target_id.clone())
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            target_type: row.get(1)?,
            target_id: row.get(2)?,
            group_id: row.get(3)?,
            parent_id: row.get(4)?,
            level: row.get(5)?,
            position: row.get(6)?,
            nested_count: row.get(7)?,
            is_public: row.get(8)?,
            is_removed: row.get(9)?,
            author: row.get(10)?,
            body: row.get(11)?,
            submitted_at: row.get(12)?,
        })
    }
}

const COMMENT_COLUMNS: &str = "id, target_type, target_id, group_id, parent_id, level, position,
    nested_count, is_public, is_removed, author, body, submitted_at";

/// A comment submission that has not been placed yet.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub target: Target,
    pub author: String,
    pub body: String,
    pub is_public: bool,
    pub is_removed: bool,
    pub submitted_at: DateTime<Utc>,
}

impl NewComment {
    /// A public, not removed comment submitted now.
    #[must_use]
    pub fn new(target: Target, author: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            target,
            author: author.into(),
            body: body.into(),
            is_public: true,
            is_removed: false,
            submitted_at: Utc::now(),
        }
    }

    /// Mark the submission as awaiting moderation.
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.is_public = false;
        self
    }

    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.is_public && !self.is_removed
    }
}

// ============================================================================
// Read Accessors
// ============================================================================

impl CommentDb {
    /// Get a single comment.
    ///
    /// Returns `None` if the comment doesn't exist.
    pub fn get_comment(&self, id: i64) -> Result<Option<CommentRecord>> {
        fetch_comment(&self.conn, id)
    }

    /// List every comment in a group, in thread order.
    pub fn list_group(&self, group_id: i64) -> Result<Vec<CommentRecord>> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE group_id = ? ORDER BY position ASC"
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare list_group query")?;

        let rows = stmt
            .query_map(params![group_id], CommentRecord::from_row)
            .context("Failed to execute list_group query")?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row.context("Failed to read comment row")?);
        }
        Ok(results)
    }

    /// List the comments on a target ordered by `(group_id, position)`.
    ///
    /// With `visible_only`, hidden and removed comments are skipped.
    pub fn list_target(&self, target: &Target, visible_only: bool) -> Result<Vec<CommentRecord>> {
        let mut sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE target_type = ? AND target_id = ?"
        );
        if visible_only {
            sql.push_str(" AND is_public = 1 AND is_removed = 0");
        }
        sql.push_str(" ORDER BY group_id ASC, position ASC");

        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare list_target query")?;

        let rows = stmt
            .query_map(
                params![target.target_type, target.target_id],
                CommentRecord::from_row,
            )
            .context("Failed to execute list_target query")?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row.context("Failed to read comment row")?);
        }
        Ok(results)
    }

    /// Visible root comments of a target with their group sizes
    /// (`1 + nested_count`), in root order.
    pub fn root_groups(&self, target: &Target) -> Result<Vec<RootGroup>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT group_id, position, nested_count
                 FROM comments
                 WHERE target_type = ? AND target_id = ? AND level = 0
                   AND is_public = 1 AND is_removed = 0
                 ORDER BY group_id ASC, position ASC",
            )
            .context("Failed to prepare root_groups query")?;

        let rows = stmt
            .query_map(params![target.target_type, target.target_id], |row| {
                let nested: i64 = row.get(2)?;
                Ok(RootGroup {
                    group_id: row.get(0)?,
                    position: row.get(1)?,
                    size: nested + 1,
                })
            })
            .context("Failed to execute root_groups query")?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row.context("Failed to read root group row")?);
        }
        Ok(results)
    }

    /// Number of visible comments on a target.
    pub fn count_visible(&self, target: &Target) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM comments
                 WHERE target_type = ? AND target_id = ? AND is_public = 1 AND is_removed = 0",
                params![target.target_type, target.target_id],
                |row| row.get(0),
            )
            .context("Failed to count visible comments")
    }

    /// Distinct targets that have at least one comment.
    pub fn list_targets(&self) -> Result<Vec<Target>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT DISTINCT target_type, target_id FROM comments
                 ORDER BY target_type, target_id",
            )
            .context("Failed to prepare list_targets query")?;

        let rows = stmt
            .query_map([], |row| Ok(Target::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .context("Failed to execute list_targets query")?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row.context("Failed to read target row")?);
        }
        Ok(results)
    }
}

// ============================================================================
// Transaction-scoped Primitives
// ============================================================================

pub(crate) fn fetch_comment(conn: &Connection, id: i64) -> Result<Option<CommentRecord>> {
    let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?");
    conn.query_row(&sql, params![id], CommentRecord::from_row)
        .optional()
        .with_context(|| format!("Failed to query comment {id}"))
}

/// Every comment, optionally limited to one target, ordered by group and
/// then by position (descending within each group when `backward`).
pub(crate) fn scan_comments(
    conn: &Connection,
    target: Option<&Target>,
    backward: bool,
) -> Result<Vec<CommentRecord>> {
    let mut sql = format!("SELECT {COMMENT_COLUMNS} FROM comments");
    let mut param_values: Vec<&dyn rusqlite::ToSql> = Vec::new();
    if let Some(t) = target {
        sql.push_str(" WHERE target_type = ? AND target_id = ?");
        param_values.push(&t.target_type);
        param_values.push(&t.target_id);
    }
    sql.push_str(if backward {
        " ORDER BY group_id ASC, position DESC"
    } else {
        " ORDER BY group_id ASC, position ASC"
    });

    let mut stmt = conn
        .prepare(&sql)
        .context("Failed to prepare comment scan")?;

    let rows = stmt
        .query_map(param_values.as_slice(), CommentRecord::from_row)
        .context("Failed to execute comment scan")?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row.context("Failed to read comment row")?);
    }
    Ok(results)
}

/// Highest position used by the roots of a target.
pub(crate) fn max_root_position(conn: &Connection, target: &Target) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT MAX(position) FROM comments
         WHERE target_type = ? AND target_id = ? AND level = 0",
        params![target.target_type, target.target_id],
        |row| row.get(0),
    )
    .context("Failed to query max root position")
}

/// Highest position used anywhere in a group.
pub(crate) fn max_group_position(conn: &Connection, group_id: i64) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT MAX(position) FROM comments WHERE group_id = ?",
        params![group_id],
        |row| row.get(0),
    )
    .context("Failed to query max group position")
}

/// First position after `position` held by a comment at `level` or shallower.
///
/// This is where the parent's subtree ends.
pub(crate) fn subtree_boundary(
    conn: &Connection,
    group_id: i64,
    level: i64,
    position: i64,
) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT MIN(position) FROM comments
         WHERE group_id = ? AND level <= ? AND position > ?",
        params![group_id, level, position],
        |row| row.get(0),
    )
    .context("Failed to query subtree boundary")
}

/// Move every comment of a group at or after `from` one slot down.
pub(crate) fn shift_positions(conn: &Connection, group_id: i64, from: i64) -> Result<usize> {
    conn.execute(
        "UPDATE comments SET position = position + 1 WHERE group_id = ? AND position >= ?",
        params![group_id, from],
    )
    .context("Failed to shift positions")
}

/// Insert a placed comment. Returns the id assigned by the store.
///
/// For roots pass `None` as the group and parent; both are then set to the new id.
pub(crate) fn insert_comment(
    conn: &Connection,
    new: &NewComment,
    lineage: Option<(i64, i64)>,
    level: i64,
    position: i64,
) -> Result<i64> {
    let (group_id, parent_id) = lineage.unwrap_or((0, 0));
    conn.execute(
        "INSERT INTO comments (
            target_type, target_id, group_id, parent_id, level, position,
            nested_count, is_public, is_removed, author, body, submitted_at
        ) VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?, ?)",
        params![
            new.target.target_type,
            new.target.target_id,
            group_id,
            parent_id,
            level,
            position,
            new.is_public,
            new.is_removed,
            new.author,
            new.body,
            new.submitted_at.to_rfc3339(),
        ],
    )
    .context("Failed to insert comment")?;

    let id = conn.last_insert_rowid();
    if lineage.is_none() {
        conn.execute(
            "UPDATE comments SET group_id = ?1, parent_id = ?1 WHERE id = ?1",
            params![id],
        )
        .context("Failed to set root identity")?;
    }
    Ok(id)
}

/// Parent id of a comment, `None` if the comment doesn't exist.
pub(crate) fn parent_of(conn: &Connection, id: i64) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT parent_id FROM comments WHERE id = ?",
        params![id],
        |row| row.get(0),
    )
    .optional()
    .with_context(|| format!("Failed to query parent of comment {id}"))
}

pub(crate) fn add_nested_count(conn: &Connection, id: i64, delta: i64) -> Result<()> {
    conn.execute(
        "UPDATE comments SET nested_count = nested_count + ? WHERE id = ?",
        params![delta, id],
    )
    .with_context(|| format!("Failed to adjust nested count of comment {id}"))?;
    Ok(())
}

pub(crate) fn set_nested_count(conn: &Connection, id: i64, value: i64) -> Result<usize> {
    conn.execute(
        "UPDATE comments SET nested_count = ? WHERE id = ? AND nested_count != ?",
        params![value, id, value],
    )
    .with_context(|| format!("Failed to set nested count of comment {id}"))
}

pub(crate) fn set_flags(conn: &Connection, id: i64, is_public: bool, is_removed: bool) -> Result<()> {
    conn.execute(
        "UPDATE comments SET is_public = ?, is_removed = ? WHERE id = ?",
        params![is_public, is_removed, id],
    )
    .with_context(|| format!("Failed to update flags of comment {id}"))?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
