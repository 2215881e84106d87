//! Nested-count maintenance.
//!
//! `nested_count` is the number of visible (public, not removed)
//! transitive descendants of a comment. It changes in exactly two ways:
//! a visible reply is inserted, or a comment's effective visibility flips.
//! Either way every ancestor moves by one; the comment's own count is left
//! alone. `rebuild_all` recomputes every count from scratch.

use std::collections::{HashMap, HashSet};
use std::fmt;

use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::store::query::{add_nested_count, parent_of, scan_comments, set_nested_count};
use crate::store::CommentRecord;

use super::{CoreError, CoreResult};

/// Keeps ancestor `nested_count`s in step with inserts and visibility flips.
///
/// Callers invoke it explicitly inside the transaction that made the change.
pub struct NestedCountTracker;

impl NestedCountTracker {
    /// Count a freshly placed comment in its ancestors' totals.
    ///
    /// Hidden comments are skipped here and counted when published.
    /// Returns the number of ancestors updated.
    pub fn on_insert(conn: &Connection, record: &CommentRecord) -> CoreResult<usize> {
        if record.is_root() || !record.is_visible() {
            return Ok(0);
        }
        adjust_ancestors(conn, record.id, 1)
    }

    /// Apply a visibility flip of `comment_id` to its ancestors.
    ///
    /// The comment's own count is unaffected. Returns the number of
    /// ancestors updated.
    pub fn on_visibility_change(
        conn: &Connection,
        comment_id: i64,
        now_visible: bool,
    ) -> CoreResult<usize> {
        adjust_ancestors(conn, comment_id, if now_visible { 1 } else { -1 })
    }

    /// Recompute every `nested_count` in one backward pass per group.
    ///
    /// Idempotent. Orphaned subtrees are counted as if rooted at the orphan
    /// and reported as anomalies; a duplicate `(group_id, position)` aborts
    /// with `DuplicatePosition`. Run inside a transaction.
    pub fn rebuild_all(conn: &Connection) -> CoreResult<RebuildReport> {
        let rows = scan_comments(conn, None, true).map_err(CoreError::from_write)?;
        let tally = tally(&rows)?;

        let mut updated = 0;
        for (id, count) in &tally.counts {
            updated += set_nested_count(conn, *id, *count).map_err(CoreError::from_write)?;
        }

        for anomaly in &tally.anomalies {
            warn!(%anomaly, "rebuild found an inconsistent comment");
        }
        info!(
            scanned = rows.len(),
            groups = tally.groups,
            updated,
            anomalies = tally.anomalies.len(),
            "rebuilt nested counts"
        );

        Ok(RebuildReport {
            scanned: rows.len(),
            groups: tally.groups,
            updated,
            anomalies: tally.anomalies,
        })
    }
}

fn adjust_ancestors(conn: &Connection, comment_id: i64, delta: i64) -> CoreResult<usize> {
    let mut current = comment_id;
    let mut visited = HashSet::from([comment_id]);
    let mut updated = 0;

    loop {
        let parent = parent_of(conn, current)
            .map_err(CoreError::from_write)?
            .ok_or(CoreError::CommentNotFound {
                comment_id: current,
            })?;
        if parent == current {
            break;
        }
        if !visited.insert(parent) {
            return Err(CoreError::Internal(anyhow::anyhow!(
                "Ancestor chain of comment {comment_id} loops back to {parent}"
            )));
        }

        match parent_of(conn, parent).map_err(CoreError::from_write)? {
            Some(_) => {
                add_nested_count(conn, parent, delta).map_err(CoreError::from_write)?;
                updated += 1;
                current = parent;
            }
            None => {
                warn!(comment_id = current, parent, "ancestor walk hit a missing parent");
                break;
            }
        }
    }

    debug!(comment_id, delta, updated, "adjusted ancestor nested counts");
    Ok(updated)
}

/// Summary of a `rebuild_all` run.
#[derive(Debug, Clone, Serialize)]
pub struct RebuildReport {
    pub scanned: usize,
    pub groups: usize,
    /// Comments whose stored count changed.
    pub updated: usize,
    pub anomalies: Vec<RebuildAnomaly>,
}

/// A structural problem found while rebuilding. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebuildAnomaly {
    pub comment_id: i64,
    pub parent_id: i64,
    pub kind: AnomalyKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// `parent_id` names no existing comment.
    MissingParent,
    /// The parent exists but belongs to another group.
    ParentOutsideGroup,
    /// The parent sorts after its child.
    ParentAfterChild,
}

impl fmt::Display for RebuildAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            AnomalyKind::MissingParent => "does not exist",
            AnomalyKind::ParentOutsideGroup => "is in another group",
            AnomalyKind::ParentAfterChild => "is positioned after its child",
        };
        write!(
            f,
            "comment {}: parent {} {what}",
            self.comment_id, self.parent_id
        )
    }
}

/// Recomputed counts for a set of comments.
pub(crate) struct Tally {
    pub counts: HashMap<i64, i64>,
    pub groups: usize,
    pub anomalies: Vec<RebuildAnomaly>,
}

/// Control-break pass over rows ordered by `(group_id, position DESC)`.
///
/// Walking a group backward visits every descendant before its ancestors,
/// so each comment's total is complete by the time it is reached.
pub(crate) fn tally(rows: &[CommentRecord]) -> CoreResult<Tally> {
    let all_ids: HashSet<i64> = rows.iter().map(|r| r.id).collect();
    let mut counts = HashMap::with_capacity(rows.len());
    let mut anomalies = Vec::new();
    let mut groups = 0;

    for group in rows.chunk_by(|a, b| a.group_id == b.group_id) {
        groups += 1;
        let mut pending: HashMap<i64, i64> = HashMap::new();
        let mut seen = HashSet::new();
        let mut links = Vec::new();
        let mut last_position = None;

        for row in group {
            if last_position == Some(row.position) {
                return Err(CoreError::DuplicatePosition {
                    group_id: row.group_id,
                    position: row.position,
                });
            }
            last_position = Some(row.position);

            let own = pending.remove(&row.id).unwrap_or(0);
            counts.insert(row.id, own);
            seen.insert(row.id);

            if row.is_root() {
                continue;
            }
            if seen.contains(&row.parent_id) {
                anomalies.push(RebuildAnomaly {
                    comment_id: row.id,
                    parent_id: row.parent_id,
                    kind: AnomalyKind::ParentAfterChild,
                });
                continue;
            }
            *pending.entry(row.parent_id).or_default() += own + i64::from(row.is_visible());
            links.push((row.id, row.parent_id));
        }

        // Whatever is still pending belongs to parents this group never reached.
        for (comment_id, parent_id) in links {
            if seen.contains(&parent_id) {
                continue;
            }
            let kind = if all_ids.contains(&parent_id) {
                AnomalyKind::ParentOutsideGroup
            } else {
                AnomalyKind::MissingParent
            };
            anomalies.push(RebuildAnomaly {
                comment_id,
                parent_id,
                kind,
            });
        }
    }

    Ok(Tally {
        counts,
        groups,
        anomalies,
    })
}
