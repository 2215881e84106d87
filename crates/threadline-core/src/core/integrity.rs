//! Structural integrity checks over stored threads.

use std::collections::HashMap;
use std::fmt;

use rusqlite::Connection;
use serde::Serialize;

use crate::policy::TargetPolicy;
use crate::store::query::scan_comments;
use crate::store::{CommentRecord, Target};

use super::counts::tally;
use super::{CoreError, CoreResult};

/// One broken invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityViolation {
    pub comment_id: i64,
    pub group_id: i64,
    pub kind: ViolationKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViolationKind {
    /// A root whose `group_id` is not its own id, or whose level is not 0.
    MalformedRoot,
    MissingParent { parent_id: i64 },
    GroupMismatch { parent_id: i64, parent_group_id: i64 },
    LevelMismatch { expected: i64, actual: i64 },
    /// Not inside its parent's contiguous block of positions.
    OutOfOrder { parent_id: i64 },
    DuplicatePosition { position: i64 },
    TooDeep { level: i64, max_level: i64 },
    NestedCountDrift { stored: i64, expected: i64 },
}

impl fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "comment {} (group {}): ", self.comment_id, self.group_id)?;
        match &self.kind {
            ViolationKind::MalformedRoot => write!(f, "malformed root"),
            ViolationKind::MissingParent { parent_id } => {
                write!(f, "parent {parent_id} does not exist")
            }
            ViolationKind::GroupMismatch {
                parent_id,
                parent_group_id,
            } => write!(f, "parent {parent_id} is in group {parent_group_id}"),
            ViolationKind::LevelMismatch { expected, actual } => {
                write!(f, "level {actual}, expected {expected}")
            }
            ViolationKind::OutOfOrder { parent_id } => {
                write!(f, "not positioned within the subtree of {parent_id}")
            }
            ViolationKind::DuplicatePosition { position } => {
                write!(f, "position {position} is used twice")
            }
            ViolationKind::TooDeep { level, max_level } => {
                write!(f, "level {level} exceeds the limit of {max_level}")
            }
            ViolationKind::NestedCountDrift { stored, expected } => {
                write!(f, "nested_count is {stored}, expected {expected}")
            }
        }
    }
}

/// Check thread invariants for one target, or for the whole store.
///
/// Returns every violation found; an empty list means the threads are sound.
pub fn verify(
    conn: &Connection,
    policy: &dyn TargetPolicy,
    target: Option<&Target>,
) -> CoreResult<Vec<IntegrityViolation>> {
    let rows = scan_comments(conn, target, false).map_err(CoreError::Internal)?;
    let by_id: HashMap<i64, &CommentRecord> = rows.iter().map(|r| (r.id, r)).collect();
    let mut violations = Vec::new();

    for group in rows.chunk_by(|a, b| a.group_id == b.group_id) {
        check_group(group, &by_id, policy, &mut violations);
    }

    let backward: Vec<CommentRecord> = rows
        .chunk_by(|a, b| a.group_id == b.group_id)
        .flat_map(|group| group.iter().rev().cloned())
        .collect();
    // Duplicate positions are already reported above; counts are meaningless then.
    if let Ok(expected) = tally(&backward) {
        for row in &rows {
            let count = expected.counts.get(&row.id).copied().unwrap_or(0);
            if count != row.nested_count {
                violations.push(IntegrityViolation {
                    comment_id: row.id,
                    group_id: row.group_id,
                    kind: ViolationKind::NestedCountDrift {
                        stored: row.nested_count,
                        expected: count,
                    },
                });
            }
        }
    }

    Ok(violations)
}

fn check_group(
    group: &[CommentRecord],
    by_id: &HashMap<i64, &CommentRecord>,
    policy: &dyn TargetPolicy,
    violations: &mut Vec<IntegrityViolation>,
) {
    let mut ancestors: Vec<(i64, i64)> = Vec::new();
    let mut last_position = None;
    let mut limits: HashMap<&str, i64> = HashMap::new();

    for row in group {
        let mut report = |kind| {
            violations.push(IntegrityViolation {
                comment_id: row.id,
                group_id: row.group_id,
                kind,
            });
        };

        if last_position == Some(row.position) {
            report(ViolationKind::DuplicatePosition {
                position: row.position,
            });
        }
        last_position = Some(row.position);

        let max_level = *limits
            .entry(row.target_type.as_str())
            .or_insert_with(|| policy.max_thread_level(&row.target_type));
        if row.level > max_level {
            report(ViolationKind::TooDeep {
                level: row.level,
                max_level,
            });
        }

        if row.is_root() {
            if row.group_id != row.id || row.level != 0 {
                report(ViolationKind::MalformedRoot);
            }
            ancestors.clear();
            ancestors.push((row.id, row.level));
            continue;
        }

        match by_id.get(&row.parent_id) {
            None => report(ViolationKind::MissingParent {
                parent_id: row.parent_id,
            }),
            Some(parent) => {
                if parent.group_id != row.group_id {
                    report(ViolationKind::GroupMismatch {
                        parent_id: parent.id,
                        parent_group_id: parent.group_id,
                    });
                }
                if row.level != parent.level + 1 {
                    report(ViolationKind::LevelMismatch {
                        expected: parent.level + 1,
                        actual: row.level,
                    });
                }
            }
        }

        while ancestors.last().is_some_and(|&(_, level)| level >= row.level) {
            ancestors.pop();
        }
        if ancestors.last().map(|&(id, _)| id) != Some(row.parent_id) {
            report(ViolationKind::OutOfOrder {
                parent_id: row.parent_id,
            });
        }
        ancestors.push((row.id, row.level));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::counts::NestedCountTracker;
    use crate::core::placement::ThreadPlacer;
    use crate::policy::StaticPolicy;
    use crate::store::{CommentDb, NewComment};

    fn setup_db() -> CommentDb {
        let db = CommentDb::open_in_memory().unwrap();
        db.init_schema().unwrap();
        db
    }

    fn article() -> Target {
        Target::new("article", "1")
    }

    fn post(db: &CommentDb, policy: &StaticPolicy, reply_to: Option<i64>) -> i64 {
        let record = ThreadPlacer::new(policy)
            .place(db.conn(), &NewComment::new(article(), "t", "body"), reply_to)
            .unwrap()
            .record;
        NestedCountTracker::on_insert(db.conn(), &record).unwrap();
        record.id
    }

    /// Root, two children, grandchildren in mixed arrival order.
    fn seed(db: &CommentDb, policy: &StaticPolicy) -> (i64, i64, i64) {
        let root = post(db, policy, None);
        let a = post(db, policy, Some(root));
        let b = post(db, policy, Some(root));
        post(db, policy, Some(b));
        let a1 = post(db, policy, Some(a));
        post(db, policy, Some(a1));
        post(db, policy, Some(a));
        post(db, policy, None);
        (root, a, b)
    }

    #[test]
    fn test_placed_threads_are_sound() {
        let db = setup_db();
        let policy = StaticPolicy::uniform(3);
        seed(&db, &policy);

        let violations = verify(db.conn(), &policy, Some(&article())).unwrap();
        assert!(violations.is_empty(), "{violations:?}");
        assert!(verify(db.conn(), &policy, None).unwrap().is_empty());
    }

    #[test]
    fn test_ancestor_chain_precedes_each_comment() {
        let db = setup_db();
        let policy = StaticPolicy::uniform(3);
        let (root, _, _) = seed(&db, &policy);

        // Every comment's nearest shallower predecessor is its parent.
        let group = db.list_group(root).unwrap();
        for (index, comment) in group.iter().enumerate().skip(1) {
            let predecessor = group[..index]
                .iter()
                .rev()
                .find(|c| c.level < comment.level)
                .unwrap();
            assert_eq!(predecessor.id, comment.parent_id);
            assert_eq!(comment.level, predecessor.level + 1);
            assert_eq!(comment.group_id, predecessor.group_id);
        }
    }

    #[test]
    fn test_detects_out_of_order() {
        let db = setup_db();
        let policy = StaticPolicy::uniform(3);
        let (_, a, b) = seed(&db, &policy);

        // Move b ahead of a's subtree without moving b's child.
        let a_position = db.get_comment(a).unwrap().unwrap().position;
        db.conn()
            .execute(
                "UPDATE comments SET position = ? WHERE id = ?",
                rusqlite::params![a_position - 1, b],
            )
            .unwrap();

        let violations = verify(db.conn(), &policy, Some(&article())).unwrap();
        assert!(violations
            .iter()
            .any(|v| matches!(v.kind, ViolationKind::DuplicatePosition { .. })));
        assert!(violations
            .iter()
            .any(|v| matches!(v.kind, ViolationKind::OutOfOrder { .. })));
    }

    #[test]
    fn test_detects_drift() {
        let db = setup_db();
        let policy = StaticPolicy::uniform(3);
        let (root, _, _) = seed(&db, &policy);
        db.conn()
            .execute("UPDATE comments SET nested_count = 0 WHERE id = ?", [root])
            .unwrap();

        let violations = verify(db.conn(), &policy, None).unwrap();
        assert_eq!(
            violations,
            vec![IntegrityViolation {
                comment_id: root,
                group_id: root,
                kind: ViolationKind::NestedCountDrift {
                    stored: 0,
                    expected: 6,
                },
            }]
        );
    }

    #[test]
    fn test_detects_depth_over_policy() {
        let db = setup_db();
        let policy = StaticPolicy::uniform(3);
        seed(&db, &policy);

        let stricter = StaticPolicy::uniform(1);
        let violations = verify(db.conn(), &stricter, None).unwrap();
        assert_eq!(
            violations
                .iter()
                .filter(|v| matches!(v.kind, ViolationKind::TooDeep { .. }))
                .count(),
            4
        );
    }
}
