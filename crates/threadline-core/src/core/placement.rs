//! Thread placement: assigns group, level and position to a new comment.
//!
//! Positions form a per-group total order in which every comment is
//! followed by its whole subtree before the next sibling of any ancestor.
//! A reply is inserted where its parent's subtree ends; everything from
//! that point on is shifted down by one in a single range update.

use rusqlite::Connection;
use tracing::debug;

use crate::policy::TargetPolicy;
use crate::store::query::{
    fetch_comment, insert_comment, max_group_position, max_root_position, shift_positions,
    subtree_boundary,
};
use crate::store::{CommentRecord, NewComment};

use super::{CoreError, CoreResult};

/// Outcome of placing a comment.
#[derive(Debug, Clone)]
pub struct Placement {
    /// The stored comment with its thread fields set.
    pub record: CommentRecord,
    /// How many existing comments moved down to make room.
    pub shifted: usize,
}

/// Computes `(group_id, level, position)` for new comments.
pub struct ThreadPlacer<'a> {
    policy: &'a dyn TargetPolicy,
}

impl<'a> ThreadPlacer<'a> {
    #[must_use]
    pub fn new(policy: &'a dyn TargetPolicy) -> Self {
        Self { policy }
    }

    /// Place and insert `new`, as a root or as a reply to `reply_to`.
    ///
    /// Runs against `conn` without opening a transaction; the caller must
    /// hold one so the shift and the insert commit together. On
    /// `ThreadDepthExceeded` nothing has been written.
    pub fn place(
        &self,
        conn: &Connection,
        new: &NewComment,
        reply_to: Option<i64>,
    ) -> CoreResult<Placement> {
        let (id, shifted) = match reply_to {
            None => {
                let position = max_root_position(conn, &new.target)
                    .map_err(CoreError::from_write)?
                    .map_or(1, |max| max + 1);
                let id = insert_comment(conn, new, None, 0, position)
                    .map_err(CoreError::from_write)?;
                debug!(id, position, target = %new.target, "placed root comment");
                (id, 0)
            }
            Some(parent_id) => self.place_reply(conn, new, parent_id)?,
        };

        let record = fetch_comment(conn, id)
            .map_err(CoreError::from_write)?
            .ok_or(CoreError::CommentNotFound { comment_id: id })?;
        Ok(Placement { record, shifted })
    }

    fn place_reply(
        &self,
        conn: &Connection,
        new: &NewComment,
        parent_id: i64,
    ) -> CoreResult<(i64, usize)> {
        let parent = fetch_comment(conn, parent_id)
            .map_err(CoreError::from_write)?
            .ok_or(CoreError::ParentNotFound { parent_id })?;

        if parent.target() != new.target {
            return Err(CoreError::TargetMismatch {
                parent_id,
                parent: parent.target().to_string(),
                reply: new.target.to_string(),
            });
        }

        let max_level = self.policy.max_thread_level(&parent.target_type);
        if parent.level >= max_level {
            return Err(CoreError::ThreadDepthExceeded {
                parent_id,
                level: parent.level,
                max_level,
            });
        }

        let group_id = parent.group_id;
        let boundary = subtree_boundary(conn, group_id, parent.level, parent.position)
            .map_err(CoreError::from_write)?;

        let (position, shifted) = match boundary {
            Some(position) => {
                let shifted =
                    shift_positions(conn, group_id, position).map_err(CoreError::from_write)?;
                (position, shifted)
            }
            None => {
                let position = max_group_position(conn, group_id)
                    .map_err(CoreError::from_write)?
                    .map_or(parent.position + 1, |max| max + 1);
                (position, 0)
            }
        };

        let level = parent.level + 1;
        let id = insert_comment(conn, new, Some((group_id, parent_id)), level, position)
            .map_err(CoreError::from_write)?;
        debug!(id, parent_id, group_id, level, position, shifted, "placed reply");
        Ok((id, shifted))
    }
}
