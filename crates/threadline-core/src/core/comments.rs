//! Comment service: post (root or reply), get, list.

use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use crate::policy::TargetPolicy;
use crate::store::{CommentDb, CommentRecord, NewComment, Target};

use super::counts::NestedCountTracker;
use super::placement::{Placement, ThreadPlacer};
use super::{begin_write, commit_write, CoreError, CoreResult};

/// Pause before retry `n` is `n` times this.
const RETRY_BACKOFF: Duration = Duration::from_millis(20);

/// Service for comment operations.
pub struct CommentService<'a> {
    db: &'a CommentDb,
    policy: &'a dyn TargetPolicy,
    attempts: u32,
}

impl<'a> CommentService<'a> {
    pub(crate) fn new(db: &'a CommentDb, policy: &'a dyn TargetPolicy, attempts: u32) -> Self {
        Self {
            db,
            policy,
            attempts,
        }
    }

    /// Post a comment as a new root, or as a reply to `reply_to`.
    ///
    /// Placement, sibling renumbering and ancestor counts commit in one
    /// transaction. A `PlacementConflict` left nothing behind and may be
    /// retried with the same arguments.
    pub fn post(&self, new: &NewComment, reply_to: Option<i64>) -> CoreResult<Placement> {
        let tx = begin_write(self.db.conn())?;
        let placement = ThreadPlacer::new(self.policy).place(&tx, new, reply_to)?;
        let ancestors = NestedCountTracker::on_insert(&tx, &placement.record)?;
        commit_write(tx)?;

        info!(
            id = placement.record.id,
            group_id = placement.record.group_id,
            level = placement.record.level,
            position = placement.record.position,
            ancestors,
            "posted comment"
        );
        Ok(placement)
    }

    /// Like [`post`](Self::post), retrying on `PlacementConflict` up to the
    /// configured number of attempts, with a linear backoff between them.
    pub fn post_with_retry(
        &self,
        new: &NewComment,
        reply_to: Option<i64>,
    ) -> CoreResult<Placement> {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.post(new, reply_to) {
                Err(err) if err.is_retryable() && attempt < attempts => {
                    warn!(attempt, attempts, "placement conflicted, retrying");
                    thread::sleep(RETRY_BACKOFF * attempt);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Get a comment by id.
    ///
    /// Returns `Err(CoreError::CommentNotFound)` if it does not exist.
    pub fn get(&self, comment_id: i64) -> CoreResult<CommentRecord> {
        self.db
            .get_comment(comment_id)?
            .ok_or(CoreError::CommentNotFound { comment_id })
    }

    /// List a target's comments in thread order.
    pub fn list(&self, target: &Target, visible_only: bool) -> CoreResult<Vec<CommentRecord>> {
        Ok(self.db.list_target(target, visible_only)?)
    }

    /// Every comment of the thread containing `comment_id`, in thread order.
    pub fn thread(&self, comment_id: i64) -> CoreResult<Vec<CommentRecord>> {
        let comment = self.get(comment_id)?;
        Ok(self.db.list_group(comment.group_id)?)
    }
}
