//! Moderation service: publish, unpublish, remove, restore.
//!
//! A comment counts toward its ancestors only while it is public and not
//! removed. Each action flips one flag; ancestors are adjusted only when the
//! flip changes that effective visibility.

use serde::Serialize;
use tracing::info;

use crate::store::query::{fetch_comment, set_flags};
use crate::store::{CommentDb, CommentRecord};

use super::counts::NestedCountTracker;
use super::{begin_write, commit_write, CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum ModerationAction {
    Publish,
    Unpublish,
    Remove,
    Restore,
}

impl ModerationAction {
    /// Flags after applying this action to `(is_public, is_removed)`.
    const fn apply(self, is_public: bool, is_removed: bool) -> (bool, bool) {
        match self {
            Self::Publish => (true, is_removed),
            Self::Unpublish => (false, is_removed),
            Self::Remove => (is_public, true),
            Self::Restore => (is_public, false),
        }
    }
}

impl std::fmt::Display for ModerationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Publish => "publish",
            Self::Unpublish => "unpublish",
            Self::Remove => "remove",
            Self::Restore => "restore",
        };
        f.write_str(name)
    }
}

/// Result of a moderation action.
#[derive(Debug, Clone, Serialize)]
pub struct ModerationOutcome {
    /// The comment after the action.
    pub comment: CommentRecord,
    pub visibility_changed: bool,
    pub ancestors_updated: usize,
}

/// Service for moderation operations.
pub struct ModerationService<'a> {
    db: &'a CommentDb,
}

impl<'a> ModerationService<'a> {
    pub(crate) const fn new(db: &'a CommentDb) -> Self {
        Self { db }
    }

    /// Apply an action in one transaction.
    ///
    /// An action that leaves the flags unchanged writes nothing.
    pub fn apply(&self, comment_id: i64, action: ModerationAction) -> CoreResult<ModerationOutcome> {
        let tx = begin_write(self.db.conn())?;
        let mut comment =
            fetch_comment(&tx, comment_id)?.ok_or(CoreError::CommentNotFound { comment_id })?;

        let was_visible = comment.is_visible();
        let (is_public, is_removed) = action.apply(comment.is_public, comment.is_removed);
        if (is_public, is_removed) == (comment.is_public, comment.is_removed) {
            return Ok(ModerationOutcome {
                comment,
                visibility_changed: false,
                ancestors_updated: 0,
            });
        }

        set_flags(&tx, comment_id, is_public, is_removed).map_err(CoreError::from_write)?;
        comment.is_public = is_public;
        comment.is_removed = is_removed;

        let now_visible = comment.is_visible();
        let ancestors_updated = if now_visible == was_visible {
            0
        } else {
            NestedCountTracker::on_visibility_change(&tx, comment_id, now_visible)?
        };
        commit_write(tx)?;

        info!(
            comment_id,
            %action,
            visible = now_visible,
            ancestors_updated,
            "moderated comment"
        );
        Ok(ModerationOutcome {
            comment,
            visibility_changed: now_visible != was_visible,
            ancestors_updated,
        })
    }

    pub fn publish(&self, comment_id: i64) -> CoreResult<ModerationOutcome> {
        self.apply(comment_id, ModerationAction::Publish)
    }

    pub fn unpublish(&self, comment_id: i64) -> CoreResult<ModerationOutcome> {
        self.apply(comment_id, ModerationAction::Unpublish)
    }

    pub fn remove(&self, comment_id: i64) -> CoreResult<ModerationOutcome> {
        self.apply(comment_id, ModerationAction::Remove)
    }

    pub fn restore(&self, comment_id: i64) -> CoreResult<ModerationOutcome> {
        self.apply(comment_id, ModerationAction::Restore)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::services;
    use crate::core::ThreadServices;
    use crate::store::{NewComment, Target};

    fn post(services: &ThreadServices, reply_to: Option<i64>) -> i64 {
        services
            .comments()
            .post(
                &NewComment::new(Target::new("article", "1"), "t", "body"),
                reply_to,
            )
            .unwrap()
            .record
            .id
    }

    fn nested(services: &ThreadServices, id: i64) -> i64 {
        services.comments().get(id).unwrap().nested_count
    }

    #[test]
    fn test_remove_and_restore_cascade() {
        let services = services(3);
        let root = post(&services, None);
        let a = post(&services, Some(root));
        let a1 = post(&services, Some(a));
        post(&services, Some(a1));

        let outcome = services.moderation().remove(a1).unwrap();
        assert!(outcome.visibility_changed);
        assert_eq!(outcome.ancestors_updated, 2);
        assert_eq!(nested(&services, root), 2);
        assert_eq!(nested(&services, a), 1);
        // The removed comment keeps its own count.
        assert_eq!(nested(&services, a1), 1);

        services.moderation().restore(a1).unwrap();
        assert_eq!(nested(&services, root), 3);
        assert_eq!(nested(&services, a), 2);
    }

    #[test]
    fn test_repeated_action_is_noop() {
        let services = services(2);
        let root = post(&services, None);
        let reply = post(&services, Some(root));

        services.moderation().unpublish(reply).unwrap();
        let second = services.moderation().unpublish(reply).unwrap();
        assert!(!second.visibility_changed);
        assert_eq!(second.ancestors_updated, 0);
        assert_eq!(nested(&services, root), 0);
    }

    #[test]
    fn test_flag_change_without_visibility_change() {
        let services = services(2);
        let root = post(&services, None);
        let reply = post(&services, Some(root));

        services.moderation().unpublish(reply).unwrap();
        let removed = services.moderation().remove(reply).unwrap();
        assert!(!removed.visibility_changed);
        assert!(removed.comment.is_removed);

        // Publishing alone does not bring back a removed comment.
        let published = services.moderation().publish(reply).unwrap();
        assert!(!published.visibility_changed);
        assert_eq!(nested(&services, root), 0);

        let restored = services.moderation().restore(reply).unwrap();
        assert!(restored.visibility_changed);
        assert_eq!(nested(&services, root), 1);
    }

    #[test]
    fn test_publish_hidden_reply() {
        let services = services(2);
        let root = post(&services, None);
        let pending = services
            .comments()
            .post(
                &NewComment::new(Target::new("article", "1"), "t", "pending").hidden(),
                Some(root),
            )
            .unwrap()
            .record
            .id;
        assert_eq!(nested(&services, root), 0);

        services.moderation().publish(pending).unwrap();
        assert_eq!(nested(&services, root), 1);
    }

    #[test]
    fn test_unknown_comment() {
        let services = services(2);
        assert!(matches!(
            services.moderation().remove(9),
            Err(CoreError::CommentNotFound { comment_id: 9 })
        ));
    }
}
