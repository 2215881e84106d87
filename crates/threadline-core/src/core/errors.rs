//! Typed error types for the threadline-core service layer.

use thiserror::Error;

/// Result type alias for core service operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in the threadline-core service layer.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The threadline directory is not initialized.
    #[error("Not a threadline store at {path}. Run 'threadline init' first.")]
    NotInitialized { path: String },

    /// The reply would nest deeper than the target allows.
    #[error("Comment {parent_id} is at level {level}; replies are limited to level {max_level}")]
    ThreadDepthExceeded {
        parent_id: i64,
        level: i64,
        max_level: i64,
    },

    /// Another writer held the store during placement. Nothing was committed,
    /// so the same call may be retried.
    #[error("Placement conflicted with a concurrent write; retry the operation")]
    PlacementConflict,

    /// The caller broke an input contract (unsorted groups, negative sizes).
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// A page number outside the paginated range.
    #[error("Page {number} does not exist (1..={num_pages})")]
    InvalidPage { number: usize, num_pages: usize },

    /// A comment was not found.
    #[error("Comment not found: {comment_id}")]
    CommentNotFound { comment_id: i64 },

    /// The comment being replied to was not found.
    #[error("Parent comment not found: {parent_id}")]
    ParentNotFound { parent_id: i64 },

    /// A reply names a different target than its parent.
    #[error("Reply targets {reply} but parent {parent_id} belongs to {parent}")]
    TargetMismatch {
        parent_id: i64,
        parent: String,
        reply: String,
    },

    /// Two comments of one group share a position.
    #[error("Group {group_id} has more than one comment at position {position}")]
    DuplicatePosition { group_id: i64, position: i64 },

    /// An internal storage or database error.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CoreError {
    pub(crate) fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Map a storage error, turning lock contention into `PlacementConflict`.
    pub(crate) fn from_write(err: anyhow::Error) -> Self {
        let contended = err.chain().any(|cause| {
            matches!(
                cause.downcast_ref::<rusqlite::Error>(),
                Some(rusqlite::Error::SqliteFailure(failure, _))
                    if matches!(
                        failure.code,
                        rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                    )
            )
        });
        if contended {
            Self::PlacementConflict
        } else {
            Self::Internal(err)
        }
    }

    /// Whether re-running the same operation may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::PlacementConflict)
    }
}
