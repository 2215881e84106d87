//! Page service: thread-aware pages of a target's visible comments.

use anyhow::Context;
use serde::Serialize;
use tracing::debug;

use crate::paginate::{slice_for_page, PageSettings, Paginator};
use crate::store::{CommentDb, CommentRecord, Target};

use super::{CoreError, CoreResult};

/// One rendered page of comments.
#[derive(Debug, Clone, Serialize)]
pub struct CommentPage {
    pub number: usize,
    pub num_pages: usize,
    pub has_next: bool,
    pub has_previous: bool,
    /// Visible comments across all pages.
    pub count: i64,
    /// Comments on this page.
    pub size: i64,
    pub comments: Vec<CommentRecord>,
}

/// Service for pagination.
pub struct PageService<'a> {
    db: &'a CommentDb,
    settings: PageSettings,
}

impl<'a> PageService<'a> {
    pub(crate) const fn new(db: &'a CommentDb, settings: PageSettings) -> Self {
        Self { db, settings }
    }

    /// Paginate a target's visible root groups.
    ///
    /// `settings` overrides the configured page settings for this call.
    pub fn paginator(
        &self,
        target: &Target,
        settings: Option<PageSettings>,
    ) -> CoreResult<Paginator> {
        let groups = self.db.root_groups(target)?;
        Paginator::new(&groups, settings.unwrap_or(self.settings))
    }

    /// Get page `number` (1-based) of a target.
    ///
    /// Groups and comments are read from one snapshot, so a concurrent post
    /// cannot tear a thread across the page boundary.
    pub fn page(
        &self,
        target: &Target,
        number: usize,
        settings: Option<PageSettings>,
    ) -> CoreResult<CommentPage> {
        let snapshot = self
            .db
            .conn()
            .unchecked_transaction()
            .context("Failed to begin read transaction")?;

        let paginator = self.paginator(target, settings)?;
        let page = paginator.page(number)?;
        let comments = self.db.list_target(target, true)?;
        let selected: Vec<CommentRecord> = slice_for_page(&comments, page)?
            .into_iter()
            .cloned()
            .collect();
        drop(snapshot);

        debug!(
            target = %target,
            number,
            num_pages = paginator.num_pages(),
            groups = page.group_ids.len(),
            "built page"
        );
        Ok(CommentPage {
            number,
            num_pages: paginator.num_pages(),
            has_next: paginator.has_next(number),
            has_previous: paginator.has_previous(number),
            count: paginator.count(),
            size: page.size,
            comments: selected,
        })
    }

    /// The page on which a comment's thread appears.
    ///
    /// `None` when the thread is not paginated (its root is hidden).
    pub fn page_for_comment(
        &self,
        comment_id: i64,
        settings: Option<PageSettings>,
    ) -> CoreResult<Option<usize>> {
        let comment = self
            .db
            .get_comment(comment_id)?
            .ok_or(CoreError::CommentNotFound { comment_id })?;
        let paginator = self.paginator(&comment.target(), settings)?;
        Ok(paginator.page_of_group(comment.group_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::services;
    use crate::core::ThreadServices;
    use crate::store::NewComment;

    fn article() -> Target {
        Target::new("article", "1")
    }

    fn settings(page_size: i64, orphans: i64) -> Option<PageSettings> {
        Some(PageSettings {
            page_size,
            orphans,
            allow_empty_first_page: true,
        })
    }

    /// A root with `replies` direct replies; returns the root id.
    fn thread(services: &ThreadServices, replies: usize) -> i64 {
        let comments = services.comments();
        let root = comments
            .post(&NewComment::new(article(), "t", "root"), None)
            .unwrap()
            .record
            .id;
        for _ in 0..replies {
            comments
                .post(&NewComment::new(article(), "t", "reply"), Some(root))
                .unwrap();
        }
        root
    }

    #[test]
    fn test_threads_stay_whole() {
        let services = services(2);
        // Group sizes 3, 4, 2.
        let first = thread(&services, 2);
        let second = thread(&services, 3);
        let third = thread(&services, 1);

        let pages = services.pages();
        let page1 = pages.page(&article(), 1, settings(5, 0)).unwrap();
        assert_eq!(page1.num_pages, 3);
        assert_eq!(page1.count, 9);
        assert_eq!(page1.size, 3);
        assert!(page1.comments.iter().all(|c| c.group_id == first));
        assert!(page1.has_next);
        assert!(!page1.has_previous);

        let page2 = pages.page(&article(), 2, settings(5, 0)).unwrap();
        assert!(page2.comments.iter().all(|c| c.group_id == second));
        assert_eq!(page2.comments.len(), 4);

        assert_eq!(
            pages.page_for_comment(third, settings(5, 0)).unwrap(),
            Some(3)
        );
    }

    #[test]
    fn test_orphans_merge_last_groups() {
        let services = services(2);
        thread(&services, 2);
        thread(&services, 3);
        let last = thread(&services, 1);

        let page = services.pages().page(&article(), 2, settings(5, 2)).unwrap();
        assert_eq!(page.num_pages, 2);
        assert_eq!(page.size, 6);
        assert!(page.comments.iter().any(|c| c.group_id == last));
    }

    #[test]
    fn test_hidden_comments_not_paginated() {
        let services = services(2);
        let root = thread(&services, 2);
        let hidden_root = thread(&services, 1);
        services.moderation().unpublish(hidden_root).unwrap();

        let reply = services.comments().thread(root).unwrap()[1].id;
        services.moderation().remove(reply).unwrap();

        let page = services.pages().page(&article(), 1, settings(10, 0)).unwrap();
        assert_eq!(page.num_pages, 1);
        assert_eq!(page.size, 2);
        assert_eq!(page.comments.len(), 2);
        assert_eq!(
            services.pages().page_for_comment(hidden_root, None).unwrap(),
            None
        );
    }

    #[test]
    fn test_empty_target() {
        let services = services(2);
        let page = services.pages().page(&article(), 1, None).unwrap();
        assert_eq!(page.num_pages, 1);
        assert!(page.comments.is_empty());

        let strict = Some(PageSettings {
            page_size: 10,
            orphans: 0,
            allow_empty_first_page: false,
        });
        assert!(matches!(
            services.pages().page(&article(), 1, strict),
            Err(CoreError::InvalidPage {
                number: 1,
                num_pages: 0
            })
        ));
    }

    #[test]
    fn test_out_of_range_page() {
        let services = services(2);
        thread(&services, 0);
        assert!(matches!(
            services.pages().page(&article(), 2, None),
            Err(CoreError::InvalidPage { number: 2, .. })
        ));
        assert!(matches!(
            services.pages().page(&article(), 0, None),
            Err(CoreError::InvalidPage { number: 0, .. })
        ));
    }
}
