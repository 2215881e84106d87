//! Thread-aware pagination.
//!
//! Pages are packed from whole root-level groups: a thread is never split
//! across pages, even when it alone is larger than the page size. When
//! the groups left over after a full page fit within
//! `page_size + orphans`, they all go on one final page instead of being
//! spread over a near-empty trailing page.
//!
//! Pagination is a pure computation over an already sorted snapshot. It
//! never re-sorts; unsorted input is rejected.

use std::collections::HashSet;
use std::ops::RangeInclusive;

use serde::Serialize;

use crate::core::{CoreError, CoreResult};
use crate::store::CommentRecord;

/// A root comment and the size of its visible thread (`1 + nested_count`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RootGroup {
    pub group_id: i64,
    pub position: i64,
    pub size: i64,
}

impl RootGroup {
    #[must_use]
    pub const fn new(group_id: i64, position: i64, size: i64) -> Self {
        Self {
            group_id,
            position,
            size,
        }
    }
}

/// Pagination knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageSettings {
    /// Nominal comments per page; 0 disables pagination.
    pub page_size: i64,
    pub orphans: i64,
    pub allow_empty_first_page: bool,
}

/// One page: a run of consecutive root groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    /// 1-based page number.
    pub number: usize,
    /// Index of the first group on this page in the paginated sequence.
    pub first_group: usize,
    pub group_ids: Vec<i64>,
    /// Number of comments on the page.
    pub size: i64,
}

impl Page {
    fn new(number: usize, first_group: usize) -> Self {
        Self {
            number,
            first_group,
            group_ids: Vec::new(),
            size: 0,
        }
    }

    fn push(&mut self, group: &RootGroup) {
        self.group_ids.push(group.group_id);
        self.size += group.size;
    }

    /// Index of the first group on this page.
    #[must_use]
    pub const fn start_group(&self) -> usize {
        self.first_group
    }

    /// Index one past the last group on this page.
    #[must_use]
    pub fn end_group(&self) -> usize {
        self.first_group + self.group_ids.len()
    }

    #[must_use]
    pub fn contains_group(&self, group_id: i64) -> bool {
        self.group_ids.contains(&group_id)
    }
}

/// Partition root groups into pages without splitting a group.
///
/// `root_groups` must be strictly ascending by `(group_id, position)`.
/// A `page_size` of 0 puts everything on a single page. Empty input yields
/// no pages.
pub fn paginate(
    root_groups: &[RootGroup],
    page_size: i64,
    orphan_budget: i64,
) -> CoreResult<Vec<Page>> {
    if page_size < 0 {
        return Err(CoreError::invalid_input(format!(
            "page_size must not be negative (got {page_size})"
        )));
    }
    if orphan_budget < 0 {
        return Err(CoreError::invalid_input(format!(
            "orphan budget must not be negative (got {orphan_budget})"
        )));
    }
    check_groups(root_groups)?;

    if root_groups.is_empty() {
        return Ok(Vec::new());
    }

    if page_size == 0 {
        let mut page = Page::new(1, 0);
        for group in root_groups {
            page.push(group);
        }
        return Ok(vec![page]);
    }

    let mut remaining: i64 = root_groups.iter().map(|g| g.size).sum();
    let mut pages = Vec::new();
    let mut current = Page::new(1, 0);

    for (index, group) in root_groups.iter().enumerate() {
        if current.size == 0 || current.size + group.size <= page_size {
            current.push(group);
            remaining -= group.size;
            continue;
        }

        // Overflow: the current page is done either way.
        let next_number = current.number + 1;
        pages.push(std::mem::replace(&mut current, Page::new(next_number, index)));

        if remaining <= page_size + orphan_budget {
            for rest in &root_groups[index..] {
                current.push(rest);
            }
            remaining = 0;
            break;
        }

        current.push(group);
        remaining -= group.size;
    }

    if current.size > 0 {
        pages.push(current);
    }
    debug_assert_eq!(remaining, 0);

    Ok(pages)
}

/// Groups must be strictly ascending and non-empty.
fn check_groups(root_groups: &[RootGroup]) -> CoreResult<()> {
    for group in root_groups {
        if group.size < 1 {
            return Err(CoreError::invalid_input(format!(
                "group {} has size {}; every group holds at least its root",
                group.group_id, group.size
            )));
        }
    }
    for pair in root_groups.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if (prev.group_id, prev.position) >= (next.group_id, next.position) {
            return Err(CoreError::invalid_input(format!(
                "root groups are not sorted by (group_id, position): \
                 ({}, {}) precedes ({}, {})",
                prev.group_id, prev.position, next.group_id, next.position
            )));
        }
    }
    Ok(())
}

/// Pages over a sequence of root groups, with page-number lookups.
#[derive(Debug, Clone, Serialize)]
pub struct Paginator {
    pages: Vec<Page>,
    settings: PageSettings,
    count: i64,
}

impl Paginator {
    /// Paginate `root_groups` with the given settings.
    ///
    /// With `allow_empty_first_page`, empty input still yields one empty page.
    pub fn new(root_groups: &[RootGroup], settings: PageSettings) -> CoreResult<Self> {
        let mut pages = paginate(root_groups, settings.page_size, settings.orphans)?;
        if pages.is_empty() && settings.allow_empty_first_page {
            pages.push(Page::new(1, 0));
        }
        let count = pages.iter().map(|p| p.size).sum();
        Ok(Self {
            pages,
            settings,
            count,
        })
    }

    #[must_use]
    pub fn num_pages(&self) -> usize {
        self.pages.len()
    }

    /// Total comments across all pages.
    #[must_use]
    pub const fn count(&self) -> i64 {
        self.count
    }

    #[must_use]
    pub const fn settings(&self) -> &PageSettings {
        &self.settings
    }

    #[must_use]
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Valid page numbers, 1-based.
    #[must_use]
    pub fn page_range(&self) -> RangeInclusive<usize> {
        1..=self.num_pages()
    }

    /// Get a page by its 1-based number.
    pub fn page(&self, number: usize) -> CoreResult<&Page> {
        number
            .checked_sub(1)
            .and_then(|index| self.pages.get(index))
            .ok_or(CoreError::InvalidPage {
                number,
                num_pages: self.num_pages(),
            })
    }

    #[must_use]
    pub fn has_next(&self, number: usize) -> bool {
        number < self.num_pages()
    }

    #[must_use]
    pub const fn has_previous(&self, number: usize) -> bool {
        number > 1
    }

    /// The page number holding a group, if the group was paginated.
    #[must_use]
    pub fn page_of_group(&self, group_id: i64) -> Option<usize> {
        self.pages
            .iter()
            .find(|page| page.contains_group(group_id))
            .map(|page| page.number)
    }
}

/// The comments of a page, taken from a `(group_id, position)`-sorted list.
pub fn slice_for_page<'a>(
    comments: &'a [CommentRecord],
    page: &Page,
) -> CoreResult<Vec<&'a CommentRecord>> {
    for pair in comments.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if (prev.group_id, prev.position) >= (next.group_id, next.position) {
            return Err(CoreError::invalid_input(format!(
                "comments are not sorted by (group_id, position): \
                 comment {} precedes comment {}",
                prev.id, next.id
            )));
        }
    }

    let groups: HashSet<i64> = page.group_ids.iter().copied().collect();
    Ok(comments
        .iter()
        .filter(|comment| groups.contains(&comment.group_id))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups(sizes: &[i64]) -> Vec<RootGroup> {
        sizes
            .iter()
            .zip(1_i64..)
            .map(|(&size, n)| RootGroup::new(n * 100, n, size))
            .collect()
    }

    fn sizes(pages: &[Page]) -> Vec<i64> {
        pages.iter().map(|p| p.size).collect()
    }

    fn settings(page_size: i64, orphans: i64, allow_empty_first_page: bool) -> PageSettings {
        PageSettings {
            page_size,
            orphans,
            allow_empty_first_page,
        }
    }

    #[test]
    fn test_worked_example_three_pages() {
        let input = groups(&[11, 11, 11, 11, 11, 11, 6, 5]);
        let pages = paginate(&input, 25, 10).unwrap();

        assert_eq!(sizes(&pages), vec![22, 22, 33]);
        assert_eq!(pages[0].group_ids, vec![100, 200]);
        assert_eq!(pages[1].group_ids, vec![300, 400]);
        assert_eq!(pages[2].group_ids, vec![500, 600, 700, 800]);
        assert_eq!(pages[2].first_group, 4);
        assert_eq!(
            pages.iter().map(|p| p.number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_orphans_join_final_page() {
        let pages = paginate(&groups(&[25, 25, 9]), 25, 10).unwrap();
        assert_eq!(sizes(&pages), vec![25, 34]);
    }

    #[test]
    fn test_small_tail_groups_share_page() {
        let pages = paginate(&groups(&[25, 9, 9]), 25, 10).unwrap();
        assert_eq!(sizes(&pages), vec![25, 18]);
    }

    #[test]
    fn test_oversized_group_gets_own_page() {
        let pages = paginate(&groups(&[3, 51, 4]), 25, 0).unwrap();
        assert_eq!(sizes(&pages), vec![3, 51, 4]);
    }

    #[test]
    fn test_without_orphans_tail_gets_own_page() {
        let pages = paginate(&groups(&[20, 20, 8]), 25, 0).unwrap();
        assert_eq!(sizes(&pages), vec![20, 20, 8]);

        let pages = paginate(&groups(&[20, 20, 8]), 25, 5).unwrap();
        assert_eq!(sizes(&pages), vec![20, 28]);
    }

    #[test]
    fn test_tail_that_fits_stays_with_last_group() {
        let pages = paginate(&groups(&[20, 20, 2]), 25, 0).unwrap();
        assert_eq!(sizes(&pages), vec![20, 22]);
    }

    #[test]
    fn test_exact_fit() {
        let pages = paginate(&groups(&[10, 15, 10, 15]), 25, 0).unwrap();
        assert_eq!(sizes(&pages), vec![25, 25]);
    }

    #[test]
    fn test_zero_page_size_disables_pagination() {
        let pages = paginate(&groups(&[30, 30, 30]), 0, 0).unwrap();
        assert_eq!(sizes(&pages), vec![90]);
        assert_eq!(pages[0].group_ids.len(), 3);
    }

    #[test]
    fn test_empty_input_yields_no_pages() {
        assert!(paginate(&[], 25, 10).unwrap().is_empty());
        assert!(paginate(&[], 0, 0).unwrap().is_empty());
    }

    #[test]
    fn test_negative_settings_rejected() {
        let input = groups(&[1]);
        assert!(matches!(
            paginate(&input, -1, 0),
            Err(CoreError::InvalidInput { .. })
        ));
        assert!(matches!(
            paginate(&input, 25, -1),
            Err(CoreError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_unsorted_input_rejected() {
        let input = vec![RootGroup::new(2, 2, 1), RootGroup::new(1, 1, 1)];
        assert!(matches!(
            paginate(&input, 25, 0),
            Err(CoreError::InvalidInput { .. })
        ));

        let duplicate = vec![RootGroup::new(1, 1, 1), RootGroup::new(1, 1, 1)];
        assert!(paginate(&duplicate, 25, 0).is_err());
    }

    #[test]
    fn test_empty_group_rejected() {
        let input = vec![RootGroup::new(1, 1, 0)];
        assert!(matches!(
            paginate(&input, 25, 0),
            Err(CoreError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_paginator_empty_first_page() {
        let allowed = Paginator::new(&[], settings(25, 0, true)).unwrap();
        assert_eq!(allowed.num_pages(), 1);
        assert_eq!(allowed.page(1).unwrap().size, 0);

        let denied = Paginator::new(&[], settings(25, 0, false)).unwrap();
        assert_eq!(denied.num_pages(), 0);
        assert!(denied.page(1).is_err());
    }

    #[test]
    fn test_paginator_lookups() {
        let paginator = Paginator::new(
            &groups(&[11, 11, 11, 11, 11, 11, 6, 5]),
            settings(25, 10, false),
        )
        .unwrap();

        assert_eq!(paginator.num_pages(), 3);
        assert_eq!(paginator.count(), 77);
        assert_eq!(paginator.page_range(), 1..=3);
        assert_eq!(paginator.page_of_group(300), Some(2));
        assert_eq!(paginator.page_of_group(800), Some(3));
        assert_eq!(paginator.page_of_group(999), None);
        let second = paginator.page(2).unwrap();
        assert_eq!((second.start_group(), second.end_group()), (2, 4));
        assert_eq!(paginator.page(3).unwrap().size, 33);
        assert!(paginator.has_next(2));
        assert!(!paginator.has_next(3));
        assert!(paginator.has_previous(2));
        assert!(!paginator.has_previous(1));
        assert!(matches!(
            paginator.page(0),
            Err(CoreError::InvalidPage { number: 0, num_pages: 3 })
        ));
        assert!(paginator.page(4).is_err());
    }

    fn comment(id: i64, group_id: i64, position: i64) -> CommentRecord {
        CommentRecord {
            id,
            target_type: "article".to_string(),
            target_id: "1".to_string(),
            group_id,
            parent_id: group_id,
            level: i64::from(id != group_id),
            position,
            nested_count: 0,
            is_public: true,
            is_removed: false,
            author: "a".to_string(),
            body: "b".to_string(),
            submitted_at: "2026-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_slice_for_page() {
        let comments = vec![
            comment(1, 1, 1),
            comment(3, 1, 2),
            comment(2, 2, 2),
            comment(4, 2, 3),
            comment(5, 5, 3),
        ];
        let page = Page {
            number: 2,
            first_group: 1,
            group_ids: vec![2, 5],
            size: 3,
        };

        let slice = slice_for_page(&comments, &page).unwrap();
        let ids: Vec<i64> = slice.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 4, 5]);
    }

    #[test]
    fn test_slice_for_page_rejects_unsorted() {
        let comments = vec![comment(1, 1, 2), comment(2, 1, 1)];
        let page = Page {
            number: 1,
            first_group: 0,
            group_ids: vec![1],
            size: 2,
        };
        assert!(matches!(
            slice_for_page(&comments, &page),
            Err(CoreError::InvalidInput { .. })
        ));
    }
}
