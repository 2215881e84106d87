//! Implementation of `threadline post`, `show`, `list` and `targets`.

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use threadline_core::store::{NewComment, Target};

use crate::cli::commands::helpers::{open_services, resolve_author};
use crate::output::{Formatter, OutputFormat};

/// Post a root comment, or a reply when `reply_to` is set.
#[tracing::instrument(skip(root, body, format))]
pub fn run_post(
    root: &Path,
    target: &Target,
    reply_to: Option<i64>,
    author: Option<&str>,
    hidden: bool,
    body: &str,
    format: OutputFormat,
) -> Result<()> {
    let services = open_services(root)?;

    let mut new = NewComment::new(target.clone(), resolve_author(author), body);
    if hidden {
        new = new.hidden();
    }
    let placement = services.comments().post_with_retry(&new, reply_to)?;
    let record = &placement.record;

    let output = serde_json::json!({
        "comment_id": record.id,
        "group_id": record.group_id,
        "parent_id": record.parent_id,
        "level": record.level,
        "position": record.position,
        "shifted": placement.shifted,
        "public": record.is_public,
    });
    Formatter::new(format).print(&output)?;

    Ok(())
}

#[derive(Serialize)]
struct ShowOutput<'a> {
    #[serde(flatten)]
    comment: &'a threadline_core::store::CommentRecord,
    /// Page holding the comment's thread; `None` when the thread is hidden.
    page: Option<usize>,
}

/// Show one comment and the page its thread appears on.
#[tracing::instrument(skip(root, format))]
pub fn run_show(root: &Path, comment_id: i64, format: OutputFormat) -> Result<()> {
    let services = open_services(root)?;

    let comment = services.comments().get(comment_id)?;
    let page = services.pages().page_for_comment(comment_id, None)?;

    Formatter::new(format).print(&ShowOutput {
        comment: &comment,
        page,
    })?;
    Ok(())
}

/// List a target's comments in thread order.
#[tracing::instrument(skip(root, format))]
pub fn run_list(root: &Path, target: &Target, all: bool, format: OutputFormat) -> Result<()> {
    let services = open_services(root)?;

    let comments = services.comments().list(target, !all)?;
    Formatter::new(format).print_comments(&comments, &format!("No comments on {target}"))?;
    Ok(())
}

#[derive(Serialize)]
struct TargetSummary {
    target: String,
    visible: i64,
}

/// List every target with its visible comment count.
#[tracing::instrument(skip(root, format))]
pub fn run_targets(root: &Path, format: OutputFormat) -> Result<()> {
    let services = open_services(root)?;
    let db = services.db();

    let mut summaries = Vec::new();
    for target in db.list_targets()? {
        summaries.push(TargetSummary {
            visible: db.count_visible(&target)?,
            target: target.to_string(),
        });
    }

    Formatter::new(format).print_list(&summaries, "No comments yet", "targets")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::init::run_init;
    use tempfile::TempDir;
    use threadline_core::core::ThreadContext;

    fn article() -> Target {
        Target::new("article", "1")
    }

    #[test]
    fn test_post_and_list() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        run_init(root, Some(2), OutputFormat::Json).unwrap();

        run_post(root, &article(), None, Some("alice"), false, "root", OutputFormat::Json)
            .unwrap();
        run_post(root, &article(), Some(1), Some("bob"), false, "reply", OutputFormat::Json)
            .unwrap();
        run_post(root, &article(), Some(1), None, true, "pending", OutputFormat::Json).unwrap();

        run_list(root, &article(), true, OutputFormat::Text).unwrap();
        run_show(root, 2, OutputFormat::Text).unwrap();
        run_targets(root, OutputFormat::Json).unwrap();

        let services = ThreadContext::new(root).unwrap().services().unwrap();
        let comments = services.comments().list(&article(), false).unwrap();
        assert_eq!(comments.len(), 3);
        assert_eq!(comments[0].nested_count, 1);
        assert_eq!(comments[1].author, "bob");
    }

    #[test]
    fn test_post_rejects_deep_reply() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        run_init(root, Some(0), OutputFormat::Json).unwrap();

        run_post(root, &article(), None, None, false, "root", OutputFormat::Json).unwrap();
        let err = run_post(root, &article(), Some(1), None, false, "no", OutputFormat::Json)
            .unwrap_err();
        assert!(err.to_string().contains("limited to level 0"));
    }
}
