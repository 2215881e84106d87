//! Implementation of `threadline moderate`.

use anyhow::Result;
use std::path::Path;

use threadline_core::core::moderation::ModerationAction;

use crate::cli::commands::helpers::open_services;
use crate::output::{Formatter, OutputFormat};

/// Apply a moderation action to one comment.
#[tracing::instrument(skip(root, format))]
pub fn run_moderate(
    root: &Path,
    comment_id: i64,
    action: ModerationAction,
    format: OutputFormat,
) -> Result<()> {
    let services = open_services(root)?;

    let outcome = services.moderation().apply(comment_id, action)?;
    let comment = &outcome.comment;

    let output = serde_json::json!({
        "comment_id": comment.id,
        "action": action,
        "public": comment.is_public,
        "removed": comment.is_removed,
        "visibility_changed": outcome.visibility_changed,
        "ancestors_updated": outcome.ancestors_updated,
    });
    Formatter::new(format).print(&output)?;

    Ok(())
}
