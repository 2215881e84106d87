//! Shared helpers for CLI commands.

use anyhow::{bail, Result};
use std::env;
use std::path::Path;

use threadline_core::config::is_initialized;
use threadline_core::core::{ThreadContext, ThreadServices};

/// Ensure a store is initialized under the given root.
pub fn ensure_initialized(root: &Path) -> Result<()> {
    if !is_initialized(root) {
        bail!(
            "Not a threadline store: {}\n  To fix: threadline init",
            root.display()
        );
    }
    Ok(())
}

/// Load the config and open the services for a store root.
pub fn open_services(root: &Path) -> Result<ThreadServices> {
    ensure_initialized(root)?;
    let ctx = ThreadContext::new(root)?;
    Ok(ctx.services()?)
}

/// Author for new comments: the flag, then `$USER`, then "anonymous".
pub fn resolve_author(author: Option<&str>) -> String {
    author
        .map(str::to_string)
        .or_else(|| env::var("USER").ok().filter(|user| !user.is_empty()))
        .unwrap_or_else(|| "anonymous".to_string())
}
