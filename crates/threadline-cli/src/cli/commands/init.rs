//! Implementation of `threadline init` command.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use threadline_core::config::{config_path, is_initialized, store_dir, Config};
use threadline_core::core::ThreadContext;

use crate::output::{Formatter, OutputFormat};

/// Run the init command.
///
/// Creates `.threadline/` with a default `config.json` and an empty
/// database. An existing store is left as it is.
#[tracing::instrument(skip(root, format))]
pub fn run_init(root: &Path, max_thread_level: Option<i64>, format: OutputFormat) -> Result<()> {
    let created = !is_initialized(root);
    if created {
        let dir = store_dir(root);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

        let mut config = Config::default();
        if let Some(level) = max_thread_level {
            config.max_thread_level = level;
        }
        config.write_file(&config_path(root))?;
    }

    // Opening the services creates the database and its schema.
    let ctx = ThreadContext::new(root)?;
    ctx.services()?;

    let output = serde_json::json!({
        "created": created,
        "store": store_dir(root).display().to_string(),
        "database": ctx.db_path().display().to_string(),
        "max_thread_level": ctx.config().max_thread_level,
        "page_size": ctx.config().page_size,
    });
    Formatter::new(format).print(&output)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_creates_store() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        run_init(root, Some(3), OutputFormat::Json).unwrap();

        assert!(is_initialized(root));
        assert!(store_dir(root).join("threadline.db").exists());
        let config = Config::read_file(&config_path(root)).unwrap();
        assert_eq!(config.max_thread_level, 3);
    }

    #[test]
    fn test_init_idempotent() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        run_init(root, Some(2), OutputFormat::Json).unwrap();
        run_init(root, Some(5), OutputFormat::Json).unwrap();

        // The second run keeps the existing config.
        let config = Config::read_file(&config_path(root)).unwrap();
        assert_eq!(config.max_thread_level, 2);
    }
}
