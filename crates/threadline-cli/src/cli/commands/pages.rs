//! Implementation of `threadline page`.

use anyhow::Result;
use std::io::{self, Write};
use std::path::Path;

use threadline_core::store::Target;

use crate::cli::commands::helpers::open_services;
use crate::output::{Formatter, OutputFormat};

/// Show one page of a target's visible comments.
///
/// `page_size` and `orphans` override the configured values for this call.
#[tracing::instrument(skip(root, format))]
pub fn run_page(
    root: &Path,
    target: &Target,
    number: usize,
    page_size: Option<i64>,
    orphans: Option<i64>,
    format: OutputFormat,
) -> Result<()> {
    let services = open_services(root)?;

    let mut settings = services.page_settings();
    if let Some(size) = page_size {
        settings.page_size = size;
    }
    if let Some(orphans) = orphans {
        settings.orphans = orphans;
    }

    let page = services.pages().page(target, number, Some(settings))?;

    let formatter = Formatter::new(format);
    if formatter.is_json() {
        return formatter.print(&page);
    }

    {
        let mut stdout = io::stdout().lock();
        writeln!(
            stdout,
            "page {}/{}  comments:{}  total:{}",
            page.number, page.num_pages, page.size, page.count
        )?;
    }
    formatter.print_comments(&page.comments, &format!("No comments on {target}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::comments::run_post;
    use crate::cli::commands::init::run_init;
    use tempfile::TempDir;

    #[test]
    fn test_page_bounds() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let target = Target::new("article", "1");
        run_init(root, Some(1), OutputFormat::Json).unwrap();
        for body in ["one", "two", "three"] {
            run_post(root, &target, None, None, false, body, OutputFormat::Json).unwrap();
        }

        run_page(root, &target, 3, Some(1), None, OutputFormat::Text).unwrap();
        assert!(run_page(root, &target, 4, Some(1), None, OutputFormat::Json).is_err());
        assert!(run_page(root, &target, 1, Some(-1), None, OutputFormat::Json).is_err());
    }
}
