//! Implementation of `threadline rebuild` and `threadline verify`.

use anyhow::{bail, Result};
use std::path::Path;

use threadline_core::store::Target;

use crate::cli::commands::helpers::open_services;
use crate::output::{Formatter, OutputFormat};

/// Recompute every nested count.
#[tracing::instrument(skip(root, format))]
pub fn run_rebuild(root: &Path, format: OutputFormat) -> Result<()> {
    let services = open_services(root)?;

    let report = services.maintenance().rebuild()?;
    Formatter::new(format).print(&report)?;

    Ok(())
}

/// Check thread invariants. Fails when any violation is found.
#[tracing::instrument(skip(root, format))]
pub fn run_verify(root: &Path, target: Option<&Target>, format: OutputFormat) -> Result<()> {
    let services = open_services(root)?;

    let violations = services.maintenance().verify(target)?;
    let formatter = Formatter::new(format);
    if formatter.is_json() {
        formatter.print_list(&violations, "", "violations")?;
    } else {
        let lines: Vec<String> = violations.iter().map(ToString::to_string).collect();
        formatter.print_list(&lines, "No integrity violations", "violations")?;
    }

    if !violations.is_empty() {
        bail!(
            "{} integrity violation(s) found\n  To fix nested counts: threadline rebuild",
            violations.len()
        );
    }
    Ok(())
}
