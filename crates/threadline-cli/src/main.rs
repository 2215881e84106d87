//! threadline - threaded comments with thread-aware pagination

use anyhow::Result;
use clap::Parser;
use std::env;

mod cli;
mod output;
mod telemetry;

use cli::commands::{
    run_init, run_list, run_moderate, run_page, run_post, run_rebuild, run_show, run_targets,
    run_verify,
};
use cli::{Cli, Commands};
use output::OutputFormat;

fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.log_json)?;

    let result = run(cli);
    telemetry::shutdown();
    result
}

fn run(cli: Cli) -> Result<()> {
    let root = match cli.root {
        Some(root) => root,
        None => env::current_dir()?,
    };

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    match cli.command {
        Commands::Init { max_thread_level } => run_init(&root, max_thread_level, format),

        Commands::Post {
            target,
            reply_to,
            author,
            hidden,
            body,
        } => run_post(
            &root,
            &target,
            reply_to,
            author.as_deref(),
            hidden,
            &body,
            format,
        ),

        Commands::Show { comment_id } => run_show(&root, comment_id, format),

        Commands::List { target, all } => run_list(&root, &target, all, format),

        Commands::Page {
            target,
            page,
            page_size,
            orphans,
        } => run_page(&root, &target, page, page_size, orphans, format),

        Commands::Moderate { comment_id, action } => {
            run_moderate(&root, comment_id, action, format)
        }

        Commands::Rebuild => run_rebuild(&root, format),

        Commands::Verify { target } => run_verify(&root, target.as_ref(), format),

        Commands::Targets => run_targets(&root, format),
    }
}
