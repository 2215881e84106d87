//! CLI command definitions and handlers.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use threadline_core::core::moderation::ModerationAction;
use threadline_core::store::Target;

pub mod commands;

/// Threaded comments over a flat table, with thread-aware pagination
#[derive(Parser, Debug)]
#[command(name = "threadline")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Emit logs as JSON on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Store root holding .threadline/ (default: current directory)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create .threadline/ with a default config and an empty database
    Init {
        /// Deepest reply level allowed (0 = no replies)
        #[arg(long)]
        max_thread_level: Option<i64>,
    },

    /// Post a root comment or a reply
    Post {
        /// Target the comment is attached to, e.g. article:42
        #[arg(long)]
        target: Target,

        /// Comment ID to reply to
        #[arg(long)]
        reply_to: Option<i64>,

        /// Author name (default: $USER)
        #[arg(long)]
        author: Option<String>,

        /// Store the comment unpublished, pending moderation
        #[arg(long)]
        hidden: bool,

        /// Comment text
        body: String,
    },

    /// Show one comment
    Show {
        /// Comment ID
        comment_id: i64,
    },

    /// List a target's comments in thread order
    List {
        #[arg(long)]
        target: Target,

        /// Include unpublished and removed comments
        #[arg(long)]
        all: bool,
    },

    /// Show one page of a target's visible comments
    Page {
        #[arg(long)]
        target: Target,

        /// Page number, starting at 1
        #[arg(long, default_value = "1")]
        page: usize,

        /// Override the configured page size (0 = single page)
        #[arg(long)]
        page_size: Option<i64>,

        /// Override the configured orphans allowance
        #[arg(long)]
        orphans: Option<i64>,
    },

    /// Publish, unpublish, remove or restore a comment
    Moderate {
        /// Comment ID
        comment_id: i64,

        /// Action to apply
        #[arg(value_enum)]
        action: ModerationAction,
    },

    /// Recompute every nested count from the stored threads
    Rebuild,

    /// Check thread structure and nested counts
    Verify {
        /// Limit the check to one target
        #[arg(long)]
        target: Option<Target>,
    },

    /// List targets with their visible comment counts
    Targets,
}
