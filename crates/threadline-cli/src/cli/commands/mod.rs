//! Command implementations.

pub mod comments;
pub mod helpers;
pub mod init;
pub mod maintenance;
pub mod moderate;
pub mod pages;

pub use comments::{run_list, run_post, run_show, run_targets};
pub use init::run_init;
pub use maintenance::{run_rebuild, run_verify};
pub use moderate::run_moderate;
pub use pages::run_page;
