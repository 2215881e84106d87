//! threadline-core: domain logic for threaded comments over a flat table.
//!
//! This crate owns the comment store, thread placement, nested-count
//! maintenance, thread-aware pagination, and configuration.

pub mod config;
pub mod core;
pub mod paginate;
pub mod policy;
pub mod store;
