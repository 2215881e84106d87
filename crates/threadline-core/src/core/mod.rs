//! Service layer for threadline-core.
//!
//! Provides typed, high-level APIs for posting, moderation, pagination and
//! maintenance. Every write runs in one `BEGIN IMMEDIATE` transaction, so a
//! placement and its nested-count updates commit together or not at all.
//!
//! # Usage
//!
//! ```no_run
//! use std::path::Path;
//! use threadline_core::core::ThreadContext;
//! use threadline_core::store::{NewComment, Target};
//!
//! let ctx = ThreadContext::new(Path::new("/srv/site")).unwrap();
//! let services = ctx.services().unwrap();
//!
//! let target = Target::new("article", "42");
//! let root = services
//!     .comments()
//!     .post(&NewComment::new(target.clone(), "alice", "First!"), None)
//!     .unwrap();
//! let page = services.pages().page(&target, 1, None).unwrap();
//! ```

pub mod comments;
pub mod counts;
pub mod errors;
pub mod integrity;
pub mod maintenance;
pub mod moderation;
pub mod pages;
pub mod placement;

pub use counts::{NestedCountTracker, RebuildAnomaly, RebuildReport};
pub use errors::{CoreError, CoreResult};
pub use integrity::{IntegrityViolation, ViolationKind};
pub use placement::{Placement, ThreadPlacer};

use std::path::{Path, PathBuf};

use anyhow::Context;
use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::config::{is_initialized, Config};
use crate::paginate::PageSettings;
use crate::policy::TargetPolicy;
use crate::store::CommentDb;

/// Context for threadline-core services.
///
/// Holds the store root and its loaded configuration.
#[derive(Debug, Clone)]
pub struct ThreadContext {
    root: PathBuf,
    config: Config,
}

impl ThreadContext {
    /// Create a context for an initialized store root.
    ///
    /// Loads `config.json` and applies environment overrides.
    pub fn new(root: &Path) -> CoreResult<Self> {
        if !is_initialized(root) {
            return Err(CoreError::NotInitialized {
                path: root.display().to_string(),
            });
        }
        let config = Config::load(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            config,
        })
    }

    /// Path to the store root (parent of `.threadline/`).
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Mutable access for per-invocation overrides (e.g. CLI flags).
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Path to the comment database.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.config.resolve_db_path(&self.root)
    }

    /// Open the database, initialize its schema, and build the services.
    pub fn services(&self) -> CoreResult<ThreadServices> {
        let db = CommentDb::open(&self.db_path())?;
        db.init_schema()?;
        db.set_busy_timeout(self.config.busy_timeout())?;
        Ok(ThreadServices::new(
            db,
            Box::new(self.config.policy()),
            self.config.clone(),
        ))
    }
}

/// Facade providing all threadline service APIs.
///
/// Owns the open database and the depth policy, and hands out service
/// objects borrowing them.
pub struct ThreadServices {
    db: CommentDb,
    policy: Box<dyn TargetPolicy>,
    config: Config,
}

impl ThreadServices {
    /// Assemble services from an already opened database.
    #[must_use]
    pub fn new(db: CommentDb, policy: Box<dyn TargetPolicy>, config: Config) -> Self {
        Self { db, policy, config }
    }

    /// Access posting and read operations.
    #[must_use]
    pub fn comments(&self) -> comments::CommentService<'_> {
        comments::CommentService::new(
            &self.db,
            self.policy.as_ref(),
            self.config.placement_attempts,
        )
    }

    /// Access publish/unpublish/remove/restore.
    #[must_use]
    pub fn moderation(&self) -> moderation::ModerationService<'_> {
        moderation::ModerationService::new(&self.db)
    }

    /// Access thread-aware pagination.
    #[must_use]
    pub fn pages(&self) -> pages::PageService<'_> {
        pages::PageService::new(&self.db, self.config.page_settings())
    }

    /// Access rebuild and integrity checks.
    #[must_use]
    pub fn maintenance(&self) -> maintenance::MaintenanceService<'_> {
        maintenance::MaintenanceService::new(&self.db, self.policy.as_ref())
    }

    /// Get a reference to the underlying database.
    #[must_use]
    pub const fn db(&self) -> &CommentDb {
        &self.db
    }

    #[must_use]
    pub const fn page_settings(&self) -> PageSettings {
        self.config.page_settings()
    }
}

/// Begin a transaction that takes the write lock up front.
///
/// Lock contention surfaces as `PlacementConflict`.
pub(crate) fn begin_write(conn: &Connection) -> CoreResult<Transaction<'_>> {
    Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .context("Failed to begin write transaction")
        .map_err(CoreError::from_write)
}

/// Commit a write transaction, mapping lock contention like `begin_write`.
pub(crate) fn commit_write(tx: Transaction<'_>) -> CoreResult<()> {
    tx.commit()
        .context("Failed to commit transaction")
        .map_err(CoreError::from_write)
}
