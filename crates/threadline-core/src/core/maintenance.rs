//! Maintenance service: count rebuild and integrity verification.

use anyhow::Context;

use crate::policy::TargetPolicy;
use crate::store::{CommentDb, Target};

use super::counts::{NestedCountTracker, RebuildReport};
use super::integrity::{self, IntegrityViolation};
use super::{begin_write, commit_write, CoreResult};

/// Service for store maintenance.
pub struct MaintenanceService<'a> {
    db: &'a CommentDb,
    policy: &'a dyn TargetPolicy,
}

impl<'a> MaintenanceService<'a> {
    pub(crate) fn new(db: &'a CommentDb, policy: &'a dyn TargetPolicy) -> Self {
        Self { db, policy }
    }

    /// Recompute every `nested_count` from the stored threads.
    ///
    /// Holds the write lock for the whole pass, so no insert lands between
    /// the scan and the updates.
    pub fn rebuild(&self) -> CoreResult<RebuildReport> {
        let tx = begin_write(self.db.conn())?;
        let report = NestedCountTracker::rebuild_all(&tx)?;
        commit_write(tx)?;
        Ok(report)
    }

    /// Check thread invariants, for one target or the whole store.
    pub fn verify(&self, target: Option<&Target>) -> CoreResult<Vec<IntegrityViolation>> {
        let snapshot = self
            .db
            .conn()
            .unchecked_transaction()
            .context("Failed to begin read transaction")?;
        let violations = integrity::verify(&snapshot, self.policy, target)?;
        drop(snapshot);
        Ok(violations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::services;
    use crate::core::{CoreError, ThreadServices, ViolationKind};
    use crate::store::NewComment;

    fn article() -> Target {
        Target::new("article", "1")
    }

    fn post(services: &ThreadServices, reply_to: Option<i64>) -> i64 {
        services
            .comments()
            .post(&NewComment::new(article(), "t", "body"), reply_to)
            .unwrap()
            .record
            .id
    }

    #[test]
    fn test_rebuild_repairs_drift() {
        let services = services(3);
        let root = post(&services, None);
        let a = post(&services, Some(root));
        post(&services, Some(a));
        post(&services, Some(root));

        services
            .db()
            .conn()
            .execute("UPDATE comments SET nested_count = 42", [])
            .unwrap();
        assert!(!services.maintenance().verify(None).unwrap().is_empty());

        let report = services.maintenance().rebuild().unwrap();
        assert_eq!(report.scanned, 4);
        assert_eq!(report.groups, 1);
        assert_eq!(report.updated, 4);
        assert!(report.anomalies.is_empty());

        assert_eq!(services.comments().get(root).unwrap().nested_count, 3);
        assert_eq!(services.comments().get(a).unwrap().nested_count, 1);
        assert!(services.maintenance().verify(Some(&article())).unwrap().is_empty());

        let again = services.maintenance().rebuild().unwrap();
        assert_eq!(again.updated, 0);
    }

    #[test]
    fn test_rebuild_rejects_duplicate_positions() {
        let services = services(2);
        let root = post(&services, None);
        let reply = post(&services, Some(root));
        post(&services, Some(root));

        services
            .db()
            .conn()
            .execute("UPDATE comments SET position = position - 1 WHERE id = ?", [reply])
            .unwrap();

        let result = services.maintenance().rebuild();
        assert!(matches!(result, Err(CoreError::DuplicatePosition { .. })));

        let violations = services.maintenance().verify(None).unwrap();
        assert!(violations
            .iter()
            .any(|v| matches!(v.kind, ViolationKind::DuplicatePosition { .. })));
    }
}
