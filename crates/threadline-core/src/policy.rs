//! Per-target reply depth policy.

use std::collections::HashMap;

/// Resolves the deepest level a comment on a given target type may reach.
///
/// Level 0 means replies are disabled for that target type.
pub trait TargetPolicy {
    fn max_thread_level(&self, target_type: &str) -> i64;
}

/// Depth limits from configuration: per-type overrides over a global default.
#[derive(Debug, Clone, Default)]
pub struct StaticPolicy {
    default_level: i64,
    by_target: HashMap<String, i64>,
}

impl StaticPolicy {
    #[must_use]
    pub fn new(default_level: i64, by_target: HashMap<String, i64>) -> Self {
        Self {
            default_level,
            by_target,
        }
    }

    /// A policy applying the same limit to every target type.
    #[must_use]
    pub fn uniform(level: i64) -> Self {
        Self::new(level, HashMap::new())
    }

    #[must_use]
    pub fn with_target(mut self, target_type: impl Into<String>, level: i64) -> Self {
        self.by_target.insert(target_type.into(), level);
        self
    }
}

impl TargetPolicy for StaticPolicy {
    fn max_thread_level(&self, target_type: &str) -> i64 {
        self.by_target
            .get(target_type)
            .copied()
            .unwrap_or(self.default_level)
    }
}
