// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Ordered patch stack with guaranteed LIFO rollback.

use std::fmt;

use tracing::debug;

use crate::error::SetupError;
use crate::patch::{Patch, Rollback};
use crate::target::{Target, TargetId};

/// Patches in application order.
///
/// [`reset_all`](Self::reset_all) unwinds strictly in reverse order, so every
/// target ends at the value it held before the first patch in the set touched
/// it, no matter how many patches were stacked on it. Dropping the set performs
/// the same rollback.
#[derive(Default)]
pub struct PatchSet {
    patches: Vec<Box<dyn Rollback>>,
}

impl PatchSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a new patch and keeps it in the set.
    ///
    /// Returns the set so several substitutions chain in one expression.
    pub fn apply<T>(&mut self, target: &Target<T>, replacement: T) -> &mut Self
    where
        T: Clone + Send + Sync + 'static,
    {
        self.patches.push(Box::new(Patch::apply(target, replacement)));
        self
    }

    /// Adopts an already-applied handle; the set becomes responsible for resetting it.
    pub fn push<T>(&mut self, patch: Patch<T>) -> Result<&mut Self, SetupError>
    where
        T: Clone + Send + Sync + 'static,
    {
        if !patch.is_active() {
            return Err(SetupError::InactivePatch(patch.target().id()));
        }
        self.patches.push(Box::new(patch));
        Ok(self)
    }

    /// Resets every patch in reverse application order and empties the set.
    ///
    /// Returns how many patches were still active. Calling it on an empty set
    /// does nothing.
    pub fn reset_all(&mut self) -> usize {
        if self.patches.is_empty() {
            return 0;
        }
        let total = self.patches.len();
        let mut restored = 0;
        while let Some(mut patch) = self.patches.pop() {
            if patch.reset() {
                restored += 1;
            }
        }
        debug!(total, restored, "patch set rolled back");
        restored
    }

    /// Number of patches held.
    pub fn len(&self) -> usize {
        self.patches.len()
    }

    /// Whether the set holds no patches.
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Patched targets in application order (repeats included).
    pub fn targets(&self) -> Vec<TargetId> {
        self.patches.iter().map(|p| p.target_id()).collect()
    }

    /// Number of held patches that are still installed.
    pub fn active(&self) -> usize {
        self.patches.iter().filter(|p| p.is_active()).count()
    }
}

impl Drop for PatchSet {
    fn drop(&mut self) {
        self.reset_all();
    }
}

impl fmt::Debug for PatchSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchSet")
            .field("targets", &self.targets())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn chained_apply_then_reset_all_restores_every_target() {
        let limit = Target::global("limit", 10_i64);
        let name = Target::global("name", "real".to_owned());

        let mut set = PatchSet::new();
        set.apply(&limit, 150)
            .apply(&name, "fake".to_owned())
            .apply(&limit, 300);

        assert_eq!(limit.get(), 300);
        assert_eq!(name.get(), "fake");
        assert_eq!(set.len(), 3);

        assert_eq!(set.reset_all(), 3);
        assert_eq!(limit.get(), 10);
        assert_eq!(name.get(), "real");
        assert!(set.is_empty());
    }

    #[test]
    fn reset_all_is_idempotent() {
        let limit = Target::global("limit", 1_u8);
        let mut set = PatchSet::new();
        set.apply(&limit, 2);
        assert_eq!(set.reset_all(), 1);
        assert_eq!(set.reset_all(), 0);
        assert_eq!(limit.get(), 1);
    }

    #[test]
    fn push_rejects_inactive_handle() {
        let limit = Target::global("limit", 1_u8);
        let mut patch = Patch::apply(&limit, 2);
        patch.reset();
        let mut set = PatchSet::new();
        let err = set.push(patch).unwrap_err();
        assert_eq!(err, SetupError::InactivePatch(limit.id()));
    }

    #[test]
    fn adopted_patch_is_rolled_back_with_the_set() {
        let limit = Target::global("limit", 1_u8);
        let mut set = PatchSet::new();
        set.push(Patch::apply(&limit, 2)).unwrap();
        set.apply(&limit, 3);
        assert_eq!(set.active(), 2);
        drop(set);
        assert_eq!(limit.get(), 1);
        assert!(!limit.is_patched());
    }

    #[test]
    fn targets_reports_application_order() {
        let a = Target::function("a", 0_u8);
        let b = Target::method("b", 0_u8);
        let mut set = PatchSet::new();
        set.apply(&a, 1).apply(&b, 1).apply(&a, 2);
        assert_eq!(set.targets(), vec![a.id(), b.id(), a.id()]);
    }
}
