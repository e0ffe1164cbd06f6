// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Single reversible substitution of a target's value.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::error::DuplicatePatchError;
use crate::target::{LayerRemoval, Target, TargetId};

static NEXT_PATCH_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a patch handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatchId(u64);

impl PatchId {
    pub(crate) fn next() -> Self {
        Self(NEXT_PATCH_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying raw value.
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "patch#{}", self.0)
    }
}

/// Handle to one substitution on a [`Target`].
///
/// The handle keeps the replacement so it can be re-applied after a reset.
/// Dropping an active handle resets it.
pub struct Patch<T>
where
    T: Clone + Send + Sync + 'static,
{
    id: PatchId,
    target: Target<T>,
    replacement: T,
}

impl<T> Patch<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Installs `replacement` on `target` and returns the handle.
    ///
    /// The displaced value is whatever was current at this instant, which may
    /// itself be another patch's replacement.
    pub fn apply(target: &Target<T>, replacement: T) -> Self {
        let id = PatchId::next();
        let depth = target.push_layer(id, replacement.clone());
        debug!(target_id = %target.id(), patch = %id, depth, "patch applied");
        Self {
            id,
            target: target.clone(),
            replacement,
        }
    }

    /// Identifier of this handle.
    pub fn id(&self) -> PatchId {
        self.id
    }

    /// Target this handle substitutes.
    pub fn target(&self) -> &Target<T> {
        &self.target
    }

    /// Whether the substitution is currently installed.
    pub fn is_active(&self) -> bool {
        self.target.has_layer(self.id)
    }

    /// Restores the displaced value. Returns `false` if the handle was not active.
    pub fn reset(&mut self) -> bool {
        match self.target.remove_layer(self.id) {
            LayerRemoval::Missing => false,
            removal => {
                debug!(target_id = %self.target.id(), patch = %self.id, ?removal, "patch reset");
                true
            }
        }
    }

    /// Installs the replacement again after a reset.
    ///
    /// Re-applying a handle that is still active would stack it on top of
    /// itself and is rejected.
    pub fn reapply(&mut self) -> Result<(), DuplicatePatchError> {
        if self.is_active() {
            return Err(DuplicatePatchError {
                target: self.target.id(),
                patch: self.id,
            });
        }
        let depth = self.target.push_layer(self.id, self.replacement.clone());
        debug!(target_id = %self.target.id(), patch = %self.id, depth, "patch re-applied");
        Ok(())
    }
}

impl<T> Drop for Patch<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T> fmt::Debug for Patch<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Patch")
            .field("id", &self.id)
            .field("target", &self.target.id())
            .field("active", &self.is_active())
            .finish()
    }
}

/// Type-erased view used by [`crate::PatchSet`].
pub(crate) trait Rollback: Send {
    fn target_id(&self) -> TargetId;
    fn is_active(&self) -> bool;
    fn reset(&mut self) -> bool;
}

impl<T> Rollback for Patch<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn target_id(&self) -> TargetId {
        self.target.id()
    }

    fn is_active(&self) -> bool {
        Patch::is_active(self)
    }

    fn reset(&mut self) -> bool {
        Patch::reset(self)
    }
}
