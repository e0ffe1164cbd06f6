// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Name-indexed view over patchable targets.
//!
//! Targets work without being registered. Registration adds lookup by
//! qualified name, rejects two distinct targets claiming the same name, and
//! lets a suite assert that teardown left nothing patched.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use tracing::debug;

use crate::error::SetupError;
use crate::target::{Target, TargetId};

/// Untyped view of a target used for bookkeeping.
pub(crate) trait TargetProbe: Send + Sync {
    fn id(&self) -> TargetId;
    fn depth(&self) -> usize;
}

struct Entry {
    handle: Box<dyn Any + Send + Sync>,
    probe: Arc<dyn TargetProbe>,
}

/// Registry of targets keyed by qualified name.
#[derive(Default)]
pub struct TargetRegistry {
    entries: RwLock<BTreeMap<&'static str, Entry>>,
}

static GLOBAL: LazyLock<TargetRegistry> = LazyLock::new(TargetRegistry::new);

impl TargetRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry.
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Registers `target` under its qualified name.
    ///
    /// Registering the same target twice is a no-op. A different target with
    /// the same name is rejected.
    pub fn register<T>(&self, target: &Target<T>) -> Result<(), SetupError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let id = target.id();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = entries.get(id.name()) {
            return match existing.handle.downcast_ref::<Target<T>>() {
                Some(known) if known.ptr_eq(target) => Ok(()),
                _ => Err(SetupError::DuplicateTarget(id)),
            };
        }
        entries.insert(
            id.name(),
            Entry {
                handle: Box::new(target.clone()),
                probe: target.probe(),
            },
        );
        debug!(target_id = %id, "target registered");
        Ok(())
    }

    /// Typed handle for the target registered under `name`.
    pub fn lookup<T>(&self, name: &str) -> Result<Option<Target<T>>, SetupError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = entries.get(name) else {
            return Ok(None);
        };
        entry
            .handle
            .downcast_ref::<Target<T>>()
            .cloned()
            .map(Some)
            .ok_or_else(|| SetupError::TargetTypeMismatch(name.to_owned()))
    }

    /// Identities of every registered target, ordered by name.
    pub fn ids(&self) -> Vec<TargetId> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.values().map(|e| e.probe.id()).collect()
    }

    /// Registered targets that still carry patches, with their layer depth.
    pub fn patched(&self) -> Vec<(TargetId, usize)> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .values()
            .filter_map(|e| {
                let depth = e.probe.depth();
                (depth > 0).then(|| (e.probe.id(), depth))
            })
            .collect()
    }

    /// Number of registered targets.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
