// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Patchable indirection points.
//!
//! A [`Target`] is the only kind of thing the engine can substitute. Production
//! code must read the value through the target (call a stored function value,
//! obtain a trait object from a factory, read a global) for a patch to be
//! visible to it. Code that calls a fixed implementation directly cannot be
//! intercepted.
//!
//! # Layer stack
//!
//! Every active patch owns one layer on its target. A layer records the value
//! that was current immediately before the patch was applied (the *displaced*
//! value). Unwinding the layers in reverse order therefore reproduces the
//! original value regardless of how deeply the target was patched.
//!
//! The original value is captured exactly once, at the first patch
//! application, and is available afterwards through [`Target::original`].

use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

use crate::patch::PatchId;
use crate::registry::TargetProbe;

/// Kind of indirection point a target stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetKind {
    /// Free function reached through a stored function value.
    Function,
    /// Method on a trait object or double.
    Method,
    /// Process-wide mutable value.
    GlobalVariable,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::GlobalVariable => "global",
        };
        f.write_str(label)
    }
}

/// Logical identity of a patchable point: qualified name plus kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId {
    name: &'static str,
    kind: TargetKind,
}

impl TargetId {
    /// Builds an identity from a qualified name and a kind.
    pub const fn new(name: &'static str, kind: TargetKind) -> Self {
        Self { name, kind }
    }

    /// Identity of a free function.
    pub const fn function(name: &'static str) -> Self {
        Self::new(name, TargetKind::Function)
    }

    /// Identity of a method.
    pub const fn method(name: &'static str) -> Self {
        Self::new(name, TargetKind::Method)
    }

    /// Identity of a global value.
    pub const fn global(name: &'static str) -> Self {
        Self::new(name, TargetKind::GlobalVariable)
    }

    /// Qualified name.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Kind of indirection point.
    pub const fn kind(&self) -> TargetKind {
        self.kind
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} `{}`", self.kind, self.name)
    }
}

/// Shared function value stored in function-kind targets.
pub type Func<A, R> = Arc<dyn Fn(A) -> R + Send + Sync>;

/// Wraps a closure as a [`Func`].
pub fn func<A, R, F>(f: F) -> Func<A, R>
where
    F: Fn(A) -> R + Send + Sync + 'static,
{
    Arc::new(f)
}

struct Layer<T> {
    patch: PatchId,
    displaced: T,
}

struct Slot<T> {
    current: T,
    layers: Vec<Layer<T>>,
}

/// How a layer left the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LayerRemoval {
    /// The layer was on top; its displaced value is current again.
    Unwound,
    /// A later layer was still active; the visible value is unchanged.
    Spliced,
    /// The patch had no layer on this target.
    Missing,
}

pub(crate) struct TargetState<T> {
    id: TargetId,
    slot: RwLock<Slot<T>>,
    original: OnceLock<T>,
}

impl<T> TargetState<T> {
    fn read(&self) -> RwLockReadGuard<'_, Slot<T>> {
        self.slot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Slot<T>> {
        self.slot.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Send + Sync> TargetProbe for TargetState<T> {
    fn id(&self) -> TargetId {
        self.id
    }

    fn depth(&self) -> usize {
        self.read().layers.len()
    }
}

/// Handle to a patchable value slot.
///
/// Clones share the slot. Declare process-wide targets as
/// `static X: LazyLock<Target<T>>`; tests and doubles may also create local
/// targets and inject them.
pub struct Target<T> {
    state: Arc<TargetState<T>>,
}

impl<T> Clone for Target<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> Target<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates a target whose current (and, until patched, original) value is `value`.
    pub fn new(id: TargetId, value: T) -> Self {
        Self {
            state: Arc::new(TargetState {
                id,
                slot: RwLock::new(Slot {
                    current: value,
                    layers: Vec::new(),
                }),
                original: OnceLock::new(),
            }),
        }
    }

    /// Function-kind target.
    pub fn function(name: &'static str, value: T) -> Self {
        Self::new(TargetId::function(name), value)
    }

    /// Method-kind target.
    pub fn method(name: &'static str, value: T) -> Self {
        Self::new(TargetId::method(name), value)
    }

    /// Global-variable target.
    pub fn global(name: &'static str, value: T) -> Self {
        Self::new(TargetId::global(name), value)
    }

    /// Identity of this target.
    pub fn id(&self) -> TargetId {
        self.state.id
    }

    /// Clone of the value currently visible to callers.
    pub fn get(&self) -> T {
        self.state.read().current.clone()
    }

    /// Runs `f` against the current value without cloning it.
    ///
    /// The slot stays read-locked while `f` runs; `f` must not patch or reset
    /// this target.
    pub fn with<O>(&self, f: impl FnOnce(&T) -> O) -> O {
        f(&self.state.read().current)
    }

    /// Value captured at the first patch application, if any patch was ever applied.
    pub fn original(&self) -> Option<T> {
        self.state.original.get().cloned()
    }

    /// Number of active patch layers.
    pub fn depth(&self) -> usize {
        self.state.read().layers.len()
    }

    /// Whether at least one patch is active.
    pub fn is_patched(&self) -> bool {
        self.depth() > 0
    }

    /// Whether both handles share the same slot.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    pub(crate) fn probe(&self) -> Arc<dyn TargetProbe> {
        self.state.clone()
    }

    pub(crate) fn has_layer(&self, patch: PatchId) -> bool {
        self.state.read().layers.iter().any(|l| l.patch == patch)
    }

    /// Installs `replacement`, recording the displaced value under `patch`.
    pub(crate) fn push_layer(&self, patch: PatchId, replacement: T) -> usize {
        let mut slot = self.state.write();
        let current = &slot.current;
        self.state.original.get_or_init(|| current.clone());
        let displaced = std::mem::replace(&mut slot.current, replacement);
        slot.layers.push(Layer { patch, displaced });
        slot.layers.len()
    }

    /// Removes the layer owned by `patch`.
    ///
    /// Top layer: its displaced value becomes current. Buried layer: the layer
    /// directly above inherits the displaced value, so that layer's own reset
    /// still lands on the value that preceded both.
    pub(crate) fn remove_layer(&self, patch: PatchId) -> LayerRemoval {
        let mut slot = self.state.write();
        let Some(index) = slot.layers.iter().rposition(|l| l.patch == patch) else {
            return LayerRemoval::Missing;
        };
        let layer = slot.layers.remove(index);
        if index == slot.layers.len() {
            slot.current = layer.displaced;
            LayerRemoval::Unwound
        } else {
            warn!(target_id = %self.state.id, %patch, "patch reset out of LIFO order; layer spliced");
            slot.layers[index].displaced = layer.displaced;
            LayerRemoval::Spliced
        }
    }
}

impl<A, R> Target<Func<A, R>>
where
    A: 'static,
    R: 'static,
{
    /// Calls whichever function value is current.
    ///
    /// The slot lock is released before the function runs, so the function may
    /// itself consult or patch targets.
    pub fn call(&self, args: A) -> R {
        let f = self.get();
        f(args)
    }
}

impl<T> fmt::Debug for Target<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let depth = self.state.read().layers.len();
        f.debug_struct("Target")
            .field("id", &self.state.id)
            .field("depth", &depth)
            .finish_non_exhaustive()
    }
}
