// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Typed identity of an interceptable call.

use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;

use crate::target::{Func, Target, TargetId};

/// Identity of a call that expectations can bind to.
///
/// `A` is the owned argument value (usually a tuple) and `R` the return type.
/// Doubles declare their call sites as constants:
///
/// ```
/// use decoy_core::CallSite;
///
/// const GET: CallSite<(String,), Option<String>> = CallSite::method("Store::get");
/// assert_eq!(GET.id().name(), "Store::get");
/// ```
pub struct CallSite<A, R> {
    id: TargetId,
    _signature: PhantomData<fn(A) -> R>,
}

impl<A, R> CallSite<A, R> {
    /// Call site for the given identity.
    pub const fn new(id: TargetId) -> Self {
        Self {
            id,
            _signature: PhantomData,
        }
    }

    /// Call site of a free function.
    pub const fn function(name: &'static str) -> Self {
        Self::new(TargetId::function(name))
    }

    /// Call site of a method.
    pub const fn method(name: &'static str) -> Self {
        Self::new(TargetId::method(name))
    }

    /// Identity of the call.
    pub const fn id(&self) -> TargetId {
        self.id
    }
}

impl<A: 'static, R: 'static> CallSite<A, R> {
    pub(crate) fn signature(&self) -> TypeId {
        TypeId::of::<fn(A) -> R>()
    }
}

impl<A, R> Clone for CallSite<A, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A, R> Copy for CallSite<A, R> {}

impl<A, R> fmt::Debug for CallSite<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CallSite").field(&self.id).finish()
    }
}

impl<A, R> Target<Func<A, R>>
where
    A: 'static,
    R: 'static,
{
    /// Call site sharing this function target's identity.
    pub fn call_site(&self) -> CallSite<A, R> {
        CallSite::new(self.id())
    }
}
