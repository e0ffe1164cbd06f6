// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Registered call specifications and their consumption state.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::call_site::CallSite;
use crate::controller::Controller;
use crate::error::SetupError;
use crate::matcher::Matcher;
use crate::outcome::{Outcome, OutcomeGroup, Repeat};
use crate::target::TargetId;

static NEXT_EXPECTATION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique expectation identifier.
///
/// Ids never repeat across controllers, so a handle from one controller is
/// never mistaken for an expectation of another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExpectationId(u64);

impl ExpectationId {
    pub(crate) fn next() -> Self {
        Self(NEXT_EXPECTATION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Wraps a raw identifier.
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying raw value.
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ExpectationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Consumption state of an expectation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectationState {
    /// No call consumed yet.
    Pending,
    /// Some calls consumed; more may still match.
    Partial,
    /// Bounded capacity fully consumed.
    Exhausted,
}

/// Handle to a registered expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expectation {
    id: ExpectationId,
    target: TargetId,
    label: String,
}

impl Expectation {
    /// Process-unique identifier.
    pub fn id(&self) -> ExpectationId {
        self.id
    }

    /// Call site the expectation is bound to.
    pub fn target(&self) -> TargetId {
        self.target
    }

    /// Label used in diagnostics, e.g. `StorageClient::get(eq "k1") #2`.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Typed half of an expectation, stored type-erased in [`Entry`].
pub(crate) struct Behavior<A, R> {
    pub matcher: Arc<dyn Matcher<A>>,
    pub groups: Vec<OutcomeGroup<A, R>>,
}

/// Controller-side record of an expectation.
pub(crate) struct Entry {
    pub id: ExpectationId,
    pub target: TargetId,
    pub signature: TypeId,
    pub label: String,
    pub consumed: usize,
    /// `None` when the last group is unbounded.
    pub capacity: Option<usize>,
    pub minimum: usize,
    pub behavior: Box<dyn Any + Send + Sync>,
}

impl Entry {
    pub fn state(&self) -> ExpectationState {
        if self.is_exhausted() {
            ExpectationState::Exhausted
        } else if self.consumed == 0 {
            ExpectationState::Pending
        } else {
            ExpectationState::Partial
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.capacity.is_some_and(|cap| self.consumed >= cap)
    }

    /// A predecessor releases its successors once it fired and met its minimum.
    pub fn releases_successors(&self) -> bool {
        self.consumed >= self.minimum.max(1)
    }

    pub fn handle(&self) -> Expectation {
        Expectation {
            id: self.id,
            target: self.target,
            label: self.label.clone(),
        }
    }
}

pub(crate) fn label_for(target: TargetId, matcher: &str, id: ExpectationId) -> String {
    format!("{}({matcher}) {id}", target.name())
}

/// Fluent registration of one expectation.
///
/// ```
/// use decoy_core::{matcher, CallSite, Controller};
///
/// const GET: CallSite<(String,), Option<String>> = CallSite::method("Store::get");
///
/// let ctrl = Controller::new();
/// ctrl.expect(GET)
///     .with((matcher::eq("k1".to_owned()),))
///     .returning(Some("v".to_owned()))
///     .times(2)
///     .returning(None)
///     .register()
///     .unwrap();
///
/// assert_eq!(ctrl.call(GET, ("k1".to_owned(),)).unwrap(), Some("v".to_owned()));
/// ```
#[must_use = "an expectation is only active after `register`"]
pub struct ExpectationBuilder<'c, A, R> {
    controller: &'c Controller,
    site: CallSite<A, R>,
    matcher: Option<Box<dyn Matcher<A>>>,
    groups: Vec<OutcomeGroup<A, R>>,
    minimum: Option<usize>,
    after: Vec<ExpectationId>,
    deferred: Option<SetupError>,
}

impl<'c, A, R> ExpectationBuilder<'c, A, R>
where
    A: fmt::Debug + 'static,
    R: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(controller: &'c Controller, site: CallSite<A, R>) -> Self {
        Self {
            controller,
            site,
            matcher: None,
            groups: Vec::new(),
            minimum: None,
            after: Vec::new(),
            deferred: None,
        }
    }

    /// Restricts the arguments the expectation accepts.
    pub fn with(mut self, matcher: impl Matcher<A> + 'static) -> Self {
        self.matcher = Some(Box::new(matcher));
        self
    }

    /// Opens a new group returning `value` once.
    pub fn returning(mut self, value: R) -> Self {
        self.groups.push(OutcomeGroup::once(value));
        self
    }

    /// Opens a new group computing its value from the arguments.
    pub fn returning_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&A) -> R + Send + Sync + 'static,
    {
        self.groups.push(OutcomeGroup::compute(f));
        self
    }

    /// Sets the repeat count of the last-declared group.
    pub fn times(self, n: usize) -> Self {
        self.set_repeat(Repeat::Times(n))
    }

    /// Makes the last-declared group answer every remaining call.
    pub fn any_times(self) -> Self {
        self.set_repeat(Repeat::Unbounded)
    }

    /// Overrides the number of calls required at teardown.
    pub fn min_times(mut self, n: usize) -> Self {
        self.minimum = Some(n);
        self
    }

    /// Requires `before` to fire first.
    pub fn after(mut self, before: &Expectation) -> Self {
        self.after.push(before.id());
        self
    }

    /// Registers the expectation with the controller.
    pub fn register(self) -> Result<Expectation, SetupError> {
        if let Some(err) = self.deferred {
            return Err(err);
        }
        self.controller
            .register_with(self.site, self.matcher, self.groups, self.minimum, &self.after)
    }

    fn set_repeat(mut self, repeat: Repeat) -> Self {
        match self.groups.last_mut() {
            Some(group) => group.repeat = repeat,
            None => {
                self.deferred
                    .get_or_insert(SetupError::EmptyOutcomes(self.site.id()));
            }
        }
        self
    }
}

impl<A, R> ExpectationBuilder<'_, A, R>
where
    A: fmt::Debug + 'static,
    R: Clone + Default + Send + Sync + 'static,
{
    /// Opens a new group returning `R::default()` once.
    ///
    /// Handy for calls whose return value the test does not care about.
    pub fn returning_default(self) -> Self {
        self.returning(R::default())
    }
}

impl<A, R> fmt::Debug for ExpectationBuilder<'_, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpectationBuilder")
            .field("site", &self.site)
            .field("groups", &self.groups.len())
            .field("minimum", &self.minimum)
            .field("after", &self.after)
            .finish_non_exhaustive()
    }
}

impl<A, R: Clone> Behavior<A, R> {
    /// Outcome answering the call made after `consumed` earlier ones.
    pub fn outcome_at(&self, consumed: usize) -> Option<(usize, Outcome<A, R>)> {
        let index = crate::outcome::select(&self.groups, consumed)?;
        self.groups.get(index).map(|g| (index, g.outcome.clone()))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn entry(consumed: usize, capacity: Option<usize>, minimum: usize) -> Entry {
        Entry {
            id: ExpectationId::from_raw(1),
            target: TargetId::method("Store::get"),
            signature: TypeId::of::<()>(),
            label: "Store::get(any) #1".into(),
            consumed,
            capacity,
            minimum,
            behavior: Box::new(()),
        }
    }

    #[test]
    fn state_machine_follows_consumption() {
        assert_eq!(entry(0, Some(2), 2).state(), ExpectationState::Pending);
        assert_eq!(entry(1, Some(2), 2).state(), ExpectationState::Partial);
        assert_eq!(entry(2, Some(2), 2).state(), ExpectationState::Exhausted);
        assert_eq!(entry(500, None, 0).state(), ExpectationState::Partial);
    }

    #[test]
    fn predecessor_needs_one_call_even_with_zero_minimum() {
        assert!(!entry(0, None, 0).releases_successors());
        assert!(entry(1, None, 0).releases_successors());
        assert!(!entry(1, Some(3), 2).releases_successors());
    }

    #[test]
    fn label_names_site_matcher_and_id() {
        let label = label_for(
            TargetId::method("StorageClient::get"),
            "eq \"k1\"",
            ExpectationId::from_raw(4),
        );
        assert_eq!(label, "StorageClient::get(eq \"k1\") #4");
    }
}
