// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-test controller: patches, expectations, ordering, teardown.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info, instrument, trace, warn};

use crate::call_site::CallSite;
use crate::config::{ConfigError, ControllerConfig, MatchPriority};
use crate::error::{
    CallError, OutOfOrderError, SetupError, UnmatchedCallError, UnmatchedReason, UnmetExpectation,
    UnsatisfiedExpectationError,
};
use crate::expectation::{
    label_for, Behavior, Entry, Expectation, ExpectationBuilder, ExpectationId, ExpectationState,
};
use crate::matcher::{any, Matcher};
use crate::order::OrderGraph;
use crate::outcome::{validate, OutcomeGroup};
use crate::patch_set::PatchSet;
use crate::target::{Func, Target, TargetId};

/// One successfully answered call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    /// Expectation that answered.
    pub expectation: ExpectationId,
    /// Call site that was invoked.
    pub target: TargetId,
    /// Debug rendering of the arguments.
    pub args: String,
    /// Zero-based outcome group that produced the value.
    pub group: usize,
}

type Teardown = Result<(), UnsatisfiedExpectationError>;

#[derive(Default)]
struct State {
    expectations: Vec<Entry>,
    order: OrderGraph,
    calls: Vec<CallRecord>,
    finished: Option<Teardown>,
}

impl State {
    fn entry(&self, id: ExpectationId) -> Option<&Entry> {
        self.expectations.iter().find(|e| e.id == id)
    }

    fn knows(&self, expectation: &Expectation) -> bool {
        self.entry(expectation.id())
            .is_some_and(|e| e.target == expectation.target())
    }

    fn ensure_open(&self) -> Result<(), SetupError> {
        if self.finished.is_some() {
            return Err(SetupError::Finished);
        }
        Ok(())
    }

    fn ensure_known(&self, expectation: &Expectation) -> Result<(), SetupError> {
        if self.knows(expectation) {
            Ok(())
        } else {
            Err(SetupError::UnknownExpectation(expectation.id()))
        }
    }

    fn verify(&self) -> Teardown {
        let unmet: Vec<UnmetExpectation> = self
            .expectations
            .iter()
            .filter(|e| e.consumed < e.minimum)
            .map(|e| UnmetExpectation {
                expectation: e.id,
                label: e.label.clone(),
                minimum: e.minimum,
                consumed: e.consumed,
            })
            .collect();
        if unmet.is_empty() {
            Ok(())
        } else {
            Err(UnsatisfiedExpectationError { unmet })
        }
    }
}

struct Shared {
    config: ControllerConfig,
    state: Mutex<State>,
    patches: Mutex<PatchSet>,
}

/// Per-test-case owner of patches, expectations and ordering constraints.
///
/// `Controller` is a cheap handle; doubles keep a clone and route their calls
/// through [`Controller::invoke`]. Call [`finish`](Self::finish) (or hold a
/// [`FinishGuard`]) at the end of the test: it verifies every expectation and
/// rolls every patch back, exactly once.
///
/// A double that is itself installed into a patched target keeps the
/// controller alive through that target until `finish` removes the patch.
#[derive(Clone)]
pub struct Controller {
    shared: Arc<Shared>,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

impl Controller {
    /// Controller with default configuration.
    pub fn new() -> Self {
        Self::with_config(ControllerConfig::default())
    }

    /// Controller with explicit configuration.
    pub fn with_config(config: ControllerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(State::default()),
                patches: Mutex::new(PatchSet::new()),
            }),
        }
    }

    /// Controller configured from [`CONFIG_ENV_VAR`](crate::CONFIG_ENV_VAR); defaults when unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match ControllerConfig::from_env() {
            Ok(config) => Ok(Self::with_config(config)),
            Err(ConfigError::NotFound) => Ok(Self::new()),
            Err(e) => Err(e),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &ControllerConfig {
        &self.shared.config
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn patches(&self) -> MutexGuard<'_, PatchSet> {
        self.shared
            .patches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Substitutes `replacement` on `target` until teardown.
    pub fn patch<T>(&self, target: &Target<T>, replacement: T) -> Result<&Self, SetupError>
    where
        T: Clone + Send + Sync + 'static,
    {
        // Holding the patch set across the check keeps a racing `finish` from
        // resetting before this patch lands.
        let mut patches = self.patches();
        self.state().ensure_open()?;
        patches.apply(target, replacement);
        Ok(self)
    }

    /// Patches a function target with a replacement that answers from `groups`
    /// in order, whatever the arguments.
    ///
    /// The returned expectation takes part in verification and ordering like
    /// any other.
    pub fn patch_seq<A, R>(
        &self,
        target: &Target<Func<A, R>>,
        groups: Vec<OutcomeGroup<A, R>>,
    ) -> Result<Expectation, SetupError>
    where
        A: fmt::Debug + Send + 'static,
        R: Clone + Send + Sync + 'static,
    {
        let site = target.call_site();
        let expectation = self.register(site, None, groups)?;
        let weak = Arc::downgrade(&self.shared);
        let replacement: Func<A, R> = Arc::new(move |args: A| match weak.upgrade() {
            Some(shared) => Self { shared }.invoke(site, args),
            None => std::panic::panic_any(CallError::from(UnmatchedCallError {
                target: site.id(),
                args: format!("{args:?}"),
                reason: UnmatchedReason::ControllerDropped,
            })),
        });
        self.patch(target, replacement)?;
        Ok(expectation)
    }

    /// Starts building an expectation on `site`.
    pub fn expect<A, R>(&self, site: CallSite<A, R>) -> ExpectationBuilder<'_, A, R>
    where
        A: fmt::Debug + 'static,
        R: Clone + Send + Sync + 'static,
    {
        ExpectationBuilder::new(self, site)
    }

    /// Registers an expectation directly; `None` matches any arguments.
    pub fn register<A, R>(
        &self,
        site: CallSite<A, R>,
        matcher: Option<Box<dyn Matcher<A>>>,
        groups: Vec<OutcomeGroup<A, R>>,
    ) -> Result<Expectation, SetupError>
    where
        A: fmt::Debug + 'static,
        R: Clone + Send + Sync + 'static,
    {
        self.register_with(site, matcher, groups, None, &[])
    }

    pub(crate) fn register_with<A, R>(
        &self,
        site: CallSite<A, R>,
        matcher: Option<Box<dyn Matcher<A>>>,
        groups: Vec<OutcomeGroup<A, R>>,
        minimum: Option<usize>,
        after: &[ExpectationId],
    ) -> Result<Expectation, SetupError>
    where
        A: fmt::Debug + 'static,
        R: Clone + Send + Sync + 'static,
    {
        let target = site.id();
        let capacity = validate(target, &groups)?;
        let minimum = minimum.unwrap_or(capacity.bounded);
        if let Some(limit) = capacity.limit() {
            if minimum > limit {
                return Err(SetupError::MinimumExceedsCapacity {
                    target,
                    minimum,
                    capacity: limit,
                });
            }
        }
        let matcher: Arc<dyn Matcher<A>> = match matcher {
            Some(m) => Arc::from(m),
            None => Arc::new(any()),
        };

        let mut state = self.state();
        state.ensure_open()?;
        if let Some(missing) = after.iter().find(|id| state.entry(**id).is_none()) {
            return Err(SetupError::UnknownExpectation(*missing));
        }

        let id = ExpectationId::next();
        let mut order = state.order.clone();
        for before in after {
            order.declare(*before, id)?;
        }
        state.order = order;

        let label = label_for(target, &matcher.describe(), id);
        debug!(expectation = %label, minimum, capacity = ?capacity.limit(), "expectation registered");
        let entry = Entry {
            id,
            target,
            signature: site.signature(),
            label,
            consumed: 0,
            capacity: capacity.limit(),
            minimum,
            behavior: Box::new(Behavior { matcher, groups }),
        };
        let handle = entry.handle();
        state.expectations.push(entry);
        Ok(handle)
    }

    /// Requires `before` to fire before `after` may be satisfied.
    pub fn declare_order(&self, before: &Expectation, after: &Expectation) -> Result<(), SetupError> {
        let mut state = self.state();
        state.ensure_open()?;
        state.ensure_known(before)?;
        state.ensure_known(after)?;
        state.order.declare(before.id(), after.id())?;
        debug!(before = %before, after = %after, "order declared");
        Ok(())
    }

    /// Declares a strict chain: each expectation after the previous one.
    ///
    /// Either every edge is added or none is.
    pub fn in_order(&self, chain: &[&Expectation]) -> Result<(), SetupError> {
        let mut state = self.state();
        state.ensure_open()?;
        for expectation in chain {
            state.ensure_known(expectation)?;
        }
        let ids: Vec<ExpectationId> = chain.iter().map(|e| e.id()).collect();
        state.order.declare_chain(&ids)?;
        debug!(len = ids.len(), "order chain declared");
        Ok(())
    }

    /// Routes one call through the registered expectations.
    ///
    /// Matchers run before the state lock is taken, so a predicate may call
    /// back into the controller. Selection and consumption then happen under
    /// one lock, so concurrent callers never claim the same outcome slot.
    /// Computed outcomes run after the lock is released.
    pub fn call<A, R>(&self, site: CallSite<A, R>, args: A) -> Result<R, CallError>
    where
        A: fmt::Debug + 'static,
        R: Clone + Send + Sync + 'static,
    {
        let target = site.id();
        let candidates = self.candidates(site);
        let accepted: Vec<ExpectationId> = candidates
            .iter()
            .filter(|(_, matcher)| matcher.matches(&args))
            .map(|(id, _)| *id)
            .collect();

        let outcome = {
            let mut guard = self.state();
            let state = &mut *guard;

            let chosen = accepted.iter().find_map(|id| {
                state
                    .expectations
                    .iter()
                    .position(|e| e.id == *id && !e.is_exhausted())
            });

            let Some(index) = chosen else {
                let reason = if candidates.is_empty() {
                    UnmatchedReason::NoExpectations
                } else if !accepted.is_empty() {
                    UnmatchedReason::Exhausted
                } else {
                    UnmatchedReason::ArgumentsRejected
                };
                let err = CallError::from(UnmatchedCallError {
                    target,
                    args: format!("{args:?}"),
                    reason,
                });
                warn!(target_id = %target, error = %err, "call rejected");
                return Err(err);
            };

            let firing = state.expectations[index].id;
            let expectations = &state.expectations;
            let blocked = state.order.check(firing, |p| {
                expectations
                    .iter()
                    .find(|e| e.id == p)
                    .is_some_and(Entry::releases_successors)
            });
            if let Err(before_id) = blocked {
                let before = state
                    .entry(before_id)
                    .map_or_else(|| before_id.to_string(), |e| e.label.clone());
                let err = CallError::from(OutOfOrderError {
                    target,
                    args: format!("{args:?}"),
                    before_id,
                    before,
                    after_id: firing,
                    after: state.expectations[index].label.clone(),
                });
                warn!(target_id = %target, error = %err, "call rejected");
                return Err(err);
            }

            let entry = &mut state.expectations[index];
            let Some((group, outcome)) = entry
                .behavior
                .downcast_ref::<Behavior<A, R>>()
                .and_then(|b| b.outcome_at(entry.consumed))
            else {
                let err = CallError::from(UnmatchedCallError {
                    target,
                    args: format!("{args:?}"),
                    reason: UnmatchedReason::Exhausted,
                });
                warn!(target_id = %target, error = %err, "call rejected");
                return Err(err);
            };
            entry.consumed += 1;
            trace!(expectation = %entry.label, group, consumed = entry.consumed, "call matched");
            if self.shared.config.record_calls {
                state.calls.push(CallRecord {
                    expectation: firing,
                    target,
                    args: format!("{args:?}"),
                    group,
                });
            }
            outcome
        };
        Ok(outcome.produce(&args))
    }

    /// Matchers of the expectations bound to `site`, in priority order.
    fn candidates<A, R>(&self, site: CallSite<A, R>) -> Vec<(ExpectationId, Arc<dyn Matcher<A>>)>
    where
        A: 'static,
        R: 'static,
    {
        let state = self.state();
        let target = site.id();
        let signature = site.signature();
        let mut candidates: Vec<_> = state
            .expectations
            .iter()
            .filter(|e| e.target == target && e.signature == signature)
            .filter_map(|e| {
                e.behavior
                    .downcast_ref::<Behavior<A, R>>()
                    .map(|b| (e.id, Arc::clone(&b.matcher)))
            })
            .collect();
        if self.shared.config.priority == MatchPriority::Lifo {
            candidates.reverse();
        }
        candidates
    }

    /// Like [`call`](Self::call), but a failure panics with the [`CallError`]
    /// as payload. This is the form doubles use.
    pub fn invoke<A, R>(&self, site: CallSite<A, R>, args: A) -> R
    where
        A: fmt::Debug + 'static,
        R: Clone + Send + Sync + 'static,
    {
        match self.call(site, args) {
            Ok(value) => value,
            Err(err) => std::panic::panic_any(err),
        }
    }

    /// Consumption state of `expectation`, if it belongs to this controller.
    pub fn state_of(&self, expectation: &Expectation) -> Option<ExpectationState> {
        self.state().entry(expectation.id()).map(Entry::state)
    }

    /// Calls consumed by `expectation` so far.
    pub fn consumed(&self, expectation: &Expectation) -> Option<usize> {
        self.state().entry(expectation.id()).map(|e| e.consumed)
    }

    /// Successful calls in the order they were answered.
    pub fn calls(&self) -> Vec<CallRecord> {
        self.state().calls.clone()
    }

    /// Targets currently patched by this controller, in application order.
    pub fn patched_targets(&self) -> Vec<TargetId> {
        self.patches().targets()
    }

    /// Whether teardown already ran.
    pub fn is_finished(&self) -> bool {
        self.state().finished.is_some()
    }

    /// Checks every expectation's minimum without tearing down.
    pub fn verify(&self) -> Result<(), UnsatisfiedExpectationError> {
        self.state().verify()
    }

    /// Verifies, then rolls back every patch regardless of the result.
    ///
    /// Only the first call does any work; later calls return the same result.
    pub fn finish(&self) -> Result<(), UnsatisfiedExpectationError> {
        self.teardown().0
    }

    #[instrument(skip(self), fields(label = ?self.shared.config.label))]
    fn teardown(&self) -> (Teardown, bool) {
        let outcome = {
            let mut state = self.state();
            if let Some(done) = &state.finished {
                return (done.clone(), false);
            }
            let outcome = state.verify();
            state.finished = Some(outcome.clone());
            outcome
        };
        let restored = self.patches().reset_all();
        match &outcome {
            Ok(()) => info!(restored, "controller finished"),
            Err(e) => warn!(restored, unmet = e.unmet.len(), "controller finished with unmet expectations"),
        }
        (outcome, true)
    }

    /// Guard that finishes the controller when dropped.
    pub fn finish_guard(&self) -> FinishGuard {
        FinishGuard {
            controller: self.clone(),
        }
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Controller")
            .field("label", &self.shared.config.label)
            .field("expectations", &state.expectations.len())
            .field("order_edges", &state.order.edge_count())
            .field("finished", &state.finished.is_some())
            .finish_non_exhaustive()
    }
}

/// Runs [`Controller::finish`] on drop.
///
/// If this guard performs the teardown and verification fails, the failure is
/// logged and, unless disabled through
/// [`ControllerConfig::panic_on_drop_failure`] or the thread is already
/// unwinding, raised as an [`UnsatisfiedExpectationError`] panic payload.
#[must_use = "dropping the guard immediately finishes the controller"]
#[derive(Debug)]
pub struct FinishGuard {
    controller: Controller,
}

impl FinishGuard {
    /// Controller this guard tears down.
    pub fn controller(&self) -> &Controller {
        &self.controller
    }
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        let (outcome, first) = self.controller.teardown();
        if let (Err(err), true) = (outcome, first) {
            error!(%err, "unsatisfied expectations at teardown");
            if self.controller.shared.config.panic_on_drop_failure && !std::thread::panicking() {
                std::panic::panic_any(err);
            }
        }
    }
}
