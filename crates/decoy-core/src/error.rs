// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error taxonomy.
//!
//! - [`SetupError`]: test construction is malformed; raised before any call traffic.
//! - [`CallError`]: an intercepted call could not be satisfied; raised at the call site.
//! - [`UnsatisfiedExpectationError`]: teardown found unmet minimums; aggregated.
//! - [`DuplicatePatchError`]: a patch handle was applied twice without a reset.
//!
//! Nothing is retried. A mismatch is a failed test.

use std::fmt;

use thiserror::Error;

use crate::config::ConfigError;
use crate::expectation::ExpectationId;
use crate::patch::PatchId;
use crate::target::TargetId;

/// A patch handle was applied while it was still active.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{patch} is already active on {target}")]
pub struct DuplicatePatchError {
    /// Target the handle substitutes.
    pub target: TargetId,
    /// The offending handle.
    pub patch: PatchId,
}

/// Malformed test setup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    /// Adding `before -> after` would close a cycle in the order graph.
    #[error("order cycle: {after} already precedes {before}")]
    OrderCycle {
        /// Requested predecessor.
        before: ExpectationId,
        /// Requested successor.
        after: ExpectationId,
    },
    /// An expectation was ordered after itself.
    #[error("expectation {0} cannot be ordered after itself")]
    SelfOrder(ExpectationId),
    /// The expectation is not registered with this controller.
    #[error("unknown expectation {0}")]
    UnknownExpectation(ExpectationId),
    /// No outcome groups were declared.
    #[error("no outcomes declared for {0}")]
    EmptyOutcomes(TargetId),
    /// An outcome group would answer zero calls.
    #[error("outcome group {group} for {target} has a zero repeat count")]
    ZeroRepeat {
        /// Call site the expectation is bound to.
        target: TargetId,
        /// Zero-based group index.
        group: usize,
    },
    /// Only the final outcome group may be unbounded.
    #[error("unbounded outcome group {group} for {target} is not the last group")]
    UnboundedNotLast {
        /// Call site the expectation is bound to.
        target: TargetId,
        /// Zero-based group index.
        group: usize,
    },
    /// The declared minimum can never be reached.
    #[error("minimum of {minimum} calls exceeds capacity {capacity} for {target}")]
    MinimumExceedsCapacity {
        /// Call site the expectation is bound to.
        target: TargetId,
        /// Requested minimum.
        minimum: usize,
        /// Total bounded capacity.
        capacity: usize,
    },
    /// Another target is already registered under this name.
    #[error("duplicate target name: {0}")]
    DuplicateTarget(TargetId),
    /// The registered target holds a different value type.
    #[error("target `{0}` is registered with a different value type")]
    TargetTypeMismatch(String),
    /// The patch handle is not installed.
    #[error("patch on {0} is not active")]
    InactivePatch(TargetId),
    /// The controller already ran its teardown.
    #[error("controller already finished")]
    Finished,
    /// Self-duplicating patch.
    #[error(transparent)]
    DuplicatePatch(#[from] DuplicatePatchError),
}

/// Why no expectation accepted a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmatchedReason {
    /// Nothing is registered for the call site.
    NoExpectations,
    /// Expectations exist but every matcher rejected the arguments.
    ArgumentsRejected,
    /// Every accepting expectation has used up its capacity.
    Exhausted,
    /// The controller that backed the double no longer exists.
    ControllerDropped,
}

impl fmt::Display for UnmatchedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NoExpectations => "no expectations registered",
            Self::ArgumentsRejected => "arguments rejected by every matcher",
            Self::Exhausted => "all matching expectations exhausted",
            Self::ControllerDropped => "controller dropped",
        };
        f.write_str(text)
    }
}

/// An intercepted call found no matching, unexhausted expectation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unexpected call to {target} with {args}: {reason}")]
pub struct UnmatchedCallError {
    /// Call site that was invoked.
    pub target: TargetId,
    /// Debug rendering of the arguments.
    pub args: String,
    /// Classification of the miss.
    pub reason: UnmatchedReason,
}

/// A call would satisfy an expectation whose predecessors have not fired.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("out-of-order call to {target} with {args}: `{after}` requires `{before}` first")]
pub struct OutOfOrderError {
    /// Call site that was invoked.
    pub target: TargetId,
    /// Debug rendering of the arguments.
    pub args: String,
    /// Unsatisfied predecessor.
    pub before_id: ExpectationId,
    /// Label of the predecessor.
    pub before: String,
    /// Expectation the call selected.
    pub after_id: ExpectationId,
    /// Label of the selected expectation.
    pub after: String,
}

/// Failure of one intercepted call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// No expectation matched.
    #[error(transparent)]
    Unmatched(#[from] UnmatchedCallError),
    /// Precedence constraint violated.
    #[error(transparent)]
    OutOfOrder(#[from] OutOfOrderError),
}

impl CallError {
    /// Call site the failed call was aimed at.
    pub fn target(&self) -> TargetId {
        match self {
            Self::Unmatched(e) => e.target,
            Self::OutOfOrder(e) => e.target,
        }
    }
}

/// One expectation that did not reach its minimum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmetExpectation {
    /// Expectation id.
    pub expectation: ExpectationId,
    /// Human-readable label (call site, matcher, id).
    pub label: String,
    /// Required number of calls.
    pub minimum: usize,
    /// Calls actually consumed.
    pub consumed: usize,
}

impl fmt::Display for UnmetExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} called {} of {} time(s)",
            self.label, self.consumed, self.minimum
        )
    }
}

fn summarize(unmet: &[UnmetExpectation]) -> String {
    unmet
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Every expectation that missed its minimum, collected in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} unsatisfied expectation(s): {}", .unmet.len(), summarize(.unmet))]
pub struct UnsatisfiedExpectationError {
    /// Unmet expectations in registration order.
    pub unmet: Vec<UnmetExpectation>,
}

/// Umbrella error for callers that want a single `?` type.
#[derive(Debug, Error)]
pub enum DecoyError {
    /// Setup failure.
    #[error(transparent)]
    Setup(#[from] SetupError),
    /// Call failure.
    #[error(transparent)]
    Call(#[from] CallError),
    /// Teardown verification failure.
    #[error(transparent)]
    Unsatisfied(#[from] UnsatisfiedExpectationError),
    /// Configuration failure.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
