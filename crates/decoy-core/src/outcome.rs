// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Outcome groups: what an expectation answers, and for how many calls.

use std::fmt;
use std::sync::Arc;

use crate::error::SetupError;
use crate::target::TargetId;

/// What a satisfied call returns.
pub enum Outcome<A, R> {
    /// A fixed value, cloned per call.
    Value(R),
    /// A function of the call's arguments.
    Compute(Arc<dyn Fn(&A) -> R + Send + Sync>),
}

impl<A, R: Clone> Outcome<A, R> {
    /// Produces the return value for `args`.
    pub fn produce(&self, args: &A) -> R {
        match self {
            Self::Value(v) => v.clone(),
            Self::Compute(f) => f(args),
        }
    }
}

impl<A, R: Clone> Clone for Outcome<A, R> {
    fn clone(&self) -> Self {
        match self {
            Self::Value(v) => Self::Value(v.clone()),
            Self::Compute(f) => Self::Compute(Arc::clone(f)),
        }
    }
}

impl<A, R: fmt::Debug> fmt::Debug for Outcome<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Compute(_) => f.write_str("Compute(..)"),
        }
    }
}

/// How many calls a group answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    /// Exactly this many calls.
    Times(usize),
    /// Every remaining call.
    Unbounded,
}

/// An outcome together with its repeat count.
pub struct OutcomeGroup<A, R> {
    /// Value or computation.
    pub outcome: Outcome<A, R>,
    /// Number of calls answered.
    pub repeat: Repeat,
}

impl<A, R> OutcomeGroup<A, R> {
    /// Returns `value` for one call.
    pub fn once(value: R) -> Self {
        Self::times(value, 1)
    }

    /// Returns `value` for `n` calls.
    pub fn times(value: R, n: usize) -> Self {
        Self {
            outcome: Outcome::Value(value),
            repeat: Repeat::Times(n),
        }
    }

    /// Returns `value` for every remaining call.
    pub fn unbounded(value: R) -> Self {
        Self {
            outcome: Outcome::Value(value),
            repeat: Repeat::Unbounded,
        }
    }

    /// Computes the return value from the arguments for one call.
    pub fn compute<F>(f: F) -> Self
    where
        F: Fn(&A) -> R + Send + Sync + 'static,
    {
        Self {
            outcome: Outcome::Compute(Arc::new(f)),
            repeat: Repeat::Times(1),
        }
    }

    /// Replaces the repeat count.
    #[must_use]
    pub fn repeat(mut self, repeat: Repeat) -> Self {
        self.repeat = repeat;
        self
    }
}

impl<A, R: Clone> Clone for OutcomeGroup<A, R> {
    fn clone(&self) -> Self {
        Self {
            outcome: self.outcome.clone(),
            repeat: self.repeat,
        }
    }
}

impl<A, R: fmt::Debug> fmt::Debug for OutcomeGroup<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutcomeGroup")
            .field("outcome", &self.outcome)
            .field("repeat", &self.repeat)
            .finish()
    }
}

/// Capacity of a validated group list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Capacity {
    /// Sum of the bounded repeat counts.
    pub bounded: usize,
    /// Whether the final group never runs out.
    pub unbounded: bool,
}

impl Capacity {
    /// `None` means the expectation is never exhausted.
    pub(crate) fn limit(self) -> Option<usize> {
        (!self.unbounded).then_some(self.bounded)
    }
}

/// Checks the group list and computes its capacity.
pub(crate) fn validate<A, R>(
    target: TargetId,
    groups: &[OutcomeGroup<A, R>],
) -> Result<Capacity, SetupError> {
    if groups.is_empty() {
        return Err(SetupError::EmptyOutcomes(target));
    }
    let last = groups.len() - 1;
    let mut bounded = 0_usize;
    let mut unbounded = false;
    for (group, g) in groups.iter().enumerate() {
        match g.repeat {
            Repeat::Times(0) => return Err(SetupError::ZeroRepeat { target, group }),
            Repeat::Times(n) => bounded = bounded.saturating_add(n),
            Repeat::Unbounded if group != last => {
                return Err(SetupError::UnboundedNotLast { target, group });
            }
            Repeat::Unbounded => unbounded = true,
        }
    }
    Ok(Capacity { bounded, unbounded })
}

/// Index of the group that answers the call made after `consumed` earlier ones.
///
/// `None` once every bounded group has been used up.
pub(crate) fn select<A, R>(groups: &[OutcomeGroup<A, R>], consumed: usize) -> Option<usize> {
    let mut seen = 0_usize;
    for (index, g) in groups.iter().enumerate() {
        match g.repeat {
            Repeat::Unbounded => return Some(index),
            Repeat::Times(n) => {
                seen = seen.saturating_add(n);
                if consumed < seen {
                    return Some(index);
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    const SITE: TargetId = TargetId::method("Store::get");

    #[test]
    fn selection_walks_groups_in_declaration_order() {
        let groups: Vec<OutcomeGroup<(), &str>> =
            vec![OutcomeGroup::times("a", 2), OutcomeGroup::once("b")];
        let picks: Vec<_> = (0..4).map(|c| select(&groups, c)).collect();
        assert_eq!(picks, vec![Some(0), Some(0), Some(1), None]);
        assert_eq!(
            validate(SITE, &groups).unwrap(),
            Capacity {
                bounded: 3,
                unbounded: false
            }
        );
    }

    #[test]
    fn unbounded_tail_never_runs_out() {
        let groups: Vec<OutcomeGroup<(), u8>> =
            vec![OutcomeGroup::once(1), OutcomeGroup::unbounded(2)];
        assert_eq!(select(&groups, 0), Some(0));
        assert_eq!(select(&groups, 1_000), Some(1));
        assert_eq!(validate(SITE, &groups).unwrap().limit(), None);
    }

    #[test]
    fn malformed_group_lists_are_rejected() {
        let empty: Vec<OutcomeGroup<(), u8>> = Vec::new();
        assert_eq!(validate(SITE, &empty), Err(SetupError::EmptyOutcomes(SITE)));

        let zero: Vec<OutcomeGroup<(), u8>> = vec![OutcomeGroup::times(1, 0)];
        assert_eq!(
            validate(SITE, &zero),
            Err(SetupError::ZeroRepeat {
                target: SITE,
                group: 0
            })
        );

        let early: Vec<OutcomeGroup<(), u8>> =
            vec![OutcomeGroup::unbounded(1), OutcomeGroup::once(2)];
        assert_eq!(
            validate(SITE, &early),
            Err(SetupError::UnboundedNotLast {
                target: SITE,
                group: 0
            })
        );
    }

    #[test]
    fn compute_outcome_sees_arguments() {
        let group: OutcomeGroup<(i32, i32), i32> = OutcomeGroup::compute(|(a, b)| a + b);
        assert_eq!(group.outcome.produce(&(2, 3)), 5);
    }
}
