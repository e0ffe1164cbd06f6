// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Precedence constraints between expectations.
//!
//! An edge `before -> after` means `after` may not be satisfied until `before`
//! has fired. The edge set is kept acyclic: a declaration that would close a
//! cycle is rejected before any call traffic happens.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::SetupError;
use crate::expectation::ExpectationId;

/// Directed acyclic precedence graph over expectations.
#[derive(Debug, Clone, Default)]
pub struct OrderGraph {
    preds: BTreeMap<ExpectationId, BTreeSet<ExpectationId>>,
    succs: BTreeMap<ExpectationId, BTreeSet<ExpectationId>>,
}

impl OrderGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `before -> after`.
    ///
    /// # Errors
    /// [`SetupError::SelfOrder`] for a self edge, [`SetupError::OrderCycle`] if
    /// `after` already reaches `before`.
    pub fn declare(&mut self, before: ExpectationId, after: ExpectationId) -> Result<(), SetupError> {
        if before == after {
            return Err(SetupError::SelfOrder(before));
        }
        if self.reaches(after, before) {
            return Err(SetupError::OrderCycle { before, after });
        }
        self.succs.entry(before).or_default().insert(after);
        self.preds.entry(after).or_default().insert(before);
        Ok(())
    }

    /// Declares every consecutive pair of `chain`; on error no edge is kept.
    pub fn declare_chain(&mut self, chain: &[ExpectationId]) -> Result<(), SetupError> {
        let mut staged = self.clone();
        for pair in chain.windows(2) {
            staged.declare(pair[0], pair[1])?;
        }
        *self = staged;
        Ok(())
    }

    /// Whether a path `from -> .. -> to` exists.
    pub fn reaches(&self, from: ExpectationId, to: ExpectationId) -> bool {
        let mut stack = vec![from];
        let mut seen = BTreeSet::new();
        while let Some(node) = stack.pop() {
            if node == to {
                return true;
            }
            if !seen.insert(node) {
                continue;
            }
            if let Some(next) = self.succs.get(&node) {
                stack.extend(next.iter().copied());
            }
        }
        false
    }

    /// Direct predecessors of `id`.
    pub fn predecessors(&self, id: ExpectationId) -> impl Iterator<Item = ExpectationId> + '_ {
        self.preds.get(&id).into_iter().flatten().copied()
    }

    /// Number of declared edges.
    pub fn edge_count(&self) -> usize {
        self.succs.values().map(BTreeSet::len).sum()
    }

    /// Whether `firing` may be satisfied now.
    ///
    /// Returns the first direct predecessor for which `is_satisfied` is false.
    pub fn check(
        &self,
        firing: ExpectationId,
        is_satisfied: impl Fn(ExpectationId) -> bool,
    ) -> Result<(), ExpectationId> {
        match self.predecessors(firing).find(|p| !is_satisfied(*p)) {
            Some(blocking) => Err(blocking),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn id(n: u64) -> ExpectationId {
        ExpectationId::from_raw(n)
    }

    #[test]
    fn self_edge_is_rejected() {
        let mut g = OrderGraph::new();
        assert_eq!(g.declare(id(1), id(1)), Err(SetupError::SelfOrder(id(1))));
    }

    #[test]
    fn transitive_cycle_is_rejected() {
        let mut g = OrderGraph::new();
        g.declare(id(1), id(2)).unwrap();
        g.declare(id(2), id(3)).unwrap();
        assert_eq!(
            g.declare(id(3), id(1)),
            Err(SetupError::OrderCycle {
                before: id(3),
                after: id(1)
            })
        );
        assert_eq!(g.edge_count(), 2);
    }

    #[test]
    fn chain_is_all_or_nothing() {
        let mut g = OrderGraph::new();
        g.declare(id(3), id(1)).unwrap();
        let err = g.declare_chain(&[id(1), id(2), id(3)]).unwrap_err();
        assert!(matches!(err, SetupError::OrderCycle { .. }));
        assert_eq!(g.edge_count(), 1);
        assert!(!g.reaches(id(1), id(2)));
    }

    #[test]
    fn check_reports_first_unsatisfied_predecessor() {
        let mut g = OrderGraph::new();
        g.declare_chain(&[id(1), id(2), id(3)]).unwrap();
        assert_eq!(g.check(id(1), |_| false), Ok(()));
        assert_eq!(g.check(id(3), |p| p == id(1)), Err(id(2)));
        assert_eq!(g.check(id(3), |_| true), Ok(()));
    }

    #[test]
    fn diamond_is_acyclic() {
        let mut g = OrderGraph::new();
        g.declare(id(1), id(2)).unwrap();
        g.declare(id(1), id(3)).unwrap();
        g.declare(id(2), id(4)).unwrap();
        g.declare(id(3), id(4)).unwrap();
        assert!(g.reaches(id(1), id(4)));
        assert_eq!(g.predecessors(id(4)).collect::<Vec<_>>(), vec![id(2), id(3)]);
    }
}
