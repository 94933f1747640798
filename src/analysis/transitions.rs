//! Counting state changes along tree edges.

use crate::analysis::ancestral::StateAssignment;
use crate::error::AnalysisError;
use crate::model::{NodeId, PhyloTree, StateCode};
use log::debug;
use serde::Serialize;
use std::collections::BTreeMap;

/// An aggregated, directed state change: `weight` edges went from a parent
/// in state `from` to a child in state `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub from: StateCode,
    pub to: StateCode,
    pub weight: usize,
}

/// All observed transitions of one tree, ordered by `(from, to)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionSet {
    transitions: Vec<Transition>,
    skipped_missing: usize,
}

impl TransitionSet {
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.iter()
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Weight of `from -> to`, 0 if never observed.
    pub fn weight(&self, from: StateCode, to: StateCode) -> usize {
        self.transitions
            .iter()
            .find(|t| t.from == from && t.to == to)
            .map_or(0, |t| t.weight)
    }

    /// Number of edges whose endpoints differ.
    pub fn total_weight(&self) -> usize {
        self.transitions.iter().map(|t| t.weight).sum()
    }

    /// Number of edges not compared because an endpoint has missing data.
    pub fn skipped_missing(&self) -> usize {
        self.skipped_missing
    }
}

/// Accumulates `(parent state, child state)` pairs of tree edges.
///
/// Pairs are keyed by direction, so `A -> B` and `B -> A` are counted
/// separately. Edges with equal endpoint states are not counted; edges
/// touching a node with missing data are skipped.
#[derive(Debug, Clone, Default)]
pub struct TransitionAggregator {
    counts: BTreeMap<(StateCode, StateCode), usize>,
    skipped_missing: usize,
}

impl TransitionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregates all edges of `tree`.
    ///
    /// # Errors
    /// [AnalysisError::TreeMismatch] if `assignment` does not cover every node.
    pub fn aggregate(
        tree: &PhyloTree,
        assignment: &StateAssignment,
    ) -> Result<TransitionSet, AnalysisError> {
        if assignment.num_nodes() != tree.num_nodes() {
            return Err(AnalysisError::TreeMismatch(format!(
                "{} assigned states for {} nodes",
                assignment.num_nodes(),
                tree.num_nodes()
            )));
        }
        Self::aggregate_edges(tree.edges(), assignment)
    }

    /// Aggregates an arbitrary list of `(parent, child)` edges.
    ///
    /// # Errors
    /// [AnalysisError::TreeMismatch] if an edge names a node without state.
    pub fn aggregate_edges<I>(
        edges: I,
        assignment: &StateAssignment,
    ) -> Result<TransitionSet, AnalysisError>
    where
        I: IntoIterator<Item = (NodeId, NodeId)>,
    {
        let mut aggregator = Self::new();
        for (parent, child) in edges {
            let state_of = |node: NodeId| {
                assignment.get(node).ok_or_else(|| {
                    AnalysisError::TreeMismatch(format!("edge node {node} has no assigned state"))
                })
            };
            let (from, to) = (state_of(parent)?, state_of(child)?);
            match (from, to) {
                (Some(from), Some(to)) => aggregator.add(from, to),
                _ => aggregator.skipped_missing += 1,
            }
        }
        Ok(aggregator.finish())
    }

    /// Records one edge from a parent in state `from` to a child in state `to`.
    pub fn add(&mut self, from: StateCode, to: StateCode) {
        if from != to {
            *self.counts.entry((from, to)).or_insert(0) += 1;
        }
    }

    pub fn finish(self) -> TransitionSet {
        if self.skipped_missing > 0 {
            debug!("Skipped {} edges touching missing states", self.skipped_missing);
        }
        TransitionSet {
            transitions: self
                .counts
                .into_iter()
                .map(|((from, to), weight)| Transition { from, to, weight })
                .collect(),
            skipped_missing: self.skipped_missing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ancestral::{AncestralAssigner, StateLikelihoods};
    use crate::model::CellState;
    use pretty_assertions::assert_eq;

    fn code(c: usize) -> StateCode {
        StateCode::new(c).unwrap()
    }

    fn balanced_four() -> PhyloTree {
        PhyloTree::from_edges(4, 3, &[(6, 4), (6, 5), (4, 0), (4, 1), (5, 2), (5, 3)]).unwrap()
    }

    fn assignment(leaves: &[CellState], internal: &[usize]) -> StateAssignment {
        let rows: Vec<Vec<f64>> = internal
            .iter()
            .map(|&s| (1..=2).map(|c| if c == s { 1.0 } else { 0.0 }).collect())
            .collect();
        let likelihoods = StateLikelihoods::new(2, rows).unwrap();
        AncestralAssigner
            .assign(leaves, &likelihoods, internal.len())
            .unwrap()
    }

    #[test]
    fn test_single_transition_between_ancestors() {
        let leaves = [Some(code(1)), Some(code(1)), Some(code(2)), Some(code(2))];
        let set = TransitionAggregator::aggregate(&balanced_four(), &assignment(&leaves, &[1, 2, 1]))
            .unwrap();
        assert_eq!(
            set.iter().copied().collect::<Vec<_>>(),
            vec![Transition { from: code(1), to: code(2), weight: 1 }]
        );
        assert_eq!(set.total_weight(), 1);
    }

    #[test]
    fn test_direction_and_counts() {
        // root 1, both ancestors 2, leaves 1 1 2 1
        let leaves = [Some(code(1)), Some(code(1)), Some(code(2)), Some(code(1))];
        let set = TransitionAggregator::aggregate(&balanced_four(), &assignment(&leaves, &[2, 2, 1]))
            .unwrap();
        assert_eq!(set.weight(code(1), code(2)), 2);
        assert_eq!(set.weight(code(2), code(1)), 3);
        assert_eq!(set.total_weight(), 5);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_uniform_states_yield_nothing() {
        let leaves = [Some(code(2)); 4];
        let set = TransitionAggregator::aggregate(&balanced_four(), &assignment(&leaves, &[2, 2, 2]))
            .unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_missing_leaf_edges_skipped() {
        let leaves = [Some(code(1)), None, Some(code(2)), Some(code(2))];
        let set = TransitionAggregator::aggregate(&balanced_four(), &assignment(&leaves, &[1, 2, 1]))
            .unwrap();
        assert_eq!(set.skipped_missing(), 1);
        assert_eq!(set.total_weight(), 1);
    }

    #[test]
    fn test_assignment_size_mismatch() {
        let leaves = [Some(code(1)), Some(code(1))];
        let tree = balanced_four();
        assert!(matches!(
            TransitionAggregator::aggregate(&tree, &assignment(&leaves, &[1])),
            Err(AnalysisError::TreeMismatch(_))
        ));
    }
}
