//! Ancestral state reconstruction seam and a parsimony-based default.

use crate::analysis::ancestral::StateLikelihoods;
use crate::error::AnalysisError;
use crate::model::{CellState, PhyloTree};
use log::debug;

/// Computes per-internal-node state likelihoods for one character.
///
/// Implementations receive the tree, the leaf states indexed by leaf node id
/// and the number of states `k` of the character; they return one row of `k`
/// values per internal node, in internal id order. Higher values are more
/// likely; rows need not be normalized.
pub trait AncestralReconstruction {
    /// # Errors
    /// [AnalysisError::AsrFailure] if the reconstruction does not succeed.
    fn reconstruct(
        &self,
        tree: &PhyloTree,
        leaf_states: &[CellState],
        num_states: usize,
    ) -> Result<StateLikelihoods, AnalysisError>;
}

/// Unweighted Sankoff parsimony (every state change costs 1).
///
/// A post-order downpass computes, for every internal node and state, the
/// minimal number of changes in its subtree given that state. The score of a
/// state is `exp(-(cost - min_cost))`: states of minimal cost score exactly
/// 1.0, each extra change divides by `e`. Leaves with missing data cost 0 in
/// every state.
#[derive(Debug, Clone, Copy, Default)]
pub struct SankoffParsimony;

impl AncestralReconstruction for SankoffParsimony {
    fn reconstruct(
        &self,
        tree: &PhyloTree,
        leaf_states: &[CellState],
        num_states: usize,
    ) -> Result<StateLikelihoods, AnalysisError> {
        if num_states == 0 {
            return Err(AnalysisError::AsrFailure(String::from(
                "character has no states",
            )));
        }
        if leaf_states.len() != tree.num_leaves() {
            return Err(AnalysisError::TreeMismatch(format!(
                "{} leaf states for {} leaves",
                leaf_states.len(),
                tree.num_leaves()
            )));
        }

        let mut costs = vec![vec![0.0_f64; num_states]; tree.num_nodes()];
        for node in tree.post_order() {
            if tree.is_leaf(node) {
                if let Some(code) = leaf_states[node] {
                    if code.code() > num_states {
                        return Err(AnalysisError::StateOutOfRange {
                            state: code.code(),
                            num_states,
                        });
                    }
                    for (s, cost) in costs[node].iter_mut().enumerate() {
                        *cost = if s == code.index() { 0.0 } else { f64::INFINITY };
                    }
                }
                continue;
            }

            let mut node_costs = vec![0.0_f64; num_states];
            for &child in tree.node(node).children() {
                let child_costs = &costs[child];
                let child_min = child_costs.iter().copied().fold(f64::INFINITY, f64::min);
                for (s, cost) in node_costs.iter_mut().enumerate() {
                    // stay in s, or change to the cheapest state
                    *cost += child_costs[s].min(child_min + 1.0);
                }
            }
            costs[node] = node_costs;
        }

        let num_leaves = tree.num_leaves();
        let rows: Vec<Vec<f64>> = costs[num_leaves..]
            .iter()
            .map(|node_costs| {
                let min = node_costs.iter().copied().fold(f64::INFINITY, f64::min);
                node_costs.iter().map(|c| (-(c - min)).exp()).collect()
            })
            .collect();

        if let Some(root_costs) = costs.get(tree.root()) {
            let score = root_costs.iter().copied().fold(f64::INFINITY, f64::min);
            debug!("Parsimony score {score} over {} internal nodes", rows.len());
        }
        StateLikelihoods::new(num_states, rows)
    }
}
