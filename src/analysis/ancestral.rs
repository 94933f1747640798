//! Assignment of one state per tree node from leaf states and the
//! per-internal-node likelihoods of a reconstruction.

use crate::error::AnalysisError;
use crate::model::{CellState, NodeId, StateCode};

// =#========================================================================#=
// STATE LIKELIHOODS
// =#========================================================================$=
/// Per-internal-node state likelihoods as returned by an
/// [AncestralReconstruction](crate::analysis::AncestralReconstruction).
///
/// Row `i` belongs to internal node `num_leaves + i`; column `j` to state
/// code `j + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct StateLikelihoods {
    num_states: usize,
    rows: Vec<Vec<f64>>,
}

impl StateLikelihoods {
    /// # Errors
    /// [AnalysisError::AsrFailure] if a row does not have `num_states` values.
    pub fn new(num_states: usize, rows: Vec<Vec<f64>>) -> Result<Self, AnalysisError> {
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != num_states) {
            return Err(AnalysisError::AsrFailure(format!(
                "likelihood row {i} has {} values, expected {num_states}",
                row.len()
            )));
        }
        Ok(Self { num_states, rows })
    }

    pub fn num_states(&self) -> usize {
        self.num_states
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, i: usize) -> Option<&[f64]> {
        self.rows.get(i).map(Vec::as_slice)
    }
}

// =#========================================================================#=
// STATE ASSIGNMENT
// =#========================================================================$=
/// One state per tree node for a single character, indexed by node id.
///
/// Leaves come first (ids `0..num_leaves`), then internal nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct StateAssignment {
    num_leaves: usize,
    state_by_node_id: Vec<CellState>,
}

impl StateAssignment {
    /// State of `node`; `Some(None)` for a leaf with missing data.
    pub fn get(&self, node: NodeId) -> Option<CellState> {
        self.state_by_node_id.get(node).copied()
    }

    pub fn num_leaves(&self) -> usize {
        self.num_leaves
    }

    pub fn num_nodes(&self) -> usize {
        self.state_by_node_id.len()
    }

    pub fn as_slice(&self) -> &[CellState] {
        &self.state_by_node_id
    }
}

// =#========================================================================#=
// ANCESTRAL ASSIGNER
// =#========================================================================$=
/// Turns likelihoods into states: each internal node gets the state with the
/// maximal likelihood, ties going to the lowest state code.
#[derive(Debug, Clone, Copy, Default)]
pub struct AncestralAssigner;

impl AncestralAssigner {
    /// Builds the [StateAssignment] for leaves `leaf_states` (indexed by leaf
    /// node id) and internal nodes from `likelihoods`.
    ///
    /// # Errors
    /// * [AnalysisError::TreeMismatch] if the number of likelihood rows is
    ///   not `num_internal`
    /// * [AnalysisError::StateOutOfRange] if a leaf state exceeds the number
    ///   of states
    /// * [AnalysisError::AsrFailure] if a row has no comparable maximum
    pub fn assign(
        &self,
        leaf_states: &[CellState],
        likelihoods: &StateLikelihoods,
        num_internal: usize,
    ) -> Result<StateAssignment, AnalysisError> {
        if likelihoods.num_rows() != num_internal {
            return Err(AnalysisError::TreeMismatch(format!(
                "{} likelihood rows for {num_internal} internal nodes",
                likelihoods.num_rows()
            )));
        }

        let num_leaves = leaf_states.len();
        let num_states = likelihoods.num_states();
        let mut state_by_node_id = Vec::with_capacity(num_leaves + num_internal);

        for state in leaf_states {
            if let Some(code) = state {
                if code.code() > num_states {
                    return Err(AnalysisError::StateOutOfRange {
                        state: code.code(),
                        num_states,
                    });
                }
            }
            state_by_node_id.push(*state);
        }

        for (i, row) in likelihoods.rows.iter().enumerate() {
            let column = argmax_lowest(row).ok_or_else(|| {
                AnalysisError::AsrFailure(format!(
                    "no maximal likelihood for internal node {}",
                    num_leaves + i
                ))
            })?;
            state_by_node_id.push(Some(StateCode::from_index(column)));
        }

        Ok(StateAssignment {
            num_leaves,
            state_by_node_id,
        })
    }
}

/// Index of the maximal value, the lowest index among ties. NaN values are
/// never maximal; `None` if there is no other value.
pub fn argmax_lowest(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &value) in values.iter().enumerate() {
        if value.is_nan() {
            continue;
        }
        match best {
            Some((_, max)) if value <= max => {}
            _ => best = Some((i, value)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(c: usize) -> CellState {
        StateCode::new(c)
    }

    #[test]
    fn test_argmax_unique_and_ties() {
        assert_eq!(argmax_lowest(&[0.1, 0.7, 0.2]), Some(1));
        assert_eq!(argmax_lowest(&[0.4, 0.4, 0.2]), Some(0));
        assert_eq!(argmax_lowest(&[0.2, 0.4, 0.4]), Some(1));
        assert_eq!(argmax_lowest(&[f64::NAN, 0.3]), Some(1));
        assert_eq!(argmax_lowest(&[f64::NAN]), None);
        assert_eq!(argmax_lowest(&[]), None);
    }

    #[test]
    fn test_rows_map_to_internal_ids() {
        let likelihoods =
            StateLikelihoods::new(2, vec![vec![0.9, 0.1], vec![0.2, 0.8], vec![0.5, 0.5]])
                .unwrap();
        let assignment = AncestralAssigner
            .assign(&[code(1), code(1), code(2), None], &likelihoods, 3)
            .unwrap();
        assert_eq!(assignment.num_nodes(), 7);
        assert_eq!(assignment.get(3), Some(None));
        assert_eq!(assignment.get(4), Some(code(1)));
        assert_eq!(assignment.get(5), Some(code(2)));
        assert_eq!(assignment.get(6), Some(code(1)));
    }

    #[test]
    fn test_row_count_mismatch() {
        let likelihoods = StateLikelihoods::new(2, vec![vec![1.0, 0.0]]).unwrap();
        assert!(matches!(
            AncestralAssigner.assign(&[code(1), code(2)], &likelihoods, 2),
            Err(AnalysisError::TreeMismatch(_))
        ));
    }

    #[test]
    fn test_leaf_state_out_of_range() {
        let likelihoods = StateLikelihoods::new(2, vec![vec![1.0, 0.0]]).unwrap();
        assert_eq!(
            AncestralAssigner.assign(&[code(1), code(3)], &likelihoods, 1),
            Err(AnalysisError::StateOutOfRange {
                state: 3,
                num_states: 2
            })
        );
    }

    #[test]
    fn test_ragged_likelihoods() {
        assert!(matches!(
            StateLikelihoods::new(3, vec![vec![1.0, 0.0]]),
            Err(AnalysisError::AsrFailure(_))
        ));
    }
}
