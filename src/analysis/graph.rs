//! The transmission graph: states of one character as nodes, aggregated
//! transitions as weighted edges.

use crate::analysis::transitions::TransitionSet;
use crate::error::AnalysisError;
use crate::model::{Character, StateCode};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;

/// A node of the transmission graph: one declared state of the character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateNode {
    pub id: StateCode,
    pub label: String,
}

/// A weighted, directed edge of the transmission graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransitionEdge {
    pub from: StateCode,
    pub to: StateCode,
    pub weight: usize,
}

/// Immutable transmission graph of one character.
///
/// Contains a node for every declared state, whether or not it is touched by
/// a transition, and at most one edge per ordered pair of states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransmissionGraph {
    character: String,
    nodes: Vec<StateNode>,
    edges: Vec<TransitionEdge>,
}

impl TransmissionGraph {
    /// Name of the character whose states are the nodes.
    pub fn character(&self) -> &str {
        &self.character
    }

    /// Nodes in state code order.
    pub fn nodes(&self) -> &[StateNode] {
        &self.nodes
    }

    /// Edges ordered by `(from, to)`.
    pub fn edges(&self) -> &[TransitionEdge] {
        &self.edges
    }

    pub fn node_by_label(&self, label: &str) -> Option<&StateNode> {
        self.nodes.iter().find(|n| n.label == label)
    }

    /// Weight of the edge `from -> to`, `None` if there is no such edge.
    pub fn edge_weight(&self, from: StateCode, to: StateCode) -> Option<usize> {
        self.edges
            .iter()
            .find(|e| e.from == from && e.to == to)
            .map(|e| e.weight)
    }

    /// Sum of all edge weights.
    pub fn total_weight(&self) -> usize {
        self.edges.iter().map(|e| e.weight).sum()
    }

    /// Converts to a [DiGraph] with state labels as node weights and
    /// transition counts as edge weights, for graph algorithms.
    ///
    /// Node index `i` holds the state with code `i + 1`.
    pub fn to_digraph(&self) -> DiGraph<String, usize> {
        let mut graph = DiGraph::with_capacity(self.nodes.len(), self.edges.len());
        for node in &self.nodes {
            graph.add_node(node.label.clone());
        }
        for edge in &self.edges {
            graph.add_edge(
                NodeIndex::new(edge.from.index()),
                NodeIndex::new(edge.to.index()),
                edge.weight,
            );
        }
        graph
    }
}

/// Materializes a [TransmissionGraph] from a character and its transitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphBuilder;

impl GraphBuilder {
    /// # Errors
    /// [AnalysisError::StateOutOfRange] if a transition names a state the
    /// character does not declare.
    pub fn build(
        &self,
        character: &Character,
        transitions: &TransitionSet,
    ) -> Result<TransmissionGraph, AnalysisError> {
        let nodes: Vec<StateNode> = character
            .state_labels()
            .iter()
            .enumerate()
            .map(|(i, label)| StateNode {
                id: StateCode::from_index(i),
                label: label.clone(),
            })
            .collect();

        let mut edges = Vec::with_capacity(transitions.len());
        for transition in transitions.iter() {
            for state in [transition.from, transition.to] {
                if !character.in_range(state) {
                    return Err(AnalysisError::StateOutOfRange {
                        state: state.code(),
                        num_states: character.num_states(),
                    });
                }
            }
            edges.push(TransitionEdge {
                from: transition.from,
                to: transition.to,
                weight: transition.weight,
            });
        }

        Ok(TransmissionGraph {
            character: character.name().to_string(),
            nodes,
            edges,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::transitions::TransitionAggregator;
    use pretty_assertions::assert_eq;

    fn code(c: usize) -> StateCode {
        StateCode::new(c).unwrap()
    }

    fn location() -> Character {
        Character::new(
            "location".to_string(),
            ["Guinea", "Liberia", "Sierra Leone", "Mali"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }

    fn transitions() -> TransitionSet {
        let mut aggregator = TransitionAggregator::new();
        aggregator.add(code(1), code(2));
        aggregator.add(code(1), code(3));
        aggregator.add(code(1), code(3));
        aggregator.add(code(3), code(1));
        aggregator.finish()
    }

    #[test]
    fn test_all_states_become_nodes() {
        let graph = GraphBuilder.build(&location(), &transitions()).unwrap();
        assert_eq!(graph.nodes().len(), 4);
        assert_eq!(graph.node_by_label("Mali").map(|n| n.id), Some(code(4)));
        assert_eq!(graph.edges().len(), 3);
        assert_eq!(graph.edge_weight(code(1), code(3)), Some(2));
        assert_eq!(graph.edge_weight(code(3), code(2)), None);
        assert_eq!(graph.total_weight(), 4);
    }

    #[test]
    fn test_to_digraph() {
        let graph = GraphBuilder.build(&location(), &transitions()).unwrap();
        let digraph = graph.to_digraph();
        assert_eq!(digraph.node_count(), 4);
        assert_eq!(digraph.edge_count(), 3);
        let edge = digraph
            .find_edge(NodeIndex::new(0), NodeIndex::new(2))
            .unwrap();
        assert_eq!(digraph[edge], 2);
        assert_eq!(digraph[NodeIndex::new(2)], "Sierra Leone");
    }

    #[test]
    fn test_undeclared_state() {
        let mut aggregator = TransitionAggregator::new();
        aggregator.add(code(1), code(5));
        assert!(matches!(
            GraphBuilder.build(&location(), &aggregator.finish()),
            Err(AnalysisError::StateOutOfRange { state: 5, .. })
        ));
    }

    #[test]
    fn test_serialize() {
        let mut aggregator = TransitionAggregator::new();
        aggregator.add(code(2), code(1));
        let graph = GraphBuilder.build(&location(), &aggregator.finish()).unwrap();
        let json = serde_json::to_value(&graph).unwrap();
        assert_eq!(json["character"], "location");
        assert_eq!(json["nodes"][1], serde_json::json!({"id": 2, "label": "Liberia"}));
        assert_eq!(json["edges"][0], serde_json::json!({"from": 2, "to": 1, "weight": 1}));
    }
}
