use nexnet::analysis::{AncestralReconstruction, StateLikelihoods};
use nexnet::error::{AnalysisError, NexnetError};
use nexnet::model::{CellState, PhyloTree, StateCode};
use nexnet::nexus::read_nexus_file;
use nexnet::pipeline::{CharacterSelector, PipelineBuilder};
use nexnet::derive_transmission_graph;
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};
use std::process::Command;

fn fixture(name: &str) -> PathBuf {
    Path::new("tests").join("fixtures").join(name)
}

fn code(c: usize) -> StateCode {
    StateCode::new(c).unwrap()
}

#[test]
fn test_location_network() {
    let graph = derive_transmission_graph(fixture("ebov_locations.nex"), "location").unwrap();

    let labels: Vec<&str> = graph.nodes().iter().map(|n| n.label.as_str()).collect();
    assert_eq!(labels, vec!["Guinea", "Liberia", "Sierra Leone"]);

    // Guinea at the root, Liberia at the ancestor of L and S
    let edges: Vec<(usize, usize, usize)> = graph
        .edges()
        .iter()
        .map(|e| (e.from.code(), e.to.code(), e.weight))
        .collect();
    assert_eq!(edges, vec![(1, 2, 1), (2, 3, 1)]);
}

#[test]
fn test_host_network_skips_missing() {
    let file = read_nexus_file(fixture("ebov_locations.nex")).unwrap();
    let graph = PipelineBuilder::new()
        .with_character(CharacterSelector::Index(2))
        .build()
        .run(&file)
        .unwrap();
    assert_eq!(graph.character(), "host");
    assert_eq!(graph.edge_weight(code(2), code(1)), Some(1));
    assert_eq!(graph.edge_weight(code(1), code(2)), Some(1));
    assert_eq!(graph.total_weight(), 2);
}

#[test]
fn test_second_tree() {
    let file = read_nexus_file(fixture("ebov_locations.nex")).unwrap();
    let graph = PipelineBuilder::new()
        .with_character(CharacterSelector::Name("location".to_string()))
        .with_tree(1)
        .build()
        .run(&file)
        .unwrap();
    assert_eq!(graph.total_weight(), 4);
    assert_eq!(graph.edge_weight(code(1), code(3)), Some(1));
    assert_eq!(graph.edge_weight(code(3), code(2)), Some(1));
}

#[test]
fn test_graph_without_transitions_keeps_all_states() {
    struct Uniform;
    impl AncestralReconstruction for Uniform {
        fn reconstruct(
            &self,
            tree: &PhyloTree,
            _leaf_states: &[CellState],
            num_states: usize,
        ) -> Result<StateLikelihoods, AnalysisError> {
            StateLikelihoods::new(num_states, vec![vec![1.0; num_states]; tree.num_internal()])
        }
    }

    let file = read_nexus_file(fixture("data_block.nex")).unwrap();
    let graph = PipelineBuilder::new()
        .with_reconstruction(Uniform)
        .build()
        .run(&file)
        .unwrap();
    // every ancestor 'north', so only the edges into c and 'd x' change
    assert_eq!(graph.nodes().len(), 2);
    assert_eq!(graph.edge_weight(code(1), code(2)), Some(2));
}

#[test]
fn test_failing_reconstruction_aborts() {
    struct Failing;
    impl AncestralReconstruction for Failing {
        fn reconstruct(
            &self,
            _tree: &PhyloTree,
            _leaf_states: &[CellState],
            _num_states: usize,
        ) -> Result<StateLikelihoods, AnalysisError> {
            Err(AnalysisError::AsrFailure("did not converge".to_string()))
        }
    }

    let file = read_nexus_file(fixture("ebov_locations.nex")).unwrap();
    let result = PipelineBuilder::new()
        .with_reconstruction(Failing)
        .build()
        .run(&file);
    assert!(matches!(
        result,
        Err(NexnetError::Analysis(AnalysisError::AsrFailure(_)))
    ));
}

#[test]
fn test_parse_error_propagates() {
    let result = derive_transmission_graph(fixture("gap_in_matrix.nex"), "1");
    assert!(matches!(result, Err(NexnetError::Parsing(_))));
}

#[test]
fn test_json_output() {
    let graph = derive_transmission_graph(fixture("ebov_locations.nex"), "1").unwrap();
    let json = serde_json::to_value(&graph).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "character": "location",
            "nodes": [
                {"id": 1, "label": "Guinea"},
                {"id": 2, "label": "Liberia"},
                {"id": 3, "label": "Sierra Leone"}
            ],
            "edges": [
                {"from": 1, "to": 2, "weight": 1},
                {"from": 2, "to": 3, "weight": 1}
            ]
        })
    );
}

#[test]
fn test_cli_writes_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("graph.json");
    let status = Command::new(env!("CARGO_BIN_EXE_nexnet"))
        .arg(fixture("ebov_locations.nex"))
        .args(["--character", "host", "--output"])
        .arg(&output)
        .status()
        .unwrap();
    assert!(status.success());

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(json["character"], "host");
    assert_eq!(json["edges"].as_array().map(Vec::len), Some(2));
}

#[test]
fn test_cli_fails_on_invalid_input() {
    let output = Command::new(env!("CARGO_BIN_EXE_nexnet"))
        .arg(fixture("unknown_taxon.nex"))
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("t9"));
}
