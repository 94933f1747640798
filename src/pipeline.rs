//! Driver from a parsed Nexus file to the [TransmissionGraph] of one character.
//!
//! ```no_run
//! use nexnet::nexus::read_nexus_file;
//! use nexnet::pipeline::{CharacterSelector, PipelineBuilder};
//!
//! let file = read_nexus_file("ebov_locations.nex")?;
//! let graph = PipelineBuilder::new()
//!     .with_character(CharacterSelector::Name("location".to_string()))
//!     .build()
//!     .run(&file)?;
//! println!("{} transitions", graph.total_weight());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::analysis::{
    AncestralAssigner, AncestralReconstruction, GraphBuilder, SankoffParsimony,
    TransitionAggregator, TransmissionGraph,
};
use crate::error::{AnalysisError, Result};
use crate::model::{Character, CharacterLabelSet, PhyloTree};
use crate::nexus::{NexusFile, NexusMetadata};
use crate::parser::{ParsingError, ParsingErrorType};
use log::{debug, info};
use std::convert::Infallible;
use std::str::FromStr;

// =#========================================================================#=
// CHARACTER SELECTOR
// =#========================================================================$=
/// Which character of the CHARACTERS block to analyze.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CharacterSelector {
    /// 1-based position, as in CHARSTATELABELS.
    Index(usize),
    /// Character name as declared in CHARSTATELABELS.
    Name(String),
}

impl CharacterSelector {
    /// Finds the selected character, returning its matrix column and itself.
    ///
    /// # Errors
    /// [AnalysisError::UnknownCharacter] if there is no such character.
    pub fn resolve<'a>(
        &self,
        characters: &'a CharacterLabelSet,
    ) -> std::result::Result<(usize, &'a Character), AnalysisError> {
        let found = match self {
            CharacterSelector::Index(index) => index
                .checked_sub(1)
                .and_then(|column| characters.get(column).map(|c| (column, c))),
            CharacterSelector::Name(name) => characters.find(name),
        };
        found.ok_or_else(|| AnalysisError::UnknownCharacter(self.to_string()))
    }
}

impl Default for CharacterSelector {
    fn default() -> Self {
        CharacterSelector::Index(1)
    }
}

/// A positive integer selects by index, everything else by name.
impl FromStr for CharacterSelector {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.parse::<usize>() {
            Ok(index) if index > 0 => CharacterSelector::Index(index),
            _ => CharacterSelector::Name(s.to_string()),
        })
    }
}

impl std::fmt::Display for CharacterSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CharacterSelector::Index(index) => write!(f, "#{index}"),
            CharacterSelector::Name(name) => write!(f, "'{name}'"),
        }
    }
}

// =#========================================================================#=
// PIPELINE BUILDER
// =#========================================================================$=
/// Builder for a [TransmissionPipeline].
///
/// # Configuration Options
/// * **Character**: [`with_character()`](Self::with_character), default the
///   first character
/// * **Tree**: [`with_tree()`](Self::with_tree), 0-based position in the
///   TREES block, default 0
/// * **Reconstruction**: [`with_reconstruction()`](Self::with_reconstruction),
///   default [SankoffParsimony]
pub struct PipelineBuilder {
    character: CharacterSelector,
    tree_index: usize,
    reconstruction: Box<dyn AncestralReconstruction>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            character: CharacterSelector::default(),
            tree_index: 0,
            reconstruction: Box::new(SankoffParsimony),
        }
    }

    pub fn with_character(mut self, character: CharacterSelector) -> Self {
        self.character = character;
        self
    }

    pub fn with_tree(mut self, tree_index: usize) -> Self {
        self.tree_index = tree_index;
        self
    }

    pub fn with_reconstruction<R: AncestralReconstruction + 'static>(
        mut self,
        reconstruction: R,
    ) -> Self {
        self.reconstruction = Box::new(reconstruction);
        self
    }

    pub fn build(self) -> TransmissionPipeline {
        TransmissionPipeline {
            character: self.character,
            tree_index: self.tree_index,
            reconstruction: self.reconstruction,
        }
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// =#========================================================================#=
// TRANSMISSION PIPELINE
// =#========================================================================$=
/// Runs column extraction, reconstruction, state assignment, transition
/// aggregation and graph assembly for one character and one tree.
///
/// Every stage is fail-fast: the first error aborts the run.
pub struct TransmissionPipeline {
    character: CharacterSelector,
    tree_index: usize,
    reconstruction: Box<dyn AncestralReconstruction>,
}

impl TransmissionPipeline {
    /// Runs on the selected tree of `file`.
    ///
    /// # Errors
    /// * [ParsingErrorType::MissingBlock] if `file` has no trees
    /// * [AnalysisError::TreeMismatch] if the tree index is out of range
    /// * any error of [run_on_tree](Self::run_on_tree)
    pub fn run(&self, file: &NexusFile) -> Result<TransmissionGraph> {
        if file.trees().is_empty() {
            return Err(ParsingError::without_context(ParsingErrorType::MissingBlock(
                "TREES".to_string(),
            ))
            .into());
        }
        let tree = file.trees().get(self.tree_index).ok_or_else(|| {
            AnalysisError::TreeMismatch(format!(
                "tree index {} out of range, file has {} trees",
                self.tree_index,
                file.trees().len()
            ))
        })?;
        self.run_on_tree(file.metadata(), tree)
    }

    /// Runs on `tree`, whose leaf ids must be the taxon indices of `metadata`.
    ///
    /// # Errors
    /// * [AnalysisError::UnknownCharacter] if the character is not declared
    /// * [AnalysisError::TreeMismatch] if the tree does not have one leaf per taxon
    /// * [AnalysisError::AsrFailure] or [AnalysisError::StateOutOfRange] from
    ///   reconstruction and assignment
    pub fn run_on_tree(
        &self,
        metadata: &NexusMetadata,
        tree: &PhyloTree,
    ) -> Result<TransmissionGraph> {
        let (column, character) = self.character.resolve(metadata.characters())?;
        info!(
            "Analyzing character '{}' ({} states) on tree '{}'",
            character.name(),
            character.num_states(),
            tree.name().unwrap_or("unnamed")
        );

        if tree.num_leaves() != metadata.taxa().len() {
            return Err(AnalysisError::TreeMismatch(format!(
                "tree has {} leaves, TAXA block {} taxa",
                tree.num_leaves(),
                metadata.taxa().len()
            ))
            .into());
        }
        let leaf_states = metadata.matrix().column(column).ok_or_else(|| {
            AnalysisError::UnknownCharacter(format!("no matrix column {}", column + 1))
        })?;
        debug!(
            "{} of {} leaves with missing state",
            leaf_states.iter().filter(|s| s.is_none()).count(),
            leaf_states.len()
        );

        let likelihoods =
            self.reconstruction
                .reconstruct(tree, &leaf_states, character.num_states())?;
        info!("Reconstructed {} internal nodes", likelihoods.num_rows());

        let assignment = AncestralAssigner.assign(&leaf_states, &likelihoods, tree.num_internal())?;
        let transitions = TransitionAggregator::aggregate(tree, &assignment)?;
        info!(
            "Aggregated {} transitions over {} state pairs ({} edges skipped)",
            transitions.total_weight(),
            transitions.len(),
            transitions.skipped_missing()
        );

        let graph = GraphBuilder.build(character, &transitions)?;
        info!(
            "Built transmission graph with {} nodes and {} edges",
            graph.nodes().len(),
            graph.edges().len()
        );
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::StateLikelihoods;
    use crate::error::NexnetError;
    use crate::model::{CellState, StateCode};
    use crate::nexus::parse_nexus_str;

    const LOCATIONS: &str = "#NEXUS
BEGIN TAXA;
    DIMENSIONS NTAX=4;
    TAXLABELS t1 t2 t3 t4;
END;
BEGIN CHARACTERS;
    DIMENSIONS NCHAR=2;
    FORMAT DATATYPE=STANDARD MISSING=? GAP=- SYMBOLS=\"0 1 2\";
    CHARSTATELABELS
        1 location / A B,
        2 host / bat human pig;
    MATRIX
        t1 00
        t2 01
        t3 1?
        t4 12
    ;
END;
BEGIN TREES;
    TREE first = ((t1,t2),(t3,t4));
    TREE second = ((t1,t3),(t2,t4));
END;
";

    fn code(c: usize) -> StateCode {
        StateCode::new(c).unwrap()
    }

    #[test]
    fn test_selector_from_str() {
        assert_eq!("2".parse(), Ok(CharacterSelector::Index(2)));
        assert_eq!(
            "location".parse(),
            Ok(CharacterSelector::Name("location".to_string()))
        );
        assert_eq!("0".parse(), Ok(CharacterSelector::Name("0".to_string())));
    }

    #[test]
    fn test_single_transition() {
        let file = parse_nexus_str(LOCATIONS).unwrap();
        let graph = PipelineBuilder::new().build().run(&file).unwrap();
        assert_eq!(graph.character(), "location");
        assert_eq!(graph.nodes().len(), 2);
        assert_eq!(graph.edges().len(), 1);
        assert_eq!(graph.edge_weight(code(1), code(2)), Some(1));
    }

    #[test]
    fn test_second_tree_by_name() {
        let file = parse_nexus_str(LOCATIONS).unwrap();
        let graph = PipelineBuilder::new()
            .with_character(CharacterSelector::Name("location".to_string()))
            .with_tree(1)
            .build()
            .run(&file)
            .unwrap();
        // ((A,B),(A,B)) needs two changes under any root state
        assert_eq!(graph.total_weight(), 2);
    }

    #[test]
    fn test_missing_leaf_skipped() {
        let file = parse_nexus_str(LOCATIONS).unwrap();
        let graph = PipelineBuilder::new()
            .with_character(CharacterSelector::Index(2))
            .build()
            .run(&file)
            .unwrap();
        assert_eq!(graph.character(), "host");
        assert_eq!(graph.nodes().len(), 3);
        // root and left ancestor bat, right ancestor pig; edge to t3 is skipped
        assert_eq!(graph.edge_weight(code(1), code(2)), Some(1));
        assert_eq!(graph.edge_weight(code(1), code(3)), Some(1));
        assert_eq!(graph.total_weight(), 2);
    }

    #[test]
    fn test_unknown_character() {
        let file = parse_nexus_str(LOCATIONS).unwrap();
        for selector in [
            CharacterSelector::Index(3),
            CharacterSelector::Index(0),
            CharacterSelector::Name("date".to_string()),
        ] {
            let result = PipelineBuilder::new().with_character(selector).build().run(&file);
            assert!(matches!(
                result,
                Err(NexnetError::Analysis(AnalysisError::UnknownCharacter(_)))
            ));
        }
    }

    #[test]
    fn test_tree_index_out_of_range() {
        let file = parse_nexus_str(LOCATIONS).unwrap();
        let result = PipelineBuilder::new().with_tree(2).build().run(&file);
        assert!(matches!(
            result,
            Err(NexnetError::Analysis(AnalysisError::TreeMismatch(_)))
        ));
    }

    #[test]
    fn test_no_trees() {
        let input = LOCATIONS.split("BEGIN TREES;").next().unwrap();
        let file = parse_nexus_str(input).unwrap();
        let result = PipelineBuilder::new().build().run(&file);
        match result {
            Err(NexnetError::Parsing(e)) => {
                assert_eq!(e.kind(), &ParsingErrorType::MissingBlock("TREES".to_string()))
            }
            other => panic!("expected missing TREES block, got {other:?}"),
        }
    }

    struct FavorLast;

    impl AncestralReconstruction for FavorLast {
        fn reconstruct(
            &self,
            tree: &PhyloTree,
            _leaf_states: &[CellState],
            num_states: usize,
        ) -> std::result::Result<StateLikelihoods, AnalysisError> {
            let row: Vec<f64> = (0..num_states).map(|s| s as f64).collect();
            StateLikelihoods::new(num_states, vec![row; tree.num_internal()])
        }
    }

    #[test]
    fn test_custom_reconstruction() {
        let file = parse_nexus_str(LOCATIONS).unwrap();
        let graph = PipelineBuilder::new()
            .with_reconstruction(FavorLast)
            .build()
            .run(&file)
            .unwrap();
        // all ancestors B, so only the edges to t1 and t2 change
        assert_eq!(graph.edge_weight(code(2), code(1)), Some(2));
        assert_eq!(graph.total_weight(), 2);
    }
}
