//! Nexnet derives transmission networks from discrete-trait annotated
//! phylogenies stored in Nexus files.
//!
//! Given a Nexus file with a TAXA block, a CHARACTERS (or DATA) block holding
//! discrete traits such as sampling location or host, and a TREES block, the
//! crate reconstructs a state for every ancestor of the tree and counts how
//! often the trait changes along tree edges. The result is a
//! [TransmissionGraph] with one node per declared state and one weighted,
//! directed edge per observed change of state.
//!
//! Core functionality provided:
//! - Nexus: strict parsing and validation of TAXA and CHARACTERS blocks
//!   (FORMAT, CHARSTATELABELS, MATRIX) into [model] types, plus the TREES block.
//! - Newick: tree strings into [PhyloTree]s over the taxa of the file.
//! - Analysis: ancestral state reconstruction behind the
//!   [AncestralReconstruction](analysis::AncestralReconstruction) trait,
//!   state assignment, transition counting and graph assembly.
//! - Pipeline: all stages for one character and one tree.
//!
//! Limitations:
//! - Only the STANDARD data type, without gaps and not interleaved
//! - One MATRIX row per line
//! - One tree per analysis
//!
//! # Usage patterns
//! 1. [`derive_transmission_graph`] runs everything with default settings.
//! 2. Configure a [PipelineBuilder](pipeline::PipelineBuilder) and a
//!    [NexusReaderBuilder](nexus::NexusReaderBuilder) for control over
//!    character, tree, reconstruction and read strategy.
//!
//! ## Example Default Configuration
//! ```no_run
//! use nexnet::derive_transmission_graph;
//!
//! let graph = derive_transmission_graph("ebov_locations.nex", "location")?;
//! for edge in graph.edges() {
//!     println!("{} -> {}: {}", edge.from, edge.to, edge.weight);
//! }
//! # Ok::<(), nexnet::error::NexnetError>(())
//! ```
//!
//! ## Example Configuration
//! ```no_run
//! use nexnet::nexus::NexusReaderBuilder;
//! use nexnet::pipeline::{CharacterSelector, PipelineBuilder};
//!
//! let file = NexusReaderBuilder::for_file("ebov_locations.nex")
//!     .with_buffered_source()
//!     .read()?;
//! let graph = PipelineBuilder::new()
//!     .with_character(CharacterSelector::Index(2))
//!     .with_tree(1)
//!     .build()
//!     .run(&file)?;
//! println!("{}", serde_json::to_string_pretty(&graph)?);
//! # Ok::<(), nexnet::error::NexnetError>(())
//! ```

pub mod analysis;
pub mod error;
pub mod model;
pub mod newick;
pub mod nexus;
pub mod parser;
pub mod pipeline;

pub use crate::analysis::TransmissionGraph;
pub use crate::error::{AnalysisError, NexnetError};
pub use crate::model::PhyloTree;
pub use crate::nexus::{NexusFile, read_nexus_file};
pub use crate::parser::ParsingError;

use crate::pipeline::{CharacterSelector, PipelineBuilder};
use std::path::Path;

// ============================================================================
// Quick API
// ============================================================================
/// Reads the Nexus file at `path` and derives the transmission graph of the
/// character named or numbered by `character` on the first tree, using
/// Sankoff parsimony.
///
/// `character` is parsed like the `--character` CLI flag: a positive integer
/// selects by 1-based index, anything else by name.
///
/// # Errors
/// Returns a [NexnetError] if the file cannot be read or parsed, or if any
/// analysis stage fails.
pub fn derive_transmission_graph<P: AsRef<Path>>(
    path: P,
    character: &str,
) -> error::Result<TransmissionGraph> {
    let file = read_nexus_file(path)?;
    let selector: CharacterSelector = match character.parse() {
        Ok(selector) => selector,
        Err(never) => match never {},
    };
    PipelineBuilder::new()
        .with_character(selector)
        .build()
        .run(&file)
}
