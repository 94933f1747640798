//! Data model for discrete-trait annotated phylogenies.
//!
//! # Metadata
//! Parsed from the TAXA and CHARACTERS blocks of a Nexus file:
//!
//! | Type | Content |
//! |------|---------|
//! | [TaxonSet] | Ordered, unique taxon labels |
//! | [SymbolTable] | Symbol alphabet plus missing and gap symbol |
//! | [CharacterLabelSet] | Characters with their ordered state labels |
//! | [CharacterMatrix] | One [CellState] per taxon and character |
//!
//! # Trees
//! [PhyloTree] stores a rooted tree in an arena. Leaf ids coincide with
//! taxon indices, internal ids follow after all leaves (see [tree]).
//! [LabelResolver] maps Newick leaf labels to taxon indices.

pub mod characters;
pub mod label_resolver;
pub mod symbols;
pub mod taxa;
pub mod tree;

pub use characters::{Character, CharacterLabelSet, CharacterMatrix};
pub use label_resolver::{LabelResolver, LabelResolvingError};
pub use symbols::{CellState, StateCode, SymbolLookup, SymbolTable, SymbolTableError};
pub use taxa::{TaxonIndex, TaxonSet};
pub use tree::{BranchLength, Node, NodeId, PhyloTree, PhyloTreeBuilder, TreeError};
