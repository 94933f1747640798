//! Newick format parser for phylogenetic trees.
//!
//! This module provides [NewickParser] to parse Newick strings into a
//! [PhyloTree] over a known [TaxonSet]. It is used directly or when reading
//! the TREES block of a Nexus file.
//!
//! # Format
//! The supported Newick grammar:
//! * `tree ::= vertex ';'`
//! * `vertex ::= leaf | internal_vertex`
//! * `internal_vertex ::= '(' vertex (',' vertex)* ')' [label] [branch_length]`
//! * `leaf ::= label [branch_length]`
//! * `branch_length ::= ':' number`
//!
//! Furthermore:
//! * Whitespace can occur between elements,
//!   just not within an unquoted label or a branch_length
//! * Comments are square brackets and can occur anywhere where whitespace is
//!   allowed; annotations like `[&rate=0.5]` are treated as comments

mod defs;
pub mod parser;

pub use parser::NewickParser;

use crate::model::{LabelResolver, PhyloTree, TaxonSet};
use crate::parser::ParsingError;
use crate::parser::byte_parser::ByteParser;
use std::path::Path;

// ============================================================================
// QUICK PARSING API (pub)
// ============================================================================
/// Parses a file of semicolon-separated Newick strings whose leaf labels
/// are the labels of `taxa`.
///
/// # Example
/// ```no_run
/// use nexnet::model::TaxonSet;
/// use nexnet::newick::parse_file;
///
/// let mut taxa = TaxonSet::with_capacity(2);
/// taxa.insert("Hong Kong");
/// taxa.insert("Guangdong");
/// let trees = parse_file("h5n1.nwk", &taxa)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn parse_file<P: AsRef<Path>>(path: P, taxa: &TaxonSet) -> Result<Vec<PhyloTree>, ParsingError> {
    let byte_parser = ByteParser::from_file_buffered(path)?;
    let mut newick_parser = NewickParser::new(LabelResolver::new_verbatim_labels_resolver(taxa));
    newick_parser.parse_all(byte_parser)
}

/// Parses a single Newick string whose leaf labels are the labels of `taxa`.
pub fn parse_str<S: AsRef<str>>(newick: S, taxa: &TaxonSet) -> Result<PhyloTree, ParsingError> {
    let mut newick_parser = NewickParser::new(LabelResolver::new_verbatim_labels_resolver(taxa));
    let mut byte_parser = ByteParser::for_str(newick.as_ref());
    newick_parser.parse_str(&mut byte_parser)
}
