//! NEXUS format reader for discrete-trait annotated phylogenies.
//!
//! This module provides:
//! - [MetadataParser]: TAXA and CHARACTERS/DATA blocks into [NexusMetadata]
//! - [TreesBlockReader]: TREES block into [PhyloTree]s
//! - [NexusReaderBuilder]: configures reading a whole file into a [NexusFile]
//!
//! # Quick API
//! - [`read_nexus_file`]: reads a file with default settings
//! - [`parse_nexus_str`]: parses a string
//!
//! # Format
//! A NEXUS file for transmission analysis contains, in this order:
//! - A TAXA block defining the taxon labels
//! - A CHARACTERS block with FORMAT, CHARSTATELABELS and MATRIX commands
//!   (or a DATA block, which may stand in for both)
//! - A TREES block with optional TRANSLATE command and `TREE` commands
//!
//! ## Assumptions
//! * Blocks other than these are skipped
//! * Only the STANDARD data type, without gaps and not interleaved
//! * One MATRIX row per line
//! * A label with a space in it must be enclosed in single quotes;
//!   an apostrophe in such a label is escaped by doubling it,
//!   e.g. `'Wilson''s Promontory'`

mod defs;
mod metadata;
mod trees;

pub use self::defs::NexusBlock;
pub use self::metadata::{MetadataParser, NexusMetadata};
pub use self::trees::TreesBlockReader;

use crate::model::PhyloTree;
use crate::parser::byte_parser::ByteParser;
use crate::parser::byte_source::ByteSource;
use crate::parser::parsing_error::ParsingError;
use log::debug;
use std::path::{Path, PathBuf};

// =#========================================================================#=
// NEXUS FILE
// =#========================================================================$=
/// Content of a Nexus file: its metadata and the trees of its TREES block.
#[derive(Debug, Clone)]
pub struct NexusFile {
    metadata: NexusMetadata,
    trees: Vec<PhyloTree>,
}

impl NexusFile {
    pub fn metadata(&self) -> &NexusMetadata {
        &self.metadata
    }

    /// Trees in file order; empty if the file has no TREES block or it
    /// was not read.
    pub fn trees(&self) -> &[PhyloTree] {
        &self.trees
    }

    pub fn into_parts(self) -> (NexusMetadata, Vec<PhyloTree>) {
        (self.metadata, self.trees)
    }
}

// =#========================================================================#=
// BYTE SOURCE SETTING
// =#========================================================================€=
/// Controls how the file is read during parsing.
///
/// By default, the [NexusReaderBuilder] uses [Automatic](ReadStrategy::Automatic),
/// which picks a strategy based on file size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReadStrategy {
    /// Read the file in chunks through a buffered I/O reader.
    Buffered,

    /// Load the entire file into a contiguous byte buffer before parsing.
    InMemory,

    /// Automatically choose between [ReadStrategy::Buffered] and
    /// [ReadStrategy::InMemory] based on file size.
    /// This is the default.
    Automatic,
}

// =#========================================================================#=
// NEXUS READER BUILDER
// =#========================================================================$=
/// Builder for reading a Nexus file.
///
/// # Configuration Options
/// * **Byte source**:
///   - [`with_buffered_source()`](Self::with_buffered_source)
///   - [`with_in_memory_source()`](Self::with_in_memory_source)
/// * **Trees**:
///   - [`metadata_only()`](Self::metadata_only): stop after the metadata
///     blocks without reading the TREES block
///
/// # Example
/// ```no_run
/// use nexnet::nexus::NexusReaderBuilder;
///
/// let file = NexusReaderBuilder::for_file("ebov_locations.nex")
///     .with_buffered_source()
///     .read()?;
/// println!("{} taxa, {} trees", file.metadata().taxa().len(), file.trees().len());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct NexusReaderBuilder {
    path: PathBuf,
    read_strategy: ReadStrategy,
    read_trees: bool,
}

impl NexusReaderBuilder {
    /// Creates a new builder for the file at `path`, with automatic read
    /// strategy and trees included.
    pub fn for_file<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            read_strategy: ReadStrategy::Automatic,
            read_trees: true,
        }
    }

    /// Configure the reader to read the file using a **buffered reader**.
    pub fn with_buffered_source(mut self) -> Self {
        self.read_strategy = ReadStrategy::Buffered;
        self
    }

    /// Configure the reader to read the **entire file into memory** upfront.
    pub fn with_in_memory_source(mut self) -> Self {
        self.read_strategy = ReadStrategy::InMemory;
        self
    }

    /// Configure the reader to skip the TREES block.
    pub fn metadata_only(mut self) -> Self {
        self.read_trees = false;
        self
    }

    /// Reads and validates the file.
    ///
    /// # Errors
    /// Returns a [ParsingError] if the file cannot be read or is malformed.
    pub fn read(self) -> Result<NexusFile, ParsingError> {
        /// File size threshold (in bytes) for automatic read strategy.
        /// Files smaller than this are read into memory; larger files use buffered I/O.
        const AUTO_IN_MEMORY_THRESHOLD: u64 = 100 * 1024 * 1024; // 100 MB

        let use_buffered = match self.read_strategy {
            ReadStrategy::Buffered => true,
            ReadStrategy::InMemory => false,
            ReadStrategy::Automatic => {
                let file_size = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
                file_size >= AUTO_IN_MEMORY_THRESHOLD
            }
        };
        debug!(
            "Reading {} ({})",
            self.path.display(),
            if use_buffered { "buffered" } else { "in memory" }
        );

        if use_buffered {
            read_source(ByteParser::from_file_buffered(&self.path)?, self.read_trees)
        } else {
            read_source(ByteParser::from_file_in_memory(&self.path)?, self.read_trees)
        }
    }
}

/// Parses metadata and, if `read_trees` and present, the TREES block.
fn read_source<B: ByteSource>(
    byte_parser: ByteParser<B>,
    read_trees: bool,
) -> Result<NexusFile, ParsingError> {
    let mut metadata_parser = MetadataParser::new(byte_parser);
    let metadata = metadata_parser.parse()?;
    let at_trees_block = metadata_parser.at_trees_block();

    let mut byte_parser = metadata_parser.into_byte_parser();
    let mut trees = Vec::new();
    if read_trees && at_trees_block {
        trees = TreesBlockReader::new(&mut byte_parser, metadata.taxa()).read_all()?;
    }
    if let Some(err) = byte_parser.take_io_error() {
        return Err(err.into());
    }

    Ok(NexusFile { metadata, trees })
}

// ============================================================================
// QUICK PARSING API (public)
// ============================================================================
/// Reads a Nexus file with default settings: metadata blocks and all trees.
///
/// # Errors
/// Returns an error if the file cannot be opened or parsed.
pub fn read_nexus_file<P: AsRef<Path>>(path: P) -> Result<NexusFile, ParsingError> {
    NexusReaderBuilder::for_file(path).read()
}

/// Parses a Nexus file given as string: metadata blocks and all trees.
pub fn parse_nexus_str(input: &str) -> Result<NexusFile, ParsingError> {
    read_source(ByteParser::for_str(input), true)
}

// =#========================================================================#=
// TESTS
// =#========================================================================$=
#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{BufferedByteSource, ParsingErrorType};
    use std::io::{self, Read};

    const INPUT: &[u8] = b"#NEXUS
BEGIN TAXA; DIMENSIONS NTAX=2; TAXLABELS a b; END;
BEGIN CHARACTERS; DIMENSIONS NCHAR=1; CHARSTATELABELS 1 x / p q;
MATRIX
a 0
b 1
;
END;
BEGIN TREES; TREE t = (a,b); END;
";

    /// Reader serving the first `limit` bytes of [INPUT], then failing.
    struct CutOff {
        served: usize,
        limit: usize,
    }

    impl Read for CutOff {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.served == self.limit {
                return Err(io::Error::other("connection reset"));
            }
            let n = (self.limit - self.served).min(buf.len());
            buf[..n].copy_from_slice(&INPUT[self.served..self.served + n]);
            self.served += n;
            Ok(n)
        }
    }

    fn read_cut_off(limit: usize) -> Result<NexusFile, ParsingError> {
        let source = BufferedByteSource::new(CutOff { served: 0, limit });
        read_source(ByteParser::new(source), true)
    }

    #[test]
    fn test_read_error_in_metadata() {
        let err = read_cut_off(40).unwrap_err();
        assert_eq!(
            err.kind(),
            &ParsingErrorType::IoError("connection reset".to_string())
        );
    }

    #[test]
    fn test_read_error_after_last_tree() {
        // everything but the closing `END;` of the TREES block
        let limit = INPUT.len() - 6;
        let err = read_cut_off(limit).unwrap_err();
        assert!(matches!(err.kind(), ParsingErrorType::IoError(_)));
    }

    #[test]
    fn test_buffered_read_without_error() {
        let file = read_source(ByteParser::new(BufferedByteSource::new(INPUT)), true).unwrap();
        assert_eq!(file.metadata().taxa().len(), 2);
        assert_eq!(file.trees().len(), 1);
    }
}
