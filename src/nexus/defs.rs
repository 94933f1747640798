//! Nexus format constants and definitions.
//!
//! Byte string constants for the keywords of the TAXA, CHARACTERS/DATA and
//! TREES blocks, as well as the [NexusBlock] enum. All keywords are matched
//! case-insensitively.

/// Nexus label delimiters: comma, semicolon, whitespace
pub(crate) const NEXUS_LABEL_DELIMITERS: &[u8] = b" ,;\t\n\r";

/// Nexus file header "#NEXUS"
pub(crate) const NEXUS_HEADER: &[u8] = b"#NEXUS";

/// Byte order mark some editors put in front of the header
pub(crate) const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Nexus block begin keyword "Begin"
pub(crate) const BLOCK_BEGIN: &[u8] = b"Begin";

/// Nexus block end keyword "End;" (with semicolon)
pub(crate) const BLOCK_END: &[u8] = b"End;";

/// Statement terminator
pub(crate) const TERMINATOR: u8 = b';';

// Shared commands
/// Command "Dimensions"
pub(crate) const DIMENSIONS: &str = "dimensions";

/// Number of taxa parameter "ntax"
pub(crate) const NTAX: &str = "ntax";

// Taxa block keywords
/// Tax labels command "Taxlabels"
pub(crate) const TAXLABELS: &str = "taxlabels";

// Characters block keywords
/// Number of characters parameter "nchar"
pub(crate) const NCHAR: &str = "nchar";

/// Command "Format"
pub(crate) const FORMAT: &str = "format";

/// Command "CharStateLabels"
pub(crate) const CHARSTATELABELS: &str = "charstatelabels";

/// Command "Matrix"
pub(crate) const MATRIX: &str = "matrix";

/// FORMAT keys
pub(crate) const DATATYPE: &str = "datatype";
pub(crate) const GAP: &str = "gap";
pub(crate) const MISSING: &str = "missing";
pub(crate) const SYMBOLS: &str = "symbols";
pub(crate) const INTERLEAVE: &str = "interleave";

/// The single supported DATATYPE value
pub(crate) const STANDARD: &str = "standard";

// Trees block keywords
/// TREES block translate command "Translate"
pub(crate) const TRANSLATE: &str = "translate";

/// Individual tree declaration keyword "tree"
pub(crate) const TREE: &str = "tree";

/// Nexus block types
#[derive(Debug, PartialEq, Clone)]
pub enum NexusBlock {
    Taxa,
    Trees,
    Data,
    Characters,
    UnknownBlock(String),
}

impl NexusBlock {
    /// Parse a block name (case-insensitive) into a NexusBlock variant
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "taxa" => NexusBlock::Taxa,
            "trees" => NexusBlock::Trees,
            "data" => NexusBlock::Data,
            "characters" => NexusBlock::Characters,
            _ => NexusBlock::UnknownBlock(name.to_string()),
        }
    }
}
