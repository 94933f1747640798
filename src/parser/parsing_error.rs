//! Error types for Nexus and Newick parsing.
//!
//! This module provides [ParsingError] and [ParsingErrorType] for representing
//! and reporting errors that occur while reading taxa, character data and trees.
//! Every error is fatal for the current run; the parser never returns partial
//! results.

use crate::parser::byte_parser::ByteParser;
use crate::parser::byte_source::ByteSource;
use std::error::Error;
use std::fmt;
use thiserror::Error as ThisError;

/// Default length of context provided by error from parser
const DEFAULT_CONTEXT_LENGTH: usize = 50;

// =#========================================================================#=
// PARSING ERROR TYPE
// =#========================================================================€=
/// Error types that can occur during Nexus and Newick parsing.
#[derive(ThisError, PartialEq, Debug, Clone)]
pub enum ParsingErrorType {
    #[error("IO error - {0}")]
    IoError(String),
    #[error("Unexpected end of file")]
    UnexpectedEOF,
    #[error("File does not start with #NEXUS header")]
    MissingNexusHeader,
    #[error("Invalid formatting - {0}")]
    InvalidFormatting(String),
    #[error("Unclosed comment")]
    UnclosedComment,
    #[error("Required {0} block not found")]
    MissingBlock(String),
    #[error("Invalid TAXA block format - {0}")]
    InvalidTaxaBlock(String),
    #[error("Invalid CHARACTERS block format - {0}")]
    InvalidCharactersBlock(String),
    #[error("Invalid TREES block format - {0}")]
    InvalidTreesBlock(String),
    #[error("Invalid newick string: {0}")]
    InvalidNewickString(String),
    #[error("Could not resolve label - {0}")]
    UnresolvedLabel(String),

    /// Declared and actual counts disagree
    #[error("Dimension mismatch - {0}")]
    DimensionMismatch(String),
    /// Character data type other than STANDARD
    #[error("Unsupported data type '{0}', only STANDARD is supported")]
    UnsupportedDataType(String),
    /// Non-alphanumeric or otherwise unusable token where a symbol was expected
    #[error("Illegal symbol - {0}")]
    IllegalSymbol(String),
    /// Matrix token is neither in the alphabet nor the missing or gap symbol
    #[error("Unknown symbol '{symbol}' in MATRIX row of taxon '{taxon}'")]
    UnknownSymbol { taxon: String, symbol: char },
    /// Matrix token is the declared gap symbol
    #[error("Gap symbol '{symbol}' in MATRIX row of taxon '{taxon}' is not supported")]
    UnsupportedGap { taxon: String, symbol: char },
    /// Mapped state exceeds the state labels declared for its character
    #[error(
        "State {state} of taxon '{taxon}' is out of bounds for character {character} \
         with {num_states} state labels"
    )]
    OutOfBounds {
        taxon: String,
        character: usize,
        state: usize,
        num_states: usize,
    },
    /// MATRIX row for a taxon not declared in the TAXA block
    #[error("Unknown taxon '{0}' in MATRIX")]
    UnknownTaxon(String),
}

// =#========================================================================#=
// PARSING ERROR
// =#========================================================================$=
/// Parsing error with contextual information (line, byte position and the
/// bytes following the error).
#[derive(Debug)]
pub struct ParsingError {
    kind: ParsingErrorType,
    position: usize,
    line: usize,
    context: String,
}

impl ParsingError {
    /// Create a ParsingError from an error type and parser state.
    ///
    /// A pending read error of the source takes precedence over `kind`,
    /// since it is what cut the input short.
    pub fn from_parser<S: ByteSource>(kind: ParsingErrorType, parser: &mut ByteParser<S>) -> Self {
        let kind = match parser.take_io_error() {
            Some(err) => ParsingErrorType::IoError(err.to_string()),
            None => kind,
        };
        Self {
            kind,
            position: parser.position(),
            line: parser.line(),
            context: parser.get_context_as_string(DEFAULT_CONTEXT_LENGTH),
        }
    }

    /// Convenience constructor for UnexpectedEOF
    pub fn unexpected_eof<S: ByteSource>(parser: &mut ByteParser<S>) -> Self {
        Self::from_parser(ParsingErrorType::UnexpectedEOF, parser)
    }

    /// Convenience constructor for MissingNexusHeader
    pub fn missing_nexus_header<S: ByteSource>(parser: &mut ByteParser<S>) -> Self {
        Self::from_parser(ParsingErrorType::MissingNexusHeader, parser)
    }

    /// Convenience constructor for InvalidFormatting
    pub fn invalid_formatting<S: ByteSource>(parser: &mut ByteParser<S>, msg: String) -> Self {
        Self::from_parser(ParsingErrorType::InvalidFormatting(msg), parser)
    }

    /// Convenience constructor for UnclosedComment
    pub fn unclosed_comment<S: ByteSource>(parser: &mut ByteParser<S>) -> Self {
        Self::from_parser(ParsingErrorType::UnclosedComment, parser)
    }

    /// Convenience constructor for InvalidTaxaBlock
    pub fn invalid_taxa_block<S: ByteSource>(parser: &mut ByteParser<S>, msg: String) -> Self {
        Self::from_parser(ParsingErrorType::InvalidTaxaBlock(msg), parser)
    }

    /// Convenience constructor for InvalidCharactersBlock
    pub fn invalid_characters_block<S: ByteSource>(
        parser: &mut ByteParser<S>,
        msg: String,
    ) -> Self {
        Self::from_parser(ParsingErrorType::InvalidCharactersBlock(msg), parser)
    }

    /// Convenience constructor for InvalidTreesBlock
    pub fn invalid_trees_block<S: ByteSource>(parser: &mut ByteParser<S>, msg: String) -> Self {
        Self::from_parser(ParsingErrorType::InvalidTreesBlock(msg), parser)
    }

    /// Convenience constructor for InvalidNewickString
    pub fn invalid_newick_string<S: ByteSource>(parser: &mut ByteParser<S>, msg: String) -> Self {
        Self::from_parser(ParsingErrorType::InvalidNewickString(msg), parser)
    }

    /// Convenience constructor for UnresolvedLabel
    pub fn unresolved_label<S: ByteSource>(parser: &mut ByteParser<S>, msg: String) -> Self {
        Self::from_parser(ParsingErrorType::UnresolvedLabel(msg), parser)
    }

    /// Convenience constructor for DimensionMismatch
    pub fn dimension_mismatch<S: ByteSource>(parser: &mut ByteParser<S>, msg: String) -> Self {
        Self::from_parser(ParsingErrorType::DimensionMismatch(msg), parser)
    }

    /// Convenience constructor for IllegalSymbol
    pub fn illegal_symbol<S: ByteSource>(parser: &mut ByteParser<S>, msg: String) -> Self {
        Self::from_parser(ParsingErrorType::IllegalSymbol(msg), parser)
    }

    /// Create a ParsingError without parser context
    pub fn without_context(kind: ParsingErrorType) -> Self {
        Self {
            kind,
            position: 0,
            line: 0,
            context: String::new(),
        }
    }

    /// Get the error kind
    pub fn kind(&self) -> &ParsingErrorType {
        &self.kind
    }

    /// Get the byte position where the error occurred
    pub fn position(&self) -> usize {
        self.position
    }

    /// Get the 1-based line where the error occurred (0 if unknown)
    pub fn line(&self) -> usize {
        self.line
    }
}

impl fmt::Display for ParsingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.kind)?;

        if self.line > 0 {
            write!(f, " at line {} (byte {})", self.line, self.position)?;
        }

        if !self.context.is_empty() {
            write!(
                f,
                "\n  Context (next {} bytes): {}",
                self.context.len(),
                self.context
            )?;
        }

        Ok(())
    }
}

impl Error for ParsingError {}

impl From<std::io::Error> for ParsingError {
    fn from(err: std::io::Error) -> Self {
        Self::without_context(ParsingErrorType::IoError(err.to_string()))
    }
}
