//! Parser for the metadata of a Nexus file: TAXA and CHARACTERS (or DATA) blocks.
//!
//! [MetadataParser] reads a Nexus file forward-only until the beginning of its
//! TREES block (or EOF) and produces [NexusMetadata]. Parsing is driven by an
//! explicit [ParserState] that every block handler receives by value and
//! returns updated; each step consumes exactly one block header or command.
//!
//! Every structural violation is fatal: on error no partial results are
//! exposed.

use crate::model::{
    CellState, Character, CharacterLabelSet, CharacterMatrix, SymbolLookup, SymbolTable,
    TaxonSet,
};
use crate::model::symbols::{DEFAULT_GAP, DEFAULT_MISSING, DEFAULT_SYMBOLS};
use crate::nexus::defs::*;
use crate::parser::byte_parser::{ByteParser, ConsumeMode::*};
use crate::parser::byte_source::ByteSource;
use crate::parser::parsing_error::{ParsingError, ParsingErrorType};
use log::{debug, warn};
use std::collections::HashSet;

/// Delimiters of character names and state labels in `CHARSTATELABELS`
const STATE_LABEL_DELIMITERS: &[u8] = b" ,;/\t\n\r";

// =#========================================================================#=
// NEXUS METADATA
// =#========================================================================$=
/// Taxa, characters, symbols and character matrix of one Nexus file.
#[derive(Debug, Clone, PartialEq)]
pub struct NexusMetadata {
    taxa: TaxonSet,
    characters: CharacterLabelSet,
    symbols: SymbolTable,
    matrix: CharacterMatrix,
}

impl NexusMetadata {
    pub fn taxa(&self) -> &TaxonSet {
        &self.taxa
    }

    pub fn characters(&self) -> &CharacterLabelSet {
        &self.characters
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn matrix(&self) -> &CharacterMatrix {
        &self.matrix
    }

    /// State of `taxon` for the 0-based character `column`.
    pub fn state_of(&self, taxon: &str, column: usize) -> Option<CellState> {
        self.matrix.get(self.taxa.index_of(taxon)?, column)
    }
}

// =#========================================================================#=
// PARSER STATE
// =#========================================================================$=
/// State of [MetadataParser] between two steps.
#[derive(Debug)]
enum ParserState {
    /// Between blocks, looking for the next `BEGIN <name>;`
    ScanningTop,
    /// Inside a TAXA block
    InTaxaBlock(TaxaBlock),
    /// Inside a CHARACTERS or DATA block
    InCharactersBlock(Box<CharactersBlock>),
    /// Metadata complete; `at_trees_block` tells whether a TREES block header
    /// was consumed (otherwise EOF was reached)
    Finished { at_trees_block: bool },
}

/// Accumulated content of an open TAXA block.
#[derive(Debug, Default)]
struct TaxaBlock {
    ntax: Option<usize>,
    taxa: Option<TaxonSet>,
}

/// Progress within a CHARACTERS block; commands must appear in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum CharactersPhase {
    Start,
    Dimensions,
    Format,
    StateLabels,
    Matrix,
}

impl CharactersPhase {
    fn command(self) -> &'static str {
        match self {
            CharactersPhase::Start => "BEGIN",
            CharactersPhase::Dimensions => "DIMENSIONS",
            CharactersPhase::Format => "FORMAT",
            CharactersPhase::StateLabels => "CHARSTATELABELS",
            CharactersPhase::Matrix => "MATRIX",
        }
    }
}

/// Accumulated content of an open CHARACTERS (or DATA) block.
#[derive(Debug)]
struct CharactersBlock {
    /// DATA block, whose rows may define the taxa
    is_data: bool,
    phase: CharactersPhase,
    nchar: usize,
    /// `NTAX` of a DATA block's DIMENSIONS command
    ntax: Option<usize>,
    symbols: SymbolTable,
    /// One slot per character, filled by `CHARSTATELABELS`
    labels: Vec<Option<Character>>,
    /// Mapped matrix rows in file order
    rows: Vec<(String, Vec<CellState>)>,
}

impl CharactersBlock {
    fn new(is_data: bool) -> Self {
        Self {
            is_data,
            phase: CharactersPhase::Start,
            nchar: 0,
            ntax: None,
            symbols: SymbolTable::default(),
            labels: Vec::new(),
            rows: Vec::new(),
        }
    }
}

/// Fully validated result of a CHARACTERS block.
#[derive(Debug)]
struct CharactersResult {
    characters: CharacterLabelSet,
    symbols: SymbolTable,
    matrix: CharacterMatrix,
    /// Set if the taxa were defined by the matrix rows (DATA block without TAXA block)
    implied_taxa: Option<TaxonSet>,
}

// =#========================================================================#=
// METADATA PARSER
// =#========================================================================$=
/// Single-pass parser for the TAXA and CHARACTERS/DATA blocks of a Nexus file.
///
/// # Assumptions
/// * File starts with `#NEXUS`
/// * Blocks are `BEGIN <name>; ... END;`; unknown blocks are skipped
/// * A TAXA block precedes the CHARACTERS block; only a DATA block may
///   stand without one, its matrix rows then define the taxa
/// * Within a CHARACTERS block: `DIMENSIONS`, then optional `FORMAT`, then
///   `CHARSTATELABELS`, then `MATRIX`
/// * The TREES block ends metadata parsing; it is left to
///   [TreesBlockReader](crate::nexus::TreesBlockReader)
///
/// # Example
/// ```
/// use nexnet::nexus::MetadataParser;
/// use nexnet::parser::ByteParser;
///
/// let input = "#NEXUS
/// BEGIN TAXA; DIMENSIONS NTAX=2; TAXLABELS Kea Kaka; END;
/// BEGIN CHARACTERS;
///   DIMENSIONS NCHAR=1;
///   FORMAT DATATYPE=STANDARD MISSING=? GAP=- SYMBOLS=\"01\";
///   CHARSTATELABELS 1 island / North South;
///   MATRIX
///     Kea 1
///     Kaka 0
///   ;
/// END;";
/// let mut parser = MetadataParser::new(ByteParser::for_str(input));
/// let metadata = parser.parse()?;
/// assert_eq!(metadata.taxa().len(), 2);
/// assert_eq!(metadata.characters().get(0).unwrap().name(), "island");
/// # Ok::<(), nexnet::parser::ParsingError>(())
/// ```
pub struct MetadataParser<B: ByteSource> {
    byte_parser: ByteParser<B>,
    taxa: Option<TaxonSet>,
    characters: Option<CharactersResult>,
    at_trees_block: bool,
}

// ============================================================================
// API (pub)
// ============================================================================
impl<B: ByteSource> MetadataParser<B> {
    pub fn new(byte_parser: ByteParser<B>) -> Self {
        Self {
            byte_parser,
            taxa: None,
            characters: None,
            at_trees_block: false,
        }
    }

    /// Parses the metadata blocks, stopping right after the header of the
    /// TREES block or at EOF.
    ///
    /// # Errors
    /// Returns a [ParsingError] on the first violated structural rule;
    /// see [ParsingErrorType] for the possible kinds.
    pub fn parse(&mut self) -> Result<NexusMetadata, ParsingError> {
        self.parse_nexus_header()?;

        let mut state = ParserState::ScanningTop;
        loop {
            state = match state {
                ParserState::ScanningTop => self.scan_top()?,
                ParserState::InTaxaBlock(block) => self.step_taxa_block(block)?,
                ParserState::InCharactersBlock(block) => self.step_characters_block(block)?,
                ParserState::Finished { at_trees_block } => {
                    self.at_trees_block = at_trees_block;
                    break;
                }
            };
        }

        let Some(characters) = self.characters.take() else {
            return Err(ParsingError::without_context(ParsingErrorType::MissingBlock(
                String::from("CHARACTERS"),
            )));
        };
        let taxa = match (self.taxa.take(), characters.implied_taxa) {
            (Some(taxa), None) | (None, Some(taxa)) => taxa,
            (Some(_), Some(_)) => {
                return Err(ParsingError::without_context(ParsingErrorType::InvalidTaxaBlock(
                    String::from("Taxa defined by both a TAXA block and DATA matrix rows."),
                )));
            }
            (None, None) => {
                return Err(ParsingError::without_context(ParsingErrorType::MissingBlock(
                    String::from("TAXA"),
                )));
            }
        };

        Ok(NexusMetadata {
            taxa,
            characters: characters.characters,
            symbols: characters.symbols,
            matrix: characters.matrix,
        })
    }

    /// Whether parsing stopped at a TREES block (rather than at EOF).
    pub fn at_trees_block(&self) -> bool {
        self.at_trees_block
    }

    /// Consumes the parser and returns the underlying [ByteParser],
    /// positioned after the TREES block header if one was found.
    pub fn into_byte_parser(self) -> ByteParser<B> {
        self.byte_parser
    }
}

// ============================================================================
// Top level (private)
// ============================================================================
impl<B: ByteSource> MetadataParser<B> {
    /// Parses header `#NEXUS` at start of file.
    fn parse_nexus_header(&mut self) -> Result<(), ParsingError> {
        self.byte_parser.consume_if_sequence(UTF8_BOM);
        self.byte_parser.skip_comment_and_whitespace()?;

        if !self.byte_parser.consume_if_sequence(NEXUS_HEADER) {
            return Err(ParsingError::missing_nexus_header(&mut self.byte_parser));
        }

        Ok(())
    }

    /// Detects the next block from its header `BEGIN <name>;` and enters it.
    fn scan_top(&mut self) -> Result<ParserState, ParsingError> {
        self.byte_parser.skip_comment_and_whitespace()?;
        if self.byte_parser.is_eof() {
            return Ok(ParserState::Finished {
                at_trees_block: false,
            });
        }

        if !self.byte_parser.consume_if_sequence(BLOCK_BEGIN) {
            return Err(ParsingError::invalid_formatting(
                &mut self.byte_parser,
                String::from("Expected 'BEGIN' of a block."),
            ));
        }
        self.byte_parser.skip_comment_and_whitespace()?;
        let block_name = self.byte_parser.parse_unquoted_label(&[TERMINATOR])?;
        if !self.byte_parser.consume_if(TERMINATOR) {
            return Err(ParsingError::unexpected_eof(&mut self.byte_parser));
        }

        let block = NexusBlock::from_name(block_name.trim());
        debug!("Entering {block:?} block at line {}", self.byte_parser.line());
        match block {
            NexusBlock::Taxa => {
                if self.taxa.is_some() {
                    return Err(ParsingError::invalid_taxa_block(
                        &mut self.byte_parser,
                        String::from("Only one TAXA block is supported."),
                    ));
                }
                if self.characters.is_some() {
                    return Err(ParsingError::invalid_taxa_block(
                        &mut self.byte_parser,
                        String::from("TAXA block must precede CHARACTERS block."),
                    ));
                }
                Ok(ParserState::InTaxaBlock(TaxaBlock::default()))
            }
            kind @ (NexusBlock::Characters | NexusBlock::Data) => {
                if self.characters.is_some() {
                    return Err(ParsingError::invalid_characters_block(
                        &mut self.byte_parser,
                        String::from("Only one CHARACTERS block is supported."),
                    ));
                }
                let is_data = kind == NexusBlock::Data;
                Ok(ParserState::InCharactersBlock(Box::new(CharactersBlock::new(is_data))))
            }
            NexusBlock::Trees => Ok(ParserState::Finished {
                at_trees_block: true,
            }),
            NexusBlock::UnknownBlock(name) => {
                warn!("Skipping unsupported block '{name}'");
                self.skip_to_block_end()?;
                Ok(ParserState::ScanningTop)
            }
        }
    }

    /// Skips block, e.g. continuing until encountering and consuming `END;`.
    fn skip_to_block_end(&mut self) -> Result<(), ParsingError> {
        if !self
            .byte_parser
            .consume_until_sequence(BLOCK_END, Inclusive)
        {
            return Err(ParsingError::unexpected_eof(&mut self.byte_parser));
        }

        Ok(())
    }

    /// Skips the rest of a command, including its terminator.
    fn skip_command(&mut self) -> Result<(), ParsingError> {
        if !self.byte_parser.consume_until(TERMINATOR, Inclusive) {
            return Err(ParsingError::unexpected_eof(&mut self.byte_parser));
        }
        Ok(())
    }

    /// Reads the next command keyword (lowercased). Empty statements are
    /// skipped; a block end `END;` (or `ENDBLOCK;`) is returned as `"end"`.
    fn next_command(&mut self) -> Result<String, ParsingError> {
        loop {
            let word = self.byte_parser.parse_word()?;
            if word.is_empty() {
                if self.byte_parser.consume_if(TERMINATOR) {
                    continue;
                }
                if self.byte_parser.is_eof() {
                    return Err(ParsingError::unexpected_eof(&mut self.byte_parser));
                }
                return Err(ParsingError::invalid_formatting(
                    &mut self.byte_parser,
                    String::from("Expected a command."),
                ));
            }

            let word = word.to_ascii_lowercase();
            if word == "end" || word == "endblock" {
                self.byte_parser.skip_comment_and_whitespace()?;
                if !self.byte_parser.consume_if(TERMINATOR) {
                    return Err(ParsingError::invalid_formatting(
                        &mut self.byte_parser,
                        String::from("Expected ';' after END."),
                    ));
                }
                return Ok(String::from("end"));
            }
            return Ok(word);
        }
    }

    /// Tokenizes the rest of a command into `KEY[=VALUE]` pairs up to and
    /// including its terminator. Keys are lowercased; values may be quoted
    /// with `"` or `'`.
    fn parse_assignments(&mut self) -> Result<Vec<(String, Option<String>)>, ParsingError> {
        let mut pairs = Vec::new();
        loop {
            self.byte_parser.skip_comment_and_whitespace()?;
            match self.byte_parser.peek() {
                None => return Err(ParsingError::unexpected_eof(&mut self.byte_parser)),
                Some(TERMINATOR) => {
                    self.byte_parser.next_byte();
                    return Ok(pairs);
                }
                Some(_) => {}
            }

            let key = self.byte_parser.parse_word()?.to_ascii_lowercase();
            if key.is_empty() {
                return Err(ParsingError::invalid_formatting(
                    &mut self.byte_parser,
                    String::from("Expected a key of a KEY=VALUE pair."),
                ));
            }

            self.byte_parser.skip_comment_and_whitespace()?;
            let value = if self.byte_parser.consume_if(b'=') {
                self.byte_parser.skip_comment_and_whitespace()?;
                Some(match self.byte_parser.peek() {
                    Some(quote @ (b'"' | b'\'')) => self.byte_parser.parse_quoted_label(quote)?,
                    _ => self.byte_parser.parse_unquoted_label(b" \t\n\r;")?,
                })
            } else {
                None
            };
            pairs.push((key, value));
        }
    }

    /// Parses the number of a `DIMENSIONS` parameter.
    fn parse_count(&mut self, key: &str, value: Option<String>) -> Result<usize, ParsingError> {
        let value = value.unwrap_or_default();
        value.parse().map_err(|_| {
            ParsingError::invalid_formatting(
                &mut self.byte_parser,
                format!("Cannot parse `{key}` value: '{value}'"),
            )
        })
    }
}

// ============================================================================
// TAXA block (private)
// ============================================================================
impl<B: ByteSource> MetadataParser<B> {
    /// Handles one command of a TAXA block:
    /// `DIMENSIONS NTAX=<n>;`, then `TAXLABELS <label> ...;`, then `END;`.
    /// Other commands are skipped.
    fn step_taxa_block(&mut self, mut block: TaxaBlock) -> Result<ParserState, ParsingError> {
        let command = self.next_command()?;
        match command.as_str() {
            DIMENSIONS => {
                for (key, value) in self.parse_assignments()? {
                    if key == NTAX {
                        block.ntax = Some(self.parse_count(NTAX, value)?);
                    }
                }
            }
            TAXLABELS => {
                let Some(ntax) = block.ntax else {
                    return Err(ParsingError::invalid_taxa_block(
                        &mut self.byte_parser,
                        String::from("Expected 'DIMENSIONS NTAX=' before 'TAXLABELS'."),
                    ));
                };
                block.taxa = Some(self.parse_taxa_labels(ntax)?);
            }
            "end" => {
                let taxa = self.close_taxa_block(block)?;
                debug!("Parsed TAXA block with {} taxa", taxa.len());
                self.taxa = Some(taxa);
                return Ok(ParserState::ScanningTop);
            }
            other => {
                debug!("Ignoring command '{other}' in TAXA block");
                self.skip_command()?;
            }
        }
        Ok(ParserState::InTaxaBlock(block))
    }

    /// Reads labels until the terminating semicolon.
    fn parse_taxa_labels(&mut self, ntax: usize) -> Result<TaxonSet, ParsingError> {
        let mut taxa = TaxonSet::with_capacity(ntax);
        loop {
            self.byte_parser.skip_comment_and_whitespace()?;

            match self.byte_parser.peek() {
                None => return Err(ParsingError::unexpected_eof(&mut self.byte_parser)),
                Some(TERMINATOR) => {
                    self.byte_parser.next_byte();
                    return Ok(taxa);
                }
                Some(b',') => {
                    self.byte_parser.next_byte();
                    continue;
                }
                Some(_) => {}
            }

            let label = self.byte_parser.parse_label(NEXUS_LABEL_DELIMITERS)?;
            if taxa.insert(&label).is_none() {
                return Err(ParsingError::invalid_taxa_block(
                    &mut self.byte_parser,
                    format!("Taxon label '{label}' listed more than once."),
                ));
            }
        }
    }

    /// Validates `len(taxa) == NTAX` on block close.
    fn close_taxa_block(&mut self, block: TaxaBlock) -> Result<TaxonSet, ParsingError> {
        let (Some(ntax), Some(taxa)) = (block.ntax, block.taxa) else {
            return Err(ParsingError::invalid_taxa_block(
                &mut self.byte_parser,
                String::from("Expected 'DIMENSIONS' and 'TAXLABELS' in TAXA block."),
            ));
        };

        if taxa.len() != ntax {
            return Err(ParsingError::dimension_mismatch(
                &mut self.byte_parser,
                format!(
                    "Number of parsed taxon labels ({}) did not match NTAX value ({}).",
                    taxa.len(),
                    ntax
                ),
            ));
        }

        Ok(taxa)
    }
}

// ============================================================================
// CHARACTERS block (private)
// ============================================================================
impl<B: ByteSource> MetadataParser<B> {
    /// Handles one command of a CHARACTERS/DATA block.
    fn step_characters_block(
        &mut self,
        mut block: Box<CharactersBlock>,
    ) -> Result<ParserState, ParsingError> {
        let command = self.next_command()?;
        let phase = match command.as_str() {
            DIMENSIONS => CharactersPhase::Dimensions,
            FORMAT => CharactersPhase::Format,
            CHARSTATELABELS => CharactersPhase::StateLabels,
            MATRIX => CharactersPhase::Matrix,
            "end" => {
                let result = self.close_characters_block(*block)?;
                debug!(
                    "Parsed CHARACTERS block with {} characters",
                    result.characters.len()
                );
                self.characters = Some(result);
                return Ok(ParserState::ScanningTop);
            }
            other => {
                warn!("Ignoring command '{other}' in CHARACTERS block");
                self.skip_command()?;
                return Ok(ParserState::InCharactersBlock(block));
            }
        };

        self.advance_phase(&mut block, phase)?;
        match phase {
            CharactersPhase::Dimensions => self.parse_characters_dimensions(&mut block)?,
            CharactersPhase::Format => self.parse_format(&mut block)?,
            CharactersPhase::StateLabels => self.parse_state_labels(&mut block)?,
            CharactersPhase::Matrix => self.parse_matrix(&mut block)?,
            CharactersPhase::Start => unreachable!("no command maps to the start phase"),
        }
        Ok(ParserState::InCharactersBlock(block))
    }

    /// Moves the block to `next`, enforcing command order.
    fn advance_phase(
        &mut self,
        block: &mut CharactersBlock,
        next: CharactersPhase,
    ) -> Result<(), ParsingError> {
        if block.phase == CharactersPhase::Start && next != CharactersPhase::Dimensions {
            return Err(ParsingError::invalid_characters_block(
                &mut self.byte_parser,
                format!("Expected 'DIMENSIONS' before '{}'.", next.command()),
            ));
        }
        if next <= block.phase {
            return Err(ParsingError::invalid_characters_block(
                &mut self.byte_parser,
                format!(
                    "'{}' must not appear after '{}'.",
                    next.command(),
                    block.phase.command()
                ),
            ));
        }
        block.phase = next;
        Ok(())
    }

    /// `DIMENSIONS [NTAX=<n>] NCHAR=<m>;`
    fn parse_characters_dimensions(
        &mut self,
        block: &mut CharactersBlock,
    ) -> Result<(), ParsingError> {
        let mut nchar = None;
        for (key, value) in self.parse_assignments()? {
            match key.as_str() {
                NCHAR => nchar = Some(self.parse_count(NCHAR, value)?),
                NTAX => block.ntax = Some(self.parse_count(NTAX, value)?),
                _ => debug!("Ignoring DIMENSIONS parameter '{key}'"),
            }
        }

        let Some(nchar) = nchar else {
            return Err(ParsingError::invalid_characters_block(
                &mut self.byte_parser,
                String::from("Expected 'NCHAR' in DIMENSIONS."),
            ));
        };
        block.nchar = nchar;
        block.labels = vec![None; nchar];
        Ok(())
    }

    /// `FORMAT DATATYPE=STANDARD GAP=<c> MISSING=<c> SYMBOLS="<alphabet>";`
    ///
    /// Only the STANDARD data type is supported. Keys not listed here are
    /// ignored.
    fn parse_format(&mut self, block: &mut CharactersBlock) -> Result<(), ParsingError> {
        let mut symbols = DEFAULT_SYMBOLS.to_vec();
        let mut missing = DEFAULT_MISSING;
        let mut gap = DEFAULT_GAP;

        for (key, value) in self.parse_assignments()? {
            match key.as_str() {
                DATATYPE => {
                    let datatype = value.unwrap_or_default();
                    if !datatype.eq_ignore_ascii_case(STANDARD) {
                        return Err(ParsingError::from_parser(
                            ParsingErrorType::UnsupportedDataType(datatype),
                            &mut self.byte_parser,
                        ));
                    }
                }
                GAP => gap = self.parse_single_symbol(GAP, value)?,
                MISSING => missing = self.parse_single_symbol(MISSING, value)?,
                SYMBOLS => {
                    let alphabet = value.unwrap_or_default();
                    symbols = alphabet.chars().filter(|c| !c.is_whitespace()).collect();
                }
                INTERLEAVE => {
                    let interleaved = value.is_none_or(|v| v.eq_ignore_ascii_case("yes"));
                    if interleaved {
                        return Err(ParsingError::invalid_characters_block(
                            &mut self.byte_parser,
                            String::from("Interleaved matrices are not supported."),
                        ));
                    }
                }
                _ => warn!("Ignoring FORMAT key '{key}'"),
            }
        }

        block.symbols = SymbolTable::new(symbols, missing, gap)
            .map_err(|e| ParsingError::illegal_symbol(&mut self.byte_parser, e.to_string()))?;
        debug!(
            "Symbol table: {:?} (missing '{missing}', gap '{gap}')",
            block.symbols.symbols()
        );
        Ok(())
    }

    /// Parses the value of `GAP=` or `MISSING=`, which must be one character.
    fn parse_single_symbol(&mut self, key: &str, value: Option<String>) -> Result<char, ParsingError> {
        let value = value.unwrap_or_default();
        let mut chars = value.chars();
        match (chars.next(), chars.next()) {
            (Some(symbol), None) if !symbol.is_whitespace() => Ok(symbol),
            _ => Err(ParsingError::illegal_symbol(
                &mut self.byte_parser,
                format!("{} must be a single character, got '{value}'", key.to_uppercase()),
            )),
        }
    }

    /// `CHARSTATELABELS <index> <name> [/] <label> ... [, ...];`
    ///
    /// Records may come in any index order.
    fn parse_state_labels(&mut self, block: &mut CharactersBlock) -> Result<(), ParsingError> {
        loop {
            self.byte_parser.skip_comment_and_whitespace()?;
            if self.byte_parser.consume_if(TERMINATOR) {
                return Ok(());
            }

            let Some(index) = self.byte_parser.parse_usize()? else {
                if self.byte_parser.is_eof() {
                    return Err(ParsingError::unexpected_eof(&mut self.byte_parser));
                }
                return Err(ParsingError::invalid_characters_block(
                    &mut self.byte_parser,
                    String::from("Expected character index in CHARSTATELABELS."),
                ));
            };
            if index == 0 || index > block.nchar {
                return Err(ParsingError::dimension_mismatch(
                    &mut self.byte_parser,
                    format!(
                        "Character index {index} outside of 1..={} in CHARSTATELABELS.",
                        block.nchar
                    ),
                ));
            }

            let name = self.byte_parser.parse_label(STATE_LABEL_DELIMITERS)?;
            if name.is_empty() {
                return Err(ParsingError::invalid_characters_block(
                    &mut self.byte_parser,
                    format!("Missing name of character {index}."),
                ));
            }

            self.byte_parser.skip_comment_and_whitespace()?;
            self.byte_parser.consume_if(b'/');

            let mut state_labels = Vec::new();
            loop {
                self.byte_parser.skip_comment_and_whitespace()?;
                match self.byte_parser.peek() {
                    None => return Err(ParsingError::unexpected_eof(&mut self.byte_parser)),
                    Some(b',') => {
                        self.byte_parser.next_byte();
                        break;
                    }
                    Some(TERMINATOR) => break,
                    Some(_) => {}
                }
                let label = self.byte_parser.parse_label(STATE_LABEL_DELIMITERS)?;
                if label.is_empty() {
                    return Err(ParsingError::invalid_characters_block(
                        &mut self.byte_parser,
                        format!("Unexpected character in state labels of character {index}."),
                    ));
                }
                state_labels.push(label);
            }

            let slot = &mut block.labels[index - 1];
            if slot.is_some() {
                return Err(ParsingError::dimension_mismatch(
                    &mut self.byte_parser,
                    format!("Character {index} declared more than once in CHARSTATELABELS."),
                ));
            }
            debug!("Character {index} '{name}' with {} states", state_labels.len());
            *slot = Some(Character::new(name, state_labels));
        }
    }

    /// `MATRIX <taxon> <symbols> ... ;` with one row per line.
    ///
    /// Each symbol is mapped through the block's [SymbolTable]; membership of
    /// the row's taxon is checked after mapping.
    fn parse_matrix(&mut self, block: &mut CharactersBlock) -> Result<(), ParsingError> {
        let mut seen = HashSet::new();
        loop {
            self.byte_parser.skip_comment_and_whitespace()?;
            match self.byte_parser.peek() {
                None => return Err(ParsingError::unexpected_eof(&mut self.byte_parser)),
                Some(TERMINATOR) => {
                    self.byte_parser.next_byte();
                    debug!("Parsed MATRIX with {} rows", block.rows.len());
                    return Ok(());
                }
                Some(_) => {}
            }

            let taxon = self.byte_parser.parse_label(NEXUS_LABEL_DELIMITERS)?;
            if taxon.is_empty() {
                return Err(ParsingError::invalid_characters_block(
                    &mut self.byte_parser,
                    String::from("Expected taxon label at start of MATRIX row."),
                ));
            }

            let symbols = self.parse_row_symbols()?;
            if symbols.len() != block.nchar {
                return Err(ParsingError::dimension_mismatch(
                    &mut self.byte_parser,
                    format!(
                        "MATRIX row of taxon '{taxon}' has {} symbols, expected NCHAR={}.",
                        symbols.len(),
                        block.nchar
                    ),
                ));
            }

            let mut row = Vec::with_capacity(symbols.len());
            for symbol in symbols {
                let cell = match block.symbols.lookup(symbol) {
                    SymbolLookup::State(code) => Some(code),
                    SymbolLookup::Missing => None,
                    SymbolLookup::Gap => {
                        return Err(ParsingError::from_parser(
                            ParsingErrorType::UnsupportedGap { taxon, symbol },
                            &mut self.byte_parser,
                        ));
                    }
                    SymbolLookup::Unknown => {
                        return Err(ParsingError::from_parser(
                            ParsingErrorType::UnknownSymbol { taxon, symbol },
                            &mut self.byte_parser,
                        ));
                    }
                };
                row.push(cell);
            }

            if let Some(taxa) = &self.taxa {
                if !taxa.contains(&taxon) {
                    return Err(ParsingError::from_parser(
                        ParsingErrorType::UnknownTaxon(taxon),
                        &mut self.byte_parser,
                    ));
                }
            }
            if !seen.insert(taxon.clone()) {
                return Err(ParsingError::invalid_characters_block(
                    &mut self.byte_parser,
                    format!("Taxon '{taxon}' has more than one MATRIX row."),
                ));
            }
            block.rows.push((taxon, row));
        }
    }

    /// Reads the symbols of one matrix row up to the end of the line or the
    /// terminator (not consumed). Spaces, tabs and comments are skipped.
    fn parse_row_symbols(&mut self) -> Result<Vec<char>, ParsingError> {
        let mut symbols = Vec::new();
        loop {
            self.byte_parser.skip_inline_whitespace();
            match self.byte_parser.peek() {
                None | Some(b'\n' | b'\r' | TERMINATOR) => return Ok(symbols),
                Some(b'[') => {
                    self.byte_parser.skip_comment()?;
                }
                Some(_) => {
                    if let Some(symbol) = self.byte_parser.next_char()? {
                        symbols.push(symbol);
                    }
                }
            }
        }
    }

    /// Validates the block on `END;` and assembles the [CharacterMatrix]:
    /// 1. every character has state labels
    /// 2. one row per taxon (and `NTAX`, if given, matches)
    /// 3. every non-missing state is within its character's label range
    fn close_characters_block(
        &mut self,
        block: CharactersBlock,
    ) -> Result<CharactersResult, ParsingError> {
        if block.phase < CharactersPhase::Matrix {
            return Err(ParsingError::invalid_characters_block(
                &mut self.byte_parser,
                String::from("Expected 'MATRIX' in CHARACTERS block."),
            ));
        }

        let num_labelled = block.labels.iter().filter(|c| c.is_some()).count();
        let characters: Vec<Character> = block.labels.into_iter().flatten().collect();
        if num_labelled != block.nchar {
            return Err(ParsingError::dimension_mismatch(
                &mut self.byte_parser,
                format!(
                    "State labels declared for {num_labelled} of NCHAR={} characters.",
                    block.nchar
                ),
            ));
        }

        // Taxa: from TAXA block, or implied by the rows of a DATA block
        let mut implied_taxa = None;
        let num_taxa = match &self.taxa {
            Some(taxa) => taxa.len(),
            None if !block.is_data => {
                return Err(ParsingError::from_parser(
                    ParsingErrorType::MissingBlock(String::from("TAXA")),
                    &mut self.byte_parser,
                ));
            }
            None => {
                let mut taxa = TaxonSet::with_capacity(block.rows.len());
                for (taxon, _) in &block.rows {
                    taxa.insert(taxon);
                }
                let num_taxa = taxa.len();
                implied_taxa = Some(taxa);
                num_taxa
            }
        };
        if let Some(ntax) = block.ntax {
            if ntax != num_taxa {
                return Err(ParsingError::dimension_mismatch(
                    &mut self.byte_parser,
                    format!("NTAX={ntax} in DIMENSIONS but {num_taxa} taxa declared."),
                ));
            }
        }
        if block.rows.len() != num_taxa {
            return Err(ParsingError::dimension_mismatch(
                &mut self.byte_parser,
                format!(
                    "MATRIX has {} rows, expected one for each of {num_taxa} taxa.",
                    block.rows.len()
                ),
            ));
        }

        // Bounds check of every mapped state
        for (taxon, row) in &block.rows {
            for (column, cell) in row.iter().enumerate() {
                let Some(code) = cell else { continue };
                let character = &characters[column];
                if !character.in_range(*code) {
                    return Err(ParsingError::from_parser(
                        ParsingErrorType::OutOfBounds {
                            taxon: taxon.clone(),
                            character: column + 1,
                            state: code.code(),
                            num_states: character.num_states(),
                        },
                        &mut self.byte_parser,
                    ));
                }
            }
        }

        // Rows in taxon order
        let order = self.taxa.as_ref().or(implied_taxa.as_ref());
        let mut ordered: Vec<Option<Vec<CellState>>> = vec![None; num_taxa];
        for (taxon, row) in block.rows {
            if let Some(idx) = order.and_then(|taxa| taxa.index_of(&taxon)) {
                ordered[idx] = Some(row);
            }
        }
        let rows: Vec<Vec<CellState>> = ordered.into_iter().flatten().collect();
        if rows.len() != num_taxa {
            return Err(ParsingError::dimension_mismatch(
                &mut self.byte_parser,
                format!("MATRIX does not contain a row for each of {num_taxa} taxa."),
            ));
        }

        Ok(CharactersResult {
            characters: CharacterLabelSet::new(characters),
            symbols: block.symbols,
            matrix: CharacterMatrix::from_rows(block.nchar, rows),
            implied_taxa,
        })
    }
}

// =#========================================================================#=
// TESTS
// =#========================================================================$=
#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<NexusMetadata, ParsingError> {
        MetadataParser::new(ByteParser::for_str(input)).parse()
    }

    fn characters_block(format: &str, labels: &str, matrix: &str) -> String {
        format!(
            "#NEXUS
BEGIN TAXA;
  DIMENSIONS NTAX=3;
  TAXLABELS t1 t2 t3;
END;
BEGIN CHARACTERS;
  DIMENSIONS NCHAR=2;
  {format}
  CHARSTATELABELS
    {labels};
  MATRIX
{matrix}
  ;
END;
"
        )
    }

    const LABELS: &str = "1 location / Asia Europe Africa, 2 host / bat human";
    const MATRIX_OK: &str = "    t1 00\n    t2 1?\n    t3 21";

    #[test]
    fn test_valid_block() {
        let input = characters_block("FORMAT DATATYPE=STANDARD GAP=- MISSING=? SYMBOLS=\"012\";", LABELS, MATRIX_OK);
        let metadata = parse(&input).unwrap();
        assert_eq!(metadata.taxa().len(), 3);
        assert_eq!(metadata.matrix().num_rows(), 3);
        assert_eq!(metadata.matrix().num_columns(), 2);
        assert_eq!(metadata.characters().get(1).unwrap().state_labels(), &["bat", "human"]);
        assert_eq!(metadata.state_of("t2", 1), Some(None));
        assert_eq!(metadata.state_of("t3", 0).unwrap().map(|c| c.code()), Some(3));
    }

    #[test]
    fn test_state_labels_any_order_and_spaced_symbols() {
        let labels = "2 host / bat human, 1 location / Asia Europe Africa";
        let input = characters_block("FORMAT SYMBOLS=\"0 1 2\";", labels, MATRIX_OK);
        let metadata = parse(&input).unwrap();
        assert_eq!(metadata.characters().get(0).unwrap().name(), "location");
        assert_eq!(metadata.symbols().symbols(), &['0', '1', '2']);
    }

    #[test]
    fn test_gap_fails() {
        let matrix = "    t1 00\n    t2 1-\n    t3 21";
        let input = characters_block("FORMAT SYMBOLS=\"012\";", LABELS, matrix);
        let err = parse(&input).unwrap_err();
        assert_eq!(
            err.kind(),
            &ParsingErrorType::UnsupportedGap { taxon: "t2".to_string(), symbol: '-' }
        );
        assert_eq!(err.line(), 13);
    }

    #[test]
    fn test_unknown_symbol_fails() {
        let matrix = "    t1 00\n    t2 1x\n    t3 21";
        let input = characters_block("FORMAT SYMBOLS=\"012\";", LABELS, matrix);
        assert_eq!(
            parse(&input).unwrap_err().kind(),
            &ParsingErrorType::UnknownSymbol { taxon: "t2".to_string(), symbol: 'x' }
        );
    }

    #[test]
    fn test_out_of_bounds_fails() {
        // '2' maps to state 3, but 'host' has only two labels
        let matrix = "    t1 00\n    t2 12\n    t3 21";
        let input = characters_block("FORMAT SYMBOLS=\"012\";", LABELS, matrix);
        assert_eq!(
            parse(&input).unwrap_err().kind(),
            &ParsingErrorType::OutOfBounds {
                taxon: "t2".to_string(),
                character: 2,
                state: 3,
                num_states: 2
            }
        );
    }

    #[test]
    fn test_unsupported_datatype_fails() {
        let input = characters_block("FORMAT DATATYPE=DNA;", LABELS, MATRIX_OK);
        assert_eq!(
            parse(&input).unwrap_err().kind(),
            &ParsingErrorType::UnsupportedDataType("DNA".to_string())
        );
    }

    #[test]
    fn test_illegal_symbol_fails() {
        let input = characters_block("FORMAT SYMBOLS=\"0 1 *\";", LABELS, MATRIX_OK);
        assert!(matches!(
            parse(&input).unwrap_err().kind(),
            ParsingErrorType::IllegalSymbol(_)
        ));

        let input = characters_block("FORMAT MISSING=0 SYMBOLS=\"012\";", LABELS, MATRIX_OK);
        assert!(matches!(
            parse(&input).unwrap_err().kind(),
            ParsingErrorType::IllegalSymbol(_)
        ));

        let input = characters_block("FORMAT SYMBOLS=\"01é\";", LABELS, MATRIX_OK);
        assert!(matches!(
            parse(&input).unwrap_err().kind(),
            ParsingErrorType::IllegalSymbol(_)
        ));
    }

    #[test]
    fn test_utf8_state_labels_and_symbols() {
        let labels = "1 loc / 'Côte d''Ivoire' Ghana Mali, 2 host / bat human";
        let metadata = parse(&characters_block("FORMAT SYMBOLS=\"012\";", labels, MATRIX_OK)).unwrap();
        assert_eq!(
            metadata.characters().get(0).unwrap().state_labels(),
            &["Côte d'Ivoire", "Ghana", "Mali"]
        );

        let matrix = "    t1 00\n    t2 é1\n    t3 21";
        let input = characters_block("FORMAT SYMBOLS=\"012\";", labels, matrix);
        assert_eq!(
            parse(&input).unwrap_err().kind(),
            &ParsingErrorType::UnknownSymbol {
                taxon: "t2".to_string(),
                symbol: 'é'
            }
        );
    }

    #[test]
    fn test_unknown_taxon_fails() {
        let matrix = "    t1 00\n    t9 10\n    t3 21";
        let input = characters_block("FORMAT SYMBOLS=\"012\";", LABELS, matrix);
        assert_eq!(
            parse(&input).unwrap_err().kind(),
            &ParsingErrorType::UnknownTaxon("t9".to_string())
        );
    }

    #[test]
    fn test_row_length_and_missing_rows_fail() {
        let matrix = "    t1 00\n    t2 1\n    t3 21";
        let input = characters_block("FORMAT SYMBOLS=\"012\";", LABELS, matrix);
        assert!(matches!(
            parse(&input).unwrap_err().kind(),
            ParsingErrorType::DimensionMismatch(_)
        ));

        let matrix = "    t1 00\n    t3 21";
        let input = characters_block("FORMAT SYMBOLS=\"012\";", LABELS, matrix);
        assert!(matches!(
            parse(&input).unwrap_err().kind(),
            ParsingErrorType::DimensionMismatch(_)
        ));
    }

    #[test]
    fn test_incomplete_state_labels_fail() {
        let input = characters_block("FORMAT SYMBOLS=\"012\";", "1 location / Asia Europe Africa", MATRIX_OK);
        assert!(matches!(
            parse(&input).unwrap_err().kind(),
            ParsingErrorType::DimensionMismatch(_)
        ));
    }

    #[test]
    fn test_command_order_enforced() {
        let input = "#NEXUS
BEGIN TAXA; DIMENSIONS NTAX=1; TAXLABELS t1; END;
BEGIN CHARACTERS;
  DIMENSIONS NCHAR=1;
  CHARSTATELABELS 1 c / a b;
  FORMAT SYMBOLS=\"01\";
  MATRIX t1 0;
END;";
        assert!(matches!(
            parse(input).unwrap_err().kind(),
            ParsingErrorType::InvalidCharactersBlock(_)
        ));
    }

    #[test]
    fn test_taxa_dimension_mismatch() {
        let input = "#NEXUS
BEGIN TAXA;
  DIMENSIONS NTAX=3;
  TAXLABELS t1 t2 t3 t4;
END;";
        let mut parser = MetadataParser::new(ByteParser::for_str(input));
        let err = parser.parse().unwrap_err();
        assert!(matches!(err.kind(), ParsingErrorType::DimensionMismatch(_)));
        assert!(parser.taxa.is_none());
    }

    #[test]
    fn test_data_block_without_taxa_block() {
        let input = "#NEXUS
[exported with comments]
BEGIN DATA;
  DIMENSIONS NTAX=2 NCHAR=1;
  FORMAT DATATYPE=Standard MISSING=N GAP=- SYMBOLS=\"AB\";
  CHARSTATELABELS 1 'sampling site' / 'Lake Taupo' Rotorua;
  MATRIX
    'sample one' B
    s2 N
  ;
END;
BEGIN TREES;";
        let mut parser = MetadataParser::new(ByteParser::for_str(input));
        let metadata = parser.parse().unwrap();
        assert!(parser.at_trees_block());
        assert_eq!(metadata.taxa().label(0), Some("sample one"));
        assert_eq!(metadata.characters().get(0).unwrap().name(), "sampling site");
        assert_eq!(
            metadata.characters().get(0).unwrap().state_labels(),
            &["Lake Taupo", "Rotorua"]
        );
        assert_eq!(metadata.state_of("s2", 0), Some(None));
    }

    #[test]
    fn test_taxa_block_after_characters_fails() {
        let input = "#NEXUS
BEGIN CHARACTERS;
  DIMENSIONS NCHAR=1;
  CHARSTATELABELS 1 trait / absent present;
  MATRIX
    t1 0
    t2 0
    t3 1
  ;
END;
BEGIN TAXA; DIMENSIONS NTAX=3; TAXLABELS t3 t2 t1; END;
";
        assert_eq!(
            parse(input).unwrap_err().kind(),
            &ParsingErrorType::MissingBlock("TAXA".to_string())
        );

        // rows of a DATA block cannot be reordered by a later TAXA block
        let input = input.replace("BEGIN CHARACTERS;", "BEGIN DATA;");
        assert!(matches!(
            parse(&input).unwrap_err().kind(),
            ParsingErrorType::InvalidTaxaBlock(_)
        ));
    }

    #[test]
    fn test_characters_block_without_taxa_block_fails() {
        let input = "#NEXUS
BEGIN CHARACTERS;
  DIMENSIONS NCHAR=1;
  CHARSTATELABELS 1 trait / absent present;
  MATRIX
    t1 0
    t2 1
  ;
END;
";
        assert_eq!(
            parse(input).unwrap_err().kind(),
            &ParsingErrorType::MissingBlock("TAXA".to_string())
        );
    }

    #[test]
    fn test_missing_characters_block() {
        let input = "#NEXUS\nBEGIN TAXA; DIMENSIONS NTAX=1; TAXLABELS t1; END;\n";
        assert_eq!(
            parse(input).unwrap_err().kind(),
            &ParsingErrorType::MissingBlock("CHARACTERS".to_string())
        );
    }

    #[test]
    fn test_missing_header() {
        assert_eq!(
            parse("BEGIN TAXA;").unwrap_err().kind(),
            &ParsingErrorType::MissingNexusHeader
        );
    }

    #[test]
    fn test_byte_order_mark() {
        let input = format!("\u{FEFF}{}", characters_block("FORMAT SYMBOLS=\"012\";", LABELS, MATRIX_OK));
        assert_eq!(parse(&input).unwrap().taxa().len(), 3);
    }
}
