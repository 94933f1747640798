//! Reader for the TREES block of a Nexus file.

use crate::model::{LabelResolver, PhyloTree, TaxonSet};
use crate::newick::NewickParser;
use crate::nexus::defs::*;
use crate::parser::byte_parser::{ByteParser, ConsumeMode::Inclusive};
use crate::parser::byte_source::ByteSource;
use crate::parser::parsing_error::ParsingError;
use log::debug;

/// Reads all `TREE` commands of a TREES block, resolving leaf labels against
/// the taxa of the metadata blocks.
///
/// Expects the [ByteParser] to be positioned right after `BEGIN TREES;`, as
/// left by [MetadataParser](crate::nexus::MetadataParser). Supports an
/// optional `TRANSLATE` command before the first tree; `[&R]`/`[&U]` markers
/// are skipped as comments.
pub struct TreesBlockReader<'a, B: ByteSource> {
    byte_parser: &'a mut ByteParser<B>,
    taxa: &'a TaxonSet,
}

impl<'a, B: ByteSource> TreesBlockReader<'a, B> {
    pub fn new(byte_parser: &'a mut ByteParser<B>, taxa: &'a TaxonSet) -> Self {
        Self { byte_parser, taxa }
    }

    /// Parses the block up to and including `END;`.
    ///
    /// # Errors
    /// Returns a [ParsingError] if the block is malformed, a leaf label
    /// cannot be resolved, or a tree does not contain every taxon exactly once.
    pub fn read_all(mut self) -> Result<Vec<PhyloTree>, ParsingError> {
        let translation = self.parse_translate()?;
        let resolver = if translation.is_empty() {
            LabelResolver::NexusLabels {
                index_map: Default::default(),
                taxa: self.taxa,
            }
        } else {
            LabelResolver::new_nexus_labels_resolver(translation, self.taxa)
                .map_err(|e| ParsingError::unresolved_label(self.byte_parser, e.to_string()))?
        };
        let mut newick_parser = NewickParser::new(resolver);

        let mut trees = Vec::new();
        loop {
            self.byte_parser.skip_comment_and_whitespace()?;

            // Stop if "END;"
            if self.byte_parser.consume_if_sequence(BLOCK_END) {
                break;
            }

            let command = self.byte_parser.parse_word()?;
            if command.is_empty() {
                if self.byte_parser.is_eof() {
                    return Err(ParsingError::unexpected_eof(self.byte_parser));
                }
                return Err(ParsingError::invalid_trees_block(
                    self.byte_parser,
                    String::from("Expected 'TREE' or 'END;' in TREES block."),
                ));
            }
            if !command.eq_ignore_ascii_case(TREE) {
                debug!("Ignoring command '{command}' in TREES block");
                if !self.byte_parser.consume_until(TERMINATOR, Inclusive) {
                    return Err(ParsingError::unexpected_eof(self.byte_parser));
                }
                continue;
            }

            // Optional default-tree marker "TREE * name = ..."
            self.byte_parser.skip_comment_and_whitespace()?;
            self.byte_parser.consume_if(b'*');

            let name = self.byte_parser.parse_label(b" =;\t\n\r")?;
            self.byte_parser.skip_comment_and_whitespace()?;
            if !self.byte_parser.consume_if(b'=') {
                return Err(ParsingError::invalid_trees_block(
                    self.byte_parser,
                    String::from("Expected '=' after tree name in tree command."),
                ));
            }

            // Skip optional "[&R/U]" (rooted or unrooted tree) by considering it a comment
            self.byte_parser.skip_comment_and_whitespace()?;

            let tree = newick_parser.parse_str_and_name(self.byte_parser, Some(name))?;
            debug!(
                "Parsed tree '{}' with {} internal nodes",
                tree.name().unwrap_or_default(),
                tree.num_internal()
            );
            trees.push(tree);
        }

        if trees.is_empty() {
            return Err(ParsingError::invalid_trees_block(
                self.byte_parser,
                String::from("TREES block contains no tree."),
            ));
        }
        Ok(trees)
    }

    /// Parses the optional `TRANSLATE key label[, key label]*;` command.
    /// Returns an empty list if the block starts with another command.
    fn parse_translate(&mut self) -> Result<Vec<(String, String)>, ParsingError> {
        self.byte_parser.skip_comment_and_whitespace()?;
        if !self.byte_parser.consume_if_sequence(TRANSLATE.as_bytes()) {
            return Ok(Vec::new());
        }

        let mut pairs = Vec::with_capacity(self.taxa.len());
        loop {
            let key = self.byte_parser.parse_label(NEXUS_LABEL_DELIMITERS)?;
            let label = self.byte_parser.parse_label(NEXUS_LABEL_DELIMITERS)?;
            if key.is_empty() || label.is_empty() {
                return Err(ParsingError::invalid_trees_block(
                    self.byte_parser,
                    String::from("Expected 'key label' pair in TRANSLATE."),
                ));
            }
            pairs.push((key, label));

            self.byte_parser.skip_comment_and_whitespace()?;
            if self.byte_parser.consume_if(b',') {
                continue;
            }
            if self.byte_parser.consume_if(TERMINATOR) {
                break;
            }
            let next_char = self.byte_parser.peek().map(char::from);
            return Err(ParsingError::invalid_trees_block(
                self.byte_parser,
                format!("Unexpected char {next_char:?} in TRANSLATE."),
            ));
        }

        debug!("TRANSLATE with {} entries", pairs.len());
        Ok(pairs)
    }
}
