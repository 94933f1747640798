//! Low-level byte-by-byte parser for ASCII text.
//!
//! This module provides [ByteParser] for text-based file formats with support
//! for peeking, consuming, pattern matching, quote-aware label parsing and
//! line tracking. Used as the foundation for both the Nexus and Newick parsers.

use crate::parser::buffered_byte_source::BufferedByteSource;
use crate::parser::byte_parser::ConsumeMode::Inclusive;
use crate::parser::byte_source::ByteSource;
use crate::parser::in_memory_byte_source::InMemoryByteSource;
use crate::parser::parsing_error::ParsingError;
use std::fs::File;
use std::path::Path;

/// Whitespace bytes: space, tab, newline, carriage return.
const WHITESPACE: &[u8] = b" \t\n\r";

// =#========================================================================#=
// BYTE PARSER
// =#========================================================================#=
/// A byte-by-byte parser for ASCII text with support for peeking, consuming,
/// and pattern matching.
///
/// [ByteParser] operates on a [ByteSource] and assumes ASCII encoding. Keyword
/// matching is case-insensitive, as Nexus keywords are. Newlines are counted
/// while consuming, so errors can report a line number.
///
/// # Example
/// ```
/// use nexnet::parser::ByteParser;
///
/// let mut parser = ByteParser::for_str("BEGIN CHARACTERS;\n  DIMENSIONS NCHAR=1;");
/// assert!(parser.consume_if_sequence(b"begin"));
/// parser.skip_whitespace();
/// assert_eq!(parser.parse_word().unwrap(), "CHARACTERS");
/// ```
pub struct ByteParser<S: ByteSource> {
    source: S,
    /// 1-based line of the current position
    line: usize,
}

impl ByteParser<InMemoryByteSource> {
    /// Creates a new [ByteParser] from a string by copying it.
    pub fn for_str(input: &str) -> Self {
        Self::for_bytes(input.as_bytes())
    }

    /// Creates a new [ByteParser] from a byte slice by copying it.
    pub fn for_bytes(input: &[u8]) -> Self {
        Self::new(InMemoryByteSource::from_vec(input.to_vec()))
    }

    /// Creates a new [ByteParser] reading the whole file into memory.
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be read.
    pub fn from_file_in_memory<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        Ok(Self::new(InMemoryByteSource::from_file(path)?))
    }
}

impl ByteParser<BufferedByteSource<File>> {
    /// Creates a new [ByteParser] streaming the file through a buffer.
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be opened.
    pub fn from_file_buffered<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        Ok(Self::new(BufferedByteSource::from_file(path)?))
    }
}

impl<S: ByteSource> ByteParser<S> {
    /// Creates a new [ByteParser] from a byte source.
    pub fn new(source: S) -> Self {
        Self { source, line: 1 }
    }

    /// Takes the read error that ended the underlying source early, if any.
    pub fn take_io_error(&mut self) -> Option<std::io::Error> {
        self.source.take_error()
    }

    /// Peeks at the current byte without consuming it.
    #[inline(always)]
    pub fn peek(&mut self) -> Option<u8> {
        self.source.peek()
    }

    /// Gets the current byte and advances the position (consumes it).
    #[inline]
    pub fn next_byte(&mut self) -> Option<u8> {
        let byte = self.source.next_byte();
        if byte == Some(b'\n') {
            self.line += 1;
        }
        byte
    }

    /// Skips (consumes) all consecutive whitespace characters.
    ///
    /// Whitespace includes: space, tab, newline and carriage return.
    pub fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            if WHITESPACE.contains(&b) {
                self.next_byte();
            } else {
                break;
            }
        }
    }

    /// Skips spaces and tabs but stops at line breaks.
    pub fn skip_inline_whitespace(&mut self) {
        while let Some(b' ' | b'\t') = self.peek() {
            self.next_byte();
        }
    }

    /// Skips (consumes) a Nexus-style comment `[...]` if present.
    ///
    /// # Returns
    /// * `Ok(true)` - A comment was found and consumed
    /// * `Ok(false)` - No comment at current position
    /// * `Err(ParsingError)` - Comment was opened but never closed
    pub fn skip_comment(&mut self) -> Result<bool, ParsingError> {
        if self.consume_if(b'[') {
            if !self.consume_until(b']', Inclusive) {
                return Err(ParsingError::unclosed_comment(self));
            }
            return Ok(true);
        }

        Ok(false)
    }

    /// Skips (consumes) all consecutive whitespace and Nexus comments.
    ///
    /// # Errors
    /// Returns an error if an unclosed comment is encountered.
    pub fn skip_comment_and_whitespace(&mut self) -> Result<(), ParsingError> {
        self.skip_whitespace();

        while self.skip_comment()? {
            self.skip_whitespace();
        }

        Ok(())
    }

    /// Checks if the current byte matches `ch` (case-insensitive for ASCII).
    pub fn peek_is(&mut self, ch: u8) -> bool {
        matches!(self.peek(), Some(b) if b.eq_ignore_ascii_case(&ch))
    }

    /// Checks if the following bytes match `sequence` (case-insensitive).
    ///
    /// This is a peek operation; the position is not changed.
    #[inline]
    pub fn peek_is_sequence(&mut self, sequence: &[u8]) -> bool {
        let context = self.source.peek_slice(sequence.len());
        context.len() == sequence.len() && context.eq_ignore_ascii_case(sequence)
    }

    /// Consumes the current byte if it matches `ch` (case-insensitive).
    ///
    /// # Returns
    /// `true` if the byte was matched and consumed, `false` otherwise
    pub fn consume_if(&mut self, ch: u8) -> bool {
        if self.peek_is(ch) {
            self.next_byte();
            true
        } else {
            false
        }
    }

    /// Consumes the following bytes if they match `sequence` (case-insensitive).
    ///
    /// # Returns
    /// `true` if the sequence was matched and consumed, `false` otherwise
    pub fn consume_if_sequence(&mut self, sequence: &[u8]) -> bool {
        if !self.peek_is_sequence(sequence) {
            return false;
        }

        for _ in 0..sequence.len() {
            self.next_byte();
        }

        true
    }

    /// Consumes bytes until the target byte is found.
    ///
    /// # Arguments
    /// * `target` - The byte to search for
    /// * `mode` - Whether to consume the target byte (`Inclusive`) or stop before it (`Exclusive`)
    ///
    /// # Returns
    /// `true` if the target was found, `false` if EOF was reached first
    pub fn consume_until(&mut self, target: u8, mode: ConsumeMode) -> bool {
        while let Some(b) = self.peek() {
            if b == target {
                if mode == Inclusive {
                    self.next_byte();
                }
                return true;
            }
            self.next_byte();
        }
        false
    }

    /// Consumes bytes until the following bytes match `sequence` (case-insensitive).
    ///
    /// # Returns
    /// `true` if the sequence was found, `false` if EOF was reached first
    pub fn consume_until_sequence(&mut self, sequence: &[u8], mode: ConsumeMode) -> bool {
        loop {
            if self.is_eof() {
                return false;
            }

            if self.peek_is_sequence(sequence) {
                if mode == Inclusive {
                    for _ in 0..sequence.len() {
                        self.next_byte();
                    }
                }
                return true;
            }

            self.next_byte();
        }
    }

    /// Returns whether the end of data (EOF) has been reached.
    pub fn is_eof(&mut self) -> bool {
        self.source.is_eof()
    }

    /// Returns the current byte offset in the input.
    pub fn position(&self) -> usize {
        self.source.position()
    }

    /// Returns the 1-based line number of the current position.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Returns a string from up to `k` bytes from the current position for
    /// error context. Invalid UTF-8 is replaced with the replacement character.
    pub fn get_context_as_string(&mut self, k: usize) -> String {
        String::from_utf8_lossy(self.source.peek_slice(k)).into_owned()
    }

    /// Parses a word, i.e. an unquoted token up to whitespace, `=` or `;`,
    /// after skipping leading whitespace and comments.
    pub fn parse_word(&mut self) -> Result<String, ParsingError> {
        self.skip_comment_and_whitespace()?;
        self.parse_unquoted_label(b" \t\n\r=;[")
    }

    /// Parses a label (quoted or unquoted) with the given delimiter set.
    ///
    /// Skips leading whitespace and comments, detects whether the label is
    /// single-quoted and dispatches accordingly.
    ///
    /// # Errors
    /// Returns an error if a comment or quoted label is not properly closed
    pub fn parse_label(&mut self, delimiters: &[u8]) -> Result<String, ParsingError> {
        self.skip_comment_and_whitespace()?;

        if self.peek() == Some(b'\'') {
            self.parse_quoted_label(b'\'')
        } else {
            self.parse_unquoted_label(delimiters)
        }
    }

    /// Parses a label enclosed in `quote`, where a doubled quote inside the
    /// label stands for one literal quote (e.g. `'Wilson''s'` becomes `Wilson's`).
    ///
    /// Assumes the parser is positioned at the opening quote.
    ///
    /// # Errors
    /// Returns [ParsingError] with `UnexpectedEOF` if the label is never closed,
    /// or `InvalidFormatting` if it is not valid UTF-8
    pub fn parse_quoted_label(&mut self, quote: u8) -> Result<String, ParsingError> {
        self.next_byte(); // consume opening quote

        let mut label = Vec::new();
        loop {
            match self.next_byte() {
                Some(b) if b == quote => {
                    if self.peek() == Some(quote) {
                        label.push(quote);
                        self.next_byte();
                    } else {
                        return self.decode_label(label);
                    }
                }
                Some(b) => label.push(b),
                None => return Err(ParsingError::unexpected_eof(self)),
            }
        }
    }

    /// Parses an unquoted label until any of the given delimiters (or EOF)
    /// is encountered. The delimiter itself is not consumed.
    ///
    /// # Errors
    /// Returns [ParsingError] with `InvalidFormatting` if the label is not valid UTF-8
    pub fn parse_unquoted_label(&mut self, delimiters: &[u8]) -> Result<String, ParsingError> {
        let mut label = Vec::new();

        while let Some(b) = self.peek() {
            if delimiters.contains(&b) {
                break;
            }
            label.push(b);
            self.next_byte();
        }

        self.decode_label(label)
    }

    /// Consumes one UTF-8 encoded character.
    ///
    /// # Errors
    /// Returns [ParsingError] with `InvalidFormatting` if the bytes at the
    /// current position are not valid UTF-8
    pub fn next_char(&mut self) -> Result<Option<char>, ParsingError> {
        let Some(first) = self.next_byte() else {
            return Ok(None);
        };
        if first.is_ascii() {
            return Ok(Some(char::from(first)));
        }

        let width = match first {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        let mut bytes = vec![first];
        while bytes.len() < width {
            match self.peek() {
                Some(b) if b & 0xC0 == 0x80 => {
                    bytes.push(b);
                    self.next_byte();
                }
                _ => break,
            }
        }
        let decoded = std::str::from_utf8(&bytes).ok().and_then(|s| s.chars().next());
        match decoded {
            Some(c) => Ok(Some(c)),
            None => Err(ParsingError::invalid_formatting(
                self,
                String::from("Invalid UTF-8 sequence."),
            )),
        }
    }

    /// Parses a non-negative integer token (whitespace and comments skipped before).
    ///
    /// # Returns
    /// * `Ok(Some(n))` - A number was read
    /// * `Ok(None)` - The next token is not a number; nothing was consumed
    ///
    /// # Errors
    /// Returns [ParsingError] with `InvalidFormatting` if the number does not
    /// fit into `usize`
    pub fn parse_usize(&mut self) -> Result<Option<usize>, ParsingError> {
        self.skip_comment_and_whitespace()?;
        let mut value: Option<usize> = None;
        while let Some(b) = self.peek() {
            if !b.is_ascii_digit() {
                break;
            }
            let digit = usize::from(b - b'0');
            let next = value
                .unwrap_or(0)
                .checked_mul(10)
                .and_then(|v| v.checked_add(digit));
            let Some(next) = next else {
                return Err(ParsingError::invalid_formatting(
                    self,
                    String::from("Number too large."),
                ));
            };
            value = Some(next);
            self.next_byte();
        }
        Ok(value)
    }
}

// ============================================================================
// Helpers (private)
// ============================================================================
impl<S: ByteSource> ByteParser<S> {
    fn decode_label(&mut self, bytes: Vec<u8>) -> Result<String, ParsingError> {
        String::from_utf8(bytes).map_err(|_| {
            ParsingError::invalid_formatting(self, String::from("Label is not valid UTF-8."))
        })
    }
}

/// Specifies whether to consume or leave the target when using `consume_until` methods.
///
/// # Examples
/// ```
/// use nexnet::parser::byte_parser::{ByteParser, ConsumeMode};
///
/// let mut parser = ByteParser::for_str("TREE t1=((A:0.5,B:0.5):0.3,C:0.8);");
///
/// // Inclusive: consume up to and including '=', e.g. to start of Newick string
/// parser.consume_until(b'=', ConsumeMode::Inclusive);
/// assert_eq!(parser.peek(), Some(b'('));
///
/// let mut parser = ByteParser::for_str("MATRIX t1 01;");
///
/// // Exclusive: stop right before the statement terminator
/// parser.consume_until(b';', ConsumeMode::Exclusive);
/// assert_eq!(parser.peek(), Some(b';'));
/// ```
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ConsumeMode {
    /// Consume the target byte/sequence along with everything before it.
    Inclusive,

    /// Stop before the target byte/sequence without consuming it.
    Exclusive,
}
