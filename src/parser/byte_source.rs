//! Byte source abstractions for parser.
//!
//! This module provides the [ByteSource] trait, implemented by
//! [InMemoryByteSource](crate::parser::in_memory_byte_source::InMemoryByteSource)
//! and [BufferedByteSource](crate::parser::buffered_byte_source::BufferedByteSource).

// =#========================================================================#=
// BYTE SOURCE (Trait)
// =#========================================================================T=
/// Trait defining the interface for different byte sources used by
/// [ByteParser](crate::parser::ByteParser).
///
/// Sources are forward-only: the metadata and tree parsers read a Nexus file
/// in a single pass, so no seeking is required.
pub trait ByteSource {
    /// Peek at the current byte without consuming it.
    ///
    /// # Returns
    /// * `Some(u8)` - The current byte if available
    /// * `None` - If at end of data (EOF)
    fn peek(&mut self) -> Option<u8>;

    /// Get the current byte and advance the position (consume it).
    ///
    /// # Returns
    /// * `Some(u8)` - The current byte if available
    /// * `None` - If at end of data (EOF)
    fn next_byte(&mut self) -> Option<u8>;

    /// Returns a slice of up to `k` bytes from the current position
    /// without consuming them.
    fn peek_slice(&mut self, k: usize) -> &[u8];

    /// Returns the current byte offset in the stream.
    fn position(&self) -> usize;

    /// Check if at end of data.
    fn is_eof(&mut self) -> bool;

    /// Takes the first read error, after which the source reports EOF.
    fn take_error(&mut self) -> Option<std::io::Error> {
        None
    }
}
