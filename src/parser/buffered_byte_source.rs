//! Buffered reader implementation of byte source for parser.
//!
//! This module provides [BufferedByteSource], which streams bytes from any
//! [Read] implementation through a [BufReader]. Use this for large files where
//! loading everything into memory would be impractical.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader, ErrorKind, Read};
use std::path::Path;

use crate::parser::byte_source::ByteSource;

// =#========================================================================#=
// BUFFERED BYTE SOURCE
// =#========================================================================$=
/// A buffered byte source for streaming input.
///
/// Keeps a small lookahead queue on top of the [BufReader], so that keyword
/// peeks spanning a buffer boundary never require seeking back.
pub struct BufferedByteSource<R: Read> {
    /// Underlying reader, handles getting chunks from the input
    reader: BufReader<R>,

    /// Bytes already pulled from the reader but not consumed yet
    lookahead: VecDeque<u8>,

    /// Current absolute position in the stream
    pos: usize,

    /// First read error; no further reads are attempted once set
    error: Option<io::Error>,
}

impl<R: Read> BufferedByteSource<R> {
    /// Default capacity for the lookahead queue.
    ///
    /// Sized to hold the longest peeked keyword (`CHARSTATELABELS`, 15 bytes).
    const LOOKAHEAD_CAPACITY: usize = 16;

    /// Creates a new buffered byte source on top of a reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            lookahead: VecDeque::with_capacity(Self::LOOKAHEAD_CAPACITY),
            pos: 0,
            error: None,
        }
    }

    /// Pulls bytes from the reader until the lookahead holds `k` bytes
    /// or the reader is exhausted. A read error is kept for [ByteSource::take_error]
    /// and ends the stream.
    fn fill_lookahead(&mut self, k: usize) {
        while self.lookahead.len() < k && self.error.is_none() {
            let buf = match self.reader.fill_buf() {
                Ok([]) => break,
                Ok(b) => b,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.error = Some(e);
                    break;
                }
            };
            let take = (k - self.lookahead.len()).min(buf.len());
            self.lookahead.extend(&buf[..take]);
            self.reader.consume(take);
        }
    }
}

impl BufferedByteSource<File> {
    /// Creates a new buffered byte source from a file path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened.
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        Ok(Self::new(File::open(path)?))
    }
}

impl<R: Read> ByteSource for BufferedByteSource<R> {
    fn peek(&mut self) -> Option<u8> {
        self.fill_lookahead(1);
        self.lookahead.front().copied()
    }

    fn next_byte(&mut self) -> Option<u8> {
        self.fill_lookahead(1);
        let byte = self.lookahead.pop_front()?;
        self.pos += 1;
        Some(byte)
    }

    fn peek_slice(&mut self, k: usize) -> &[u8] {
        self.fill_lookahead(k);
        let available = k.min(self.lookahead.len());
        &self.lookahead.make_contiguous()[..available]
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn is_eof(&mut self) -> bool {
        self.peek().is_none()
    }

    fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }
}
