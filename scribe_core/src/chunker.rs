//! Overlapping fixed-window chunking over a token sequence.
//!
//! Windows start at 0 and advance by `window - overlap`, so consecutive
//! chunks share `overlap` tokens. The last chunk is whatever remains; no
//! padding is added. Chunking only computes ranges and never touches the
//! token data, so the same sequence can be re-chunked with other parameters.

use std::iter::FusedIterator;
use std::ops::Range;

use anyhow::Context;

use crate::error::{Error, Result};
use crate::{Token, Tokenizer};

/// Validated window/overlap pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    window: usize,
    overlap: usize,
}

impl ChunkParams {
    /// Requires `window > overlap`.
    pub fn new(window: usize, overlap: usize) -> Result<Self> {
        if window <= overlap {
            return Err(Error::Configuration(format!(
                "chunk window ({window} tokens) must be larger than the overlap ({overlap} tokens)"
            )));
        }
        Ok(Self { window, overlap })
    }

    #[must_use]
    pub const fn window(&self) -> usize {
        self.window
    }

    #[must_use]
    pub const fn overlap(&self) -> usize {
        self.overlap
    }

    /// Distance between consecutive chunk starts.
    #[must_use]
    pub const fn stride(&self) -> usize {
        self.window - self.overlap
    }
}

/// A contiguous range of a token sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub start: usize,
    pub len: usize,
}

impl Chunk {
    #[must_use]
    pub const fn end(&self) -> usize {
        self.start + self.len
    }

    #[must_use]
    pub const fn range(&self) -> Range<usize> {
        self.start..self.end()
    }
}

/// Lazy iterator over the chunks of a sequence of `len` tokens.
///
/// Cloning restarts from the clone's current position.
#[derive(Debug, Clone)]
pub struct Chunks {
    len: usize,
    params: ChunkParams,
    next_start: usize,
    next_index: usize,
}

impl Iterator for Chunks {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.next_start >= self.len {
            return None;
        }
        let chunk = Chunk {
            index: self.next_index,
            start: self.next_start,
            len: self.params.window.min(self.len - self.next_start),
        };
        self.next_start += self.params.stride();
        self.next_index += 1;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.next_start >= self.len {
            0
        } else {
            (self.len - self.next_start).div_ceil(self.params.stride())
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Chunks {}

impl FusedIterator for Chunks {}

/// Chunk ranges for a sequence of `len` tokens. Empty input yields nothing.
#[must_use]
pub const fn chunk(len: usize, params: ChunkParams) -> Chunks {
    Chunks {
        len,
        params,
        next_start: 0,
        next_index: 0,
    }
}

/// Pair each chunk with its slice of `tokens`.
pub fn chunk_tokens(
    tokens: &[Token],
    params: ChunkParams,
) -> impl ExactSizeIterator<Item = (Chunk, &[Token])> + Clone {
    chunk(tokens.len(), params).map(move |c| (c, &tokens[c.range()]))
}

/// Decoded text of a token sequence plus the byte offset of every token.
///
/// A token boundary can fall inside a multi-byte character. [`TokenText::body`]
/// snaps both chunk edges back to the start of that character, so a split
/// character goes whole to the chunk in which it ends and consecutive bodies
/// still join without gaps.
#[derive(Debug, Clone)]
pub struct TokenText {
    text: String,
    offsets: Vec<usize>,
}

impl TokenText {
    /// # Errors
    /// Fails if a token is unknown or the whole sequence is not UTF-8.
    pub fn decode<T: Tokenizer + ?Sized>(tokenizer: &T, tokens: &[Token]) -> anyhow::Result<Self> {
        let mut bytes = Vec::new();
        let mut offsets = Vec::with_capacity(tokens.len() + 1);
        for token in tokens {
            offsets.push(bytes.len());
            bytes.extend(tokenizer.decode_bytes(std::slice::from_ref(token))?);
        }
        offsets.push(bytes.len());
        let text = String::from_utf8(bytes).context("token sequence does not decode to UTF-8")?;
        Ok(Self { text, offsets })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Text of `chunk`, aligned to character boundaries.
    #[must_use]
    pub fn body(&self, chunk: &Chunk) -> &str {
        let start = self.char_start(self.offsets[chunk.start]);
        let end = self.char_start(self.offsets[chunk.end()]);
        &self.text[start..end]
    }

    fn char_start(&self, mut index: usize) -> usize {
        while !self.text.is_char_boundary(index) {
            index -= 1;
        }
        index
    }
}
