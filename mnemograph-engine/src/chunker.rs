//! Content chunking with overlap-aware boundaries
//!
//! Content whose token count exceeds a kind's budget is split into ordered
//! pieces; each piece after the first repeats the tail of its predecessor
//! so local context survives the boundary.

use crate::error::{EngineError, Result};

/// Token counting collaborator
///
/// Contract: deterministic and stable across runs for the same tokenizer
/// version, and monotonic in content length. The engine never assumes a
/// particular granularity beyond that.
pub trait Tokenizer: Send + Sync {
    /// Split content into token slices, in order
    fn tokenize<'a>(&self, content: &'a str) -> Vec<&'a str>;

    /// Count tokens without keeping them
    fn count(&self, content: &str) -> usize {
        self.tokenize(content).len()
    }
}

/// Default tokenizer: Unicode-whitespace word split
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn tokenize<'a>(&self, content: &'a str) -> Vec<&'a str> {
        content.split_whitespace().collect()
    }
}

/// Splits oversized content into overlap-aware chunks
pub struct ChunkSplitter {
    tokenizer: Box<dyn Tokenizer>,
}

impl Default for ChunkSplitter {
    fn default() -> Self {
        Self::new(WhitespaceTokenizer)
    }
}

impl ChunkSplitter {
    /// Create a splitter over the given tokenizer
    pub fn new(tokenizer: impl Tokenizer + 'static) -> Self {
        Self {
            tokenizer: Box::new(tokenizer),
        }
    }

    /// Count tokens in content
    pub fn count_tokens(&self, content: &str) -> usize {
        self.tokenizer.count(content)
    }

    /// Split content into ordered chunk contents
    ///
    /// Content of at most `max_tokens` tokens comes back as a single piece
    /// equal to the original content; chunking activates only above the
    /// threshold. Each subsequent chunk starts with the previous chunk's
    /// last `overlap_tokens` tokens; the final chunk may be shorter.
    pub fn split(
        &self,
        content: &str,
        max_tokens: usize,
        overlap_tokens: usize,
    ) -> Result<Vec<String>> {
        if max_tokens == 0 || overlap_tokens >= max_tokens {
            return Err(EngineError::InvalidChunkConfig {
                max_tokens,
                overlap_tokens,
            });
        }

        let tokens = self.tokenizer.tokenize(content);
        if tokens.len() <= max_tokens {
            return Ok(vec![content.to_string()]);
        }

        let stride = max_tokens - overlap_tokens;
        let mut pieces = Vec::with_capacity(tokens.len() / stride + 1);
        let mut start = 0;
        loop {
            let end = (start + max_tokens).min(tokens.len());
            pieces.push(tokens[start..end].join(" "));
            if end == tokens.len() {
                break;
            }
            start += stride;
        }
        Ok(pieces)
    }
}
