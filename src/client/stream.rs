//! Incremental decoding of the streamed response body.
//!
//! The backend writes UTF-8 text to the response body without framing, so a
//! network read can end mid-codepoint. The decoder carries undecodable tail
//! bytes over to the next read; only invalid sequences (not incomplete ones)
//! are replaced with U+FFFD.

use futures::{Stream, StreamExt};
use std::pin::Pin;

/// Transport failure while pulling chunks.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("transport error: {0}")]
    Transport(String),
}

/// One decoded text chunk, numbered in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChunk {
    pub text: String,
    pub seq: u64,
}

/// Decodes a stream of byte buffers into UTF-8 text chunks.
///
/// Generic over the byte source so tests can drive it from a vector of
/// buffers instead of a live connection.
pub struct ChunkStream<S> {
    inner: S,
    carry: Vec<u8>,
    seq: u64,
    done: bool,
}

/// The byte stream produced by an HTTP response body.
pub type HttpChunkStream =
    ChunkStream<Pin<Box<dyn Stream<Item = Result<Vec<u8>, StreamError>> + Send>>>;

impl<S> ChunkStream<S>
where
    S: Stream<Item = Result<Vec<u8>, StreamError>> + Unpin,
{
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            carry: Vec::new(),
            seq: 0,
            done: false,
        }
    }

    /// Pull the next decoded chunk, or `None` at end of stream.
    ///
    /// Empty network reads and reads that only extend an incomplete
    /// codepoint do not produce a chunk; the loop keeps pulling until it
    /// has decodable text or the stream ends.
    pub async fn next_chunk(&mut self) -> Option<Result<StreamChunk, StreamError>> {
        if self.done {
            return None;
        }

        loop {
            match self.inner.next().await {
                Some(Ok(bytes)) => {
                    self.carry.extend_from_slice(&bytes);
                    if let Some(text) = self.take_decodable() {
                        return Some(Ok(self.emit(text)));
                    }
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    // An invalid tail at end of stream has no more bytes
                    // coming to complete it.
                    if self.carry.is_empty() {
                        return None;
                    }
                    let text = String::from_utf8_lossy(&self.carry).into_owned();
                    self.carry.clear();
                    return Some(Ok(self.emit(text)));
                }
            }
        }
    }

    fn emit(&mut self, text: String) -> StreamChunk {
        let chunk = StreamChunk {
            text,
            seq: self.seq,
        };
        self.seq += 1;
        chunk
    }

    /// Split the carry buffer at the longest decodable prefix.
    ///
    /// Returns `None` when the buffer holds only the start of a codepoint;
    /// its completion may arrive in the next read. A sequence `from_utf8`
    /// reports as definitely invalid is replaced with U+FFFD instead of
    /// being carried forever.
    fn take_decodable(&mut self) -> Option<String> {
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.carry) {
                Ok(s) => {
                    out.push_str(s);
                    self.carry.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(std::str::from_utf8(&self.carry[..valid]).unwrap_or_default());
                    match e.error_len() {
                        Some(bad) => {
                            out.push('\u{FFFD}');
                            self.carry.drain(..valid + bad);
                        }
                        None => {
                            // Incomplete tail; keep it for the next read.
                            self.carry.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }
        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }
}
