//! Chunk classification for the streamed reply.
//!
//! The backend streams an unframed sequence of UTF-8 text chunks and tags
//! their meaning with in-band sentinel markers: a final-answer marker, a
//! thinking tag pair, a trace prefix, and paired markers around embedded
//! blocks such as inline images. Classification is a pure function of the
//! chunk text; it is total and never fails. The sentinel table lives behind
//! the [`Classify`] trait so the scheme can later be swapped for structured
//! framing (JSON lines with a type field) without touching the session loop
//! or the render sink.

/// Sentinel markers recognized in the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    /// Marks final-answer content; text before its last occurrence is
    /// upstream concatenation noise and is discarded.
    pub final_answer: String,
    /// Opening tag of a thinking chunk.
    pub thinking_open: String,
    /// Closing tag of a thinking chunk.
    pub thinking_close: String,
    /// Prefix tagging diagnostic trace output.
    pub trace_prefix: String,
    /// Opening marker of an embedded block.
    pub embed_open: String,
    /// Closing marker of an embedded block.
    pub embed_close: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            final_answer: "💬".to_string(),
            thinking_open: "<thinking>".to_string(),
            thinking_close: "</thinking>".to_string(),
            trace_prefix: "trace: ".to_string(),
            embed_open: "<img-block>".to_string(),
            embed_close: "</img-block>".to_string(),
        }
    }
}

/// What kind of embedded block a chunk carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedKind {
    Image,
}

/// An embedded block extracted from a chunk.
///
/// The payload is pre-formatted markup and is rendered verbatim, in the
/// message stream, regardless of how the surrounding chunk was classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedElement {
    pub kind: EmbedKind,
    pub payload: String,
}

/// Primary classification of one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkKind {
    /// User-facing assistant content.
    FinalAnswer { text: String },
    /// Diagnostic output for the trace panel; the prefix is already stripped.
    Trace { text: String },
    /// Transient in-progress reasoning; the tags are already stripped.
    Thinking { text: String },
}

/// Result of classifying one chunk: exactly one primary kind, plus zero or
/// more embedded blocks lifted out of the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub kind: ChunkKind,
    pub embedded: Vec<EmbeddedElement>,
}

/// Classification seam between the transport and the render sink.
pub trait Classify {
    /// Classify one decoded chunk. Total: every input maps to a result.
    fn classify(&self, text: &str) -> Classified;
}

/// Sentinel-substring classifier matching the wire format of the chat
/// backend.
#[derive(Debug, Clone, Default)]
pub struct SentinelClassifier {
    markers: Markers,
}

impl SentinelClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_markers(markers: Markers) -> Self {
        Self { markers }
    }

    pub fn markers(&self) -> &Markers {
        &self.markers
    }

    /// Lift embedded blocks out of the text, returning the remainder.
    ///
    /// An opening marker without a matching close is left in place; the
    /// closing half may still be in flight in a later chunk and partial
    /// extraction would drop content.
    fn extract_embedded(&self, text: &str) -> (String, Vec<EmbeddedElement>) {
        let open = &self.markers.embed_open;
        let close = &self.markers.embed_close;

        let mut remainder = String::with_capacity(text.len());
        let mut embedded = Vec::new();
        let mut rest = text;

        while let Some(start) = rest.find(open.as_str()) {
            let after_open = start + open.len();
            match rest[after_open..].find(close.as_str()) {
                Some(inner_len) => {
                    let end = after_open + inner_len + close.len();
                    remainder.push_str(&rest[..start]);
                    embedded.push(EmbeddedElement {
                        kind: EmbedKind::Image,
                        payload: rest[start..end].to_string(),
                    });
                    rest = &rest[end..];
                }
                None => break,
            }
        }
        remainder.push_str(rest);

        (remainder, embedded)
    }

    /// Decide the primary kind of the (embed-stripped) chunk text.
    fn primary_kind(&self, text: &str) -> ChunkKind {
        let m = &self.markers;

        // Final-answer marker wins; with several logical messages coalesced
        // into one network chunk, only the text after the last marker is
        // meaningful. A chunk without the marker is classified whole.
        if let Some(idx) = text.rfind(m.final_answer.as_str()) {
            let content = text[idx + m.final_answer.len()..].trim_start();
            return ChunkKind::FinalAnswer {
                text: content.to_string(),
            };
        }

        if let Some(inner) = text
            .strip_prefix(m.thinking_open.as_str())
            .and_then(|t| t.strip_suffix(m.thinking_close.as_str()))
        {
            return ChunkKind::Thinking {
                text: inner.to_string(),
            };
        }

        if let Some(rest) = text.strip_prefix(m.trace_prefix.as_str()) {
            return ChunkKind::Trace {
                text: rest.to_string(),
            };
        }

        ChunkKind::FinalAnswer {
            text: text.to_string(),
        }
    }
}

impl Classify for SentinelClassifier {
    fn classify(&self, text: &str) -> Classified {
        let (remainder, embedded) = self.extract_embedded(text);
        // Lifting a block out leaves its surrounding whitespace behind.
        let primary = if embedded.is_empty() {
            remainder.as_str()
        } else {
            remainder.trim()
        };
        let kind = self.primary_kind(primary);
        Classified { kind, embedded }
    }
}
