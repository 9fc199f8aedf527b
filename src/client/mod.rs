//! Transport layer: the backend HTTP API and the streamed-body decoder.

mod api;
mod stream;

pub use api::{ApiError, ChatApi, SessionInfo};
pub use stream::{ChunkStream, HttpChunkStream, StreamChunk, StreamError};
