//! streamtalk - terminal client for a streaming chat backend.
//!
//! The backend streams replies as unframed UTF-8 chunks tagged with in-band
//! sentinel markers. This crate decodes the stream, classifies each chunk
//! (final answer, thinking, trace), and renders it to the terminal in
//! arrival order while one submission is in flight at a time.

pub mod auth;
pub mod classify;
pub mod cli;
pub mod client;
pub mod config;
pub mod db;
pub mod notify;
pub mod session;
pub mod spinner;
pub mod view;

pub use classify::{Classified, Classify, SentinelClassifier};
pub use session::{SessionController, SessionState, SubmitOutcome, Transport};
