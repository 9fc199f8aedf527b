//! Conversation model and terminal rendering.

mod conversation;
mod renderer;
mod sink;

pub use conversation::{ConversationView, MessageNode, Role};
pub use renderer::{RenderStyle, TerminalRenderer};
pub use sink::{RenderSink, TerminalSink};
