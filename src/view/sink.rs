//! Render sink: where classified chunks become visible output.

use crate::classify::{ChunkKind, Classified};

use super::conversation::ConversationView;
use super::renderer::TerminalRenderer;

/// Output seam for the session controller.
///
/// The controller never touches the terminal directly; it hands classified
/// chunks to a sink. Tests substitute a recording sink for the terminal one.
pub trait RenderSink {
    /// Show the user's own message.
    fn user_message(&mut self, text: &str);

    /// Show a client-side status or error line.
    fn system_message(&mut self, text: &str);

    /// Show one classified reply chunk.
    fn render(&mut self, classified: &Classified);

    fn view(&self) -> &ConversationView;
}

/// Sink that renders to the terminal.
///
/// Trace chunks go to a buffered side panel that stays hidden until the
/// first trace arrives; after that a one-line notice points at the toggle.
/// Thinking chunks are transient and are erased in place when replaced or
/// resolved.
pub struct TerminalSink {
    view: ConversationView,
    renderer: TerminalRenderer,
    trace_entries: Vec<String>,
    trace_revealed: bool,
    trace_visible: bool,
    thinking_lines: u16,
}

impl TerminalSink {
    pub fn new(renderer: TerminalRenderer) -> Self {
        Self {
            view: ConversationView::new(),
            renderer,
            trace_entries: Vec::new(),
            trace_revealed: false,
            trace_visible: false,
            thinking_lines: 0,
        }
    }

    /// Toggle trace visibility. Turning it on replays the buffered entries.
    pub fn toggle_trace(&mut self) {
        self.trace_visible = !self.trace_visible;
        if self.trace_visible {
            if self.trace_entries.is_empty() {
                let _ = self.renderer.render_trace("(no trace output yet)");
                return;
            }
            for entry in &self.trace_entries {
                let _ = self.renderer.render_trace(entry);
            }
        } else {
            self.system_inline("Trace output hidden.");
        }
    }

    pub fn trace_visible(&self) -> bool {
        self.trace_visible
    }

    /// Drop the conversation and trace state, e.g. after erasing memory.
    pub fn clear(&mut self) {
        self.view.clear();
        self.trace_entries.clear();
        self.trace_revealed = false;
        self.trace_visible = false;
        self.thinking_lines = 0;
    }

    fn clear_live_thinking(&mut self) {
        if self.view.resolve_thinking().is_some() {
            if let Err(e) = self.renderer.clear_thinking(self.thinking_lines) {
                tracing::warn!("failed to clear thinking output: {}", e);
            }
            self.thinking_lines = 0;
        }
    }

    fn system_inline(&self, text: &str) {
        if let Err(e) = self.renderer.system_line(text) {
            tracing::warn!("failed to render system message: {}", e);
        }
    }
}

impl RenderSink for TerminalSink {
    fn user_message(&mut self, text: &str) {
        let node = self.view.push_user(text).clone();
        if let Err(e) = self.renderer.render(&node) {
            tracing::warn!("failed to render user message: {}", e);
        }
    }

    fn system_message(&mut self, text: &str) {
        let node = self.view.push_system(text).clone();
        if let Err(e) = self.renderer.render(&node) {
            tracing::warn!("failed to render system message: {}", e);
        }
    }

    fn render(&mut self, classified: &Classified) {
        match &classified.kind {
            ChunkKind::Thinking { text } => {
                self.clear_live_thinking();
                self.view.push_thinking(text);
                match self.renderer.render_thinking(text) {
                    Ok(lines) => self.thinking_lines = lines,
                    Err(e) => tracing::warn!("failed to render thinking output: {}", e),
                }
            }
            ChunkKind::FinalAnswer { text } => {
                self.clear_live_thinking();
                if !text.is_empty() {
                    let node = self.view.push_assistant(text).clone();
                    if let Err(e) = self.renderer.render(&node) {
                        tracing::warn!("failed to render assistant message: {}", e);
                    }
                }
            }
            ChunkKind::Trace { text } => {
                self.clear_live_thinking();
                self.trace_entries.push(text.clone());
                if self.trace_visible {
                    let _ = self.renderer.render_trace(text);
                } else if !self.trace_revealed {
                    self.trace_revealed = true;
                    self.system_inline("Trace output available. Type /trace to show it.");
                }
            }
        }

        for element in &classified.embedded {
            let node = self.view.push_embedded(&element.payload).clone();
            if let Err(e) = self.renderer.render(&node) {
                tracing::warn!("failed to render embedded block: {}", e);
            }
        }
    }

    fn view(&self) -> &ConversationView {
        &self.view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{Classify, SentinelClassifier};

    fn sink() -> TerminalSink {
        TerminalSink::new(TerminalRenderer::new("Spot"))
    }

    fn render(sink: &mut TerminalSink, text: &str) {
        let classified = SentinelClassifier::new().classify(text);
        sink.render(&classified);
    }

    #[test]
    fn test_first_trace_reveals_panel_once() {
        let mut sink = sink();
        assert!(!sink.trace_revealed);

        render(&mut sink, "trace: step 1");
        assert!(sink.trace_revealed);
        assert_eq!(sink.trace_entries, vec!["step 1"]);

        // Later traces only accumulate; the reveal happened.
        render(&mut sink, "trace: step 2");
        assert!(sink.trace_revealed);
        assert_eq!(sink.trace_entries, vec!["step 1", "step 2"]);
        assert!(!sink.trace_visible);
    }

    #[test]
    fn test_toggle_trace_shows_and_hides_buffer() {
        let mut sink = sink();
        render(&mut sink, "trace: step 1");

        sink.toggle_trace();
        assert!(sink.trace_visible());

        // Traces arriving while visible stay in the buffer too.
        render(&mut sink, "trace: step 2");
        assert_eq!(sink.trace_entries, vec!["step 1", "step 2"]);

        sink.toggle_trace();
        assert!(!sink.trace_visible());
    }

    #[test]
    fn test_non_thinking_chunk_resolves_live_thinking() {
        let mut sink = sink();
        render(&mut sink, "<thinking>pondering</thinking>");
        assert!(sink.view().live_thinking().is_some());

        render(&mut sink, "💬the answer");
        assert!(sink.view().live_thinking().is_none());
        assert_eq!(sink.thinking_lines, 0);
    }

    #[test]
    fn test_clear_resets_trace_state() {
        let mut sink = sink();
        render(&mut sink, "trace: step 1");
        sink.toggle_trace();

        sink.clear();
        assert!(sink.trace_entries.is_empty());
        assert!(!sink.trace_revealed);
        assert!(!sink.trace_visible);
        assert!(sink.view().nodes().is_empty());
    }
}
