//! Terminal renderer for conversation nodes.

use super::conversation::{MessageNode, Role};
use crossterm::{
    cursor::MoveToPreviousLine,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
    terminal::{Clear, ClearType},
    ExecutableCommand,
};
use std::io::{stdout, Write};

/// Render style configuration.
#[derive(Debug, Clone)]
pub struct RenderStyle {
    pub user_color: Color,
    pub assistant_color: Color,
    pub system_color: Color,
    pub trace_color: Color,
    pub embedded_color: Color,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            user_color: Color::Green,
            assistant_color: Color::White,
            system_color: Color::Yellow,
            trace_color: Color::DarkGrey,
            embedded_color: Color::Cyan,
        }
    }
}

/// Writes conversation nodes to the terminal.
///
/// Thinking nodes are the only transient output: [`render_thinking`]
/// reports how many terminal lines it wrote so [`clear_thinking`] can move
/// back up and erase exactly that region before the replacement is drawn.
///
/// [`render_thinking`]: TerminalRenderer::render_thinking
/// [`clear_thinking`]: TerminalRenderer::clear_thinking
pub struct TerminalRenderer {
    style: RenderStyle,
    assistant_name: String,
}

impl TerminalRenderer {
    pub fn new(assistant_name: impl Into<String>) -> Self {
        Self {
            style: RenderStyle::default(),
            assistant_name: assistant_name.into(),
        }
    }

    pub fn with_style(assistant_name: impl Into<String>, style: RenderStyle) -> Self {
        Self {
            style,
            assistant_name: assistant_name.into(),
        }
    }

    /// Render one node. Not used for thinking nodes, which go through
    /// [`render_thinking`](TerminalRenderer::render_thinking).
    pub fn render(&self, node: &MessageNode) -> std::io::Result<()> {
        match node.role {
            Role::User => self.render_labeled(self.style.user_color, "You", &node.text),
            Role::Assistant => {
                self.render_labeled(self.style.assistant_color, &self.assistant_name, &node.text)
            }
            Role::System => self.render_system(&node.text),
            Role::Embedded => self.render_embedded(&node.text),
            Role::Thinking => self.render_thinking(&node.text).map(|_| ()),
        }
    }

    fn render_labeled(&self, color: Color, label: &str, text: &str) -> std::io::Result<()> {
        stdout()
            .execute(SetForegroundColor(color))?
            .execute(SetAttribute(Attribute::Bold))?
            .execute(Print(label))?
            .execute(Print(": "))?
            .execute(SetAttribute(Attribute::Reset))?
            .execute(ResetColor)?
            .execute(Print(text))?
            .execute(Print("\n"))?;
        Ok(())
    }

    /// Print a status line outside the conversation model.
    pub fn system_line(&self, text: &str) -> std::io::Result<()> {
        self.render_system(text)
    }

    fn render_system(&self, text: &str) -> std::io::Result<()> {
        stdout()
            .execute(SetForegroundColor(self.style.system_color))?
            .execute(Print(text))?
            .execute(Print("\n"))?
            .execute(ResetColor)?;
        Ok(())
    }

    /// Embedded blocks are pre-formatted markup; print the payload verbatim
    /// so the user can open the referenced resource themselves.
    fn render_embedded(&self, payload: &str) -> std::io::Result<()> {
        stdout()
            .execute(SetForegroundColor(self.style.embedded_color))?
            .execute(Print(payload))?
            .execute(Print("\n"))?
            .execute(ResetColor)?;
        Ok(())
    }

    /// Render a trace entry into the trace panel area.
    pub fn render_trace(&self, text: &str) -> std::io::Result<()> {
        stdout()
            .execute(SetForegroundColor(self.style.trace_color))?
            .execute(Print("  · "))?
            .execute(Print(text))?
            .execute(Print("\n"))?
            .execute(ResetColor)?;
        Ok(())
    }

    /// Render a thinking update dimmed. Returns the number of terminal
    /// rows written so the caller can clear them later.
    pub fn render_thinking(&self, text: &str) -> std::io::Result<u16> {
        stdout()
            .execute(SetAttribute(Attribute::Dim))?
            .execute(Print(text))?
            .execute(Print("\n"))?
            .execute(SetAttribute(Attribute::Reset))?;
        stdout().flush()?;

        let cols = crossterm::terminal::size().map(|(cols, _)| cols).unwrap_or(0);
        Ok(rendered_rows(text, cols))
    }

    /// Erase the previously rendered thinking block of `lines` lines.
    pub fn clear_thinking(&self, lines: u16) -> std::io::Result<()> {
        if lines == 0 {
            return Ok(());
        }
        let mut out = stdout();
        out.execute(MoveToPreviousLine(lines))?
            .execute(Clear(ClearType::FromCursorDown))?;
        out.flush()?;
        Ok(())
    }
}

/// Terminal rows occupied by `text`, accounting for wrapping at `cols`.
/// With an unknown width (`cols == 0`) each logical line counts as one row.
fn rendered_rows(text: &str, cols: u16) -> u16 {
    let cols = cols as usize;
    let mut rows = 0usize;
    for line in text.lines() {
        let width = line.chars().count();
        rows += if cols == 0 {
            1
        } else {
            width.max(1).div_ceil(cols)
        };
    }
    rows.max(1).min(u16::MAX as usize) as u16
}
