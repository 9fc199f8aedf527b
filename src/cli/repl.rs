//! Interactive REPL.
//!
//! Reads lines via reedline, dispatches slash commands, and hands everything
//! else to the session controller as a submission. While a reply streams, a
//! watcher task turns Ctrl-C into a cancel instead of killing the process.

use crossterm::{
    terminal::{Clear, ClearType},
    ExecutableCommand,
};
use dialoguer::Confirm;
use nu_ansi_term::Color;
use reedline::{FileBackedHistory, Reedline, Signal};
use std::io::stdout;
use tracing::debug;

use crate::classify::SentinelClassifier;
use crate::client::ChatApi;
use crate::notify::FocusSignal;
use crate::session::{SessionController, SessionState, SubmitOutcome};
use crate::view::{RenderSink, TerminalSink};

use super::prompt::ChatPrompt;

/// What a slash command asks the loop to do next.
enum CommandResult {
    Continue,
    Exit,
}

/// REPL state.
pub struct Repl {
    controller: SessionController<ChatApi, SentinelClassifier, TerminalSink>,
    focus: FocusSignal,
    assistant_name: String,
    model_name: String,
}

impl Repl {
    pub fn new(
        controller: SessionController<ChatApi, SentinelClassifier, TerminalSink>,
        focus: FocusSignal,
        assistant_name: impl Into<String>,
        model_name: impl Into<String>,
    ) -> Self {
        Self {
            controller,
            focus,
            assistant_name: assistant_name.into(),
            model_name: model_name.into(),
        }
    }

    /// Run the REPL loop.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        self.print_banner();

        let mut line_editor = Reedline::create();
        if let Some(history_path) = history_path() {
            if let Some(parent) = history_path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            if let Ok(h) = FileBackedHistory::with_file(500, history_path) {
                line_editor = line_editor.with_history(Box::new(h));
            }
        }

        let prompt = ChatPrompt::new(self.assistant_name.as_str(), self.model_name.as_str());

        loop {
            let signal = line_editor.read_line(&prompt);
            // Back at the prompt means the user is looking at the terminal.
            self.focus.gained();

            match signal {
                Ok(Signal::Success(line)) => {
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        continue;
                    }

                    if line.starts_with('/') {
                        match self.handle_command(&line).await {
                            Ok(CommandResult::Continue) => {}
                            Ok(CommandResult::Exit) => break,
                            Err(e) => {
                                self.controller
                                    .sink_mut()
                                    .system_message(&format!("Error: {}", e));
                            }
                        }
                        continue;
                    }

                    self.submit_with_cancel(&line).await;
                }
                Ok(Signal::CtrlC) => {
                    println!("^C");
                    continue;
                }
                Ok(Signal::CtrlD) => break,
                Err(err) => {
                    self.controller
                        .sink_mut()
                        .system_message(&format!("Readline error: {}", err));
                    break;
                }
            }
        }

        println!("Bye!");
        Ok(())
    }

    /// Submit a line, turning Ctrl-C into a cancel while streaming.
    async fn submit_with_cancel(&mut self, line: &str) {
        let cancel = self.controller.cancel_handle();
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });

        let outcome = self.controller.submit(line).await;
        watcher.abort();

        debug!(?outcome, "submission finished");
        debug_assert_eq!(self.controller.state(), SessionState::Idle);

        if outcome == SubmitOutcome::Cancelled {
            println!();
        }
    }

    async fn handle_command(&mut self, line: &str) -> anyhow::Result<CommandResult> {
        let command = line.split_whitespace().next().unwrap_or(line);
        match command {
            "/help" => {
                self.print_help();
                Ok(CommandResult::Continue)
            }
            "/trace" => {
                self.controller.sink_mut().toggle_trace();
                Ok(CommandResult::Continue)
            }
            "/clear" => {
                self.controller.sink_mut().clear();
                stdout().execute(Clear(ClearType::All))?;
                Ok(CommandResult::Continue)
            }
            "/erase" => {
                let confirmed = Confirm::new()
                    .with_prompt("Erase all conversation memory on the server?")
                    .default(false)
                    .interact()?;
                if confirmed {
                    self.controller.transport().erase_memory().await?;
                    self.controller.sink_mut().clear();
                    self.controller.sink_mut().system_message("Memory erased.");
                }
                Ok(CommandResult::Continue)
            }
            "/delete-account" => {
                let confirmed = Confirm::new()
                    .with_prompt("Permanently delete your account and all its data?")
                    .default(false)
                    .interact()?;
                if confirmed {
                    self.controller.transport().delete_account().await?;
                    self.controller
                        .sink_mut()
                        .system_message("Account deleted.");
                    return Ok(CommandResult::Exit);
                }
                Ok(CommandResult::Continue)
            }
            "/quit" | "/exit" => Ok(CommandResult::Exit),
            _ => {
                self.controller
                    .sink_mut()
                    .system_message(&format!("Unknown command: {}. Try /help.", command));
                Ok(CommandResult::Continue)
            }
        }
    }

    fn print_banner(&self) {
        println!(
            "{} {}",
            Color::Green.bold().paint(&self.assistant_name),
            Color::DarkGray.paint(format!("v{}", env!("CARGO_PKG_VERSION")))
        );
        println!(
            "{}",
            Color::DarkGray.paint("Type a message, or /help for commands.")
        );
        println!();
    }

    fn print_help(&self) {
        println!("Commands:");
        println!("  /help            Show this help");
        println!("  /trace           Toggle the trace panel");
        println!("  /clear           Clear the screen and conversation");
        println!("  /erase           Erase server-side conversation memory");
        println!("  /delete-account  Delete your account");
        println!("  /quit            Exit");
        println!();
        println!("Ctrl-C cancels a streaming reply; Ctrl-D exits.");
    }
}

fn history_path() -> Option<std::path::PathBuf> {
    Some(dirs::data_dir()?.join("streamtalk").join("history.txt"))
}
