//! Interactive REPL and one-shot prompt mode.

mod prompt;
mod repl;

pub use repl::Repl;

use crate::classify::SentinelClassifier;
use crate::client::ChatApi;
use crate::session::{SessionController, SubmitOutcome};
use crate::view::TerminalSink;

/// Run a single prompt non-interactively and report whether it succeeded.
pub async fn run_single_prompt(
    controller: &mut SessionController<ChatApi, SentinelClassifier, TerminalSink>,
    input: &str,
) -> anyhow::Result<()> {
    match controller.submit(input).await {
        SubmitOutcome::Completed => Ok(()),
        SubmitOutcome::Ignored => anyhow::bail!("nothing to send"),
        SubmitOutcome::Cancelled => anyhow::bail!("cancelled"),
        SubmitOutcome::Failed => anyhow::bail!("request failed"),
    }
}
