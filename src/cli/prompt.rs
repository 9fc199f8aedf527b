//! Custom reedline prompt.

use reedline::{
    Prompt, PromptEditMode, PromptHistorySearch, PromptHistorySearchStatus,
};
use std::borrow::Cow;

/// Prompt showing the assistant name and backend model.
pub struct ChatPrompt {
    assistant_name: String,
    model_name: String,
}

impl ChatPrompt {
    pub fn new(assistant_name: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            assistant_name: assistant_name.into(),
            model_name: model_name.into(),
        }
    }
}

impl Prompt for ChatPrompt {
    fn render_prompt_left(&self) -> Cow<'_, str> {
        Cow::Owned(format!(
            "\x1b[1;32m{}\x1b[0m \x1b[2m[{}]\x1b[0m",
            self.assistant_name, self.model_name
        ))
    }

    fn render_prompt_right(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _mode: PromptEditMode) -> Cow<'_, str> {
        Cow::Borrowed(" ❯ ")
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<'_, str> {
        Cow::Borrowed("... ")
    }

    fn render_prompt_history_search_indicator(&self, hs: PromptHistorySearch) -> Cow<'_, str> {
        let prefix = match hs.status {
            PromptHistorySearchStatus::Passing => "",
            PromptHistorySearchStatus::Failing => "failing ",
        };
        Cow::Owned(format!("({}search: {}) ", prefix, hs.term))
    }
}
