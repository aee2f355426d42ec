use std::borrow::Cow;

use owo_colors::OwoColorize;
use reedline::{Prompt, PromptEditMode, PromptHistorySearch, PromptHistorySearchStatus, PromptViMode};
use typed_builder::TypedBuilder;

/// `[n] docrel> `, where `n` counts the statements entered so far.
#[derive(TypedBuilder)]
pub struct SqlPrompt {
    prefix: String,
    #[builder(default = 1)]
    line_count: usize,
}

impl Default for SqlPrompt {
    fn default() -> Self {
        SqlPrompt::builder()
            .prefix(format!("{}{} ", "docrel".green().italic(), ">".black()))
            .build()
    }
}

impl SqlPrompt {
    pub fn increment_line_count(&mut self) {
        self.line_count += 1;
    }
}

impl Prompt for SqlPrompt {
    fn render_prompt_left(&self) -> Cow<str> {
        format!(
            "{}{}{} {}",
            "[".black(),
            self.line_count.cyan(),
            "]".black(),
            self.prefix
        )
        .into()
    }

    fn render_prompt_right(&self) -> Cow<str> {
        "".into()
    }

    fn render_prompt_indicator(&self, prompt_mode: PromptEditMode) -> Cow<str> {
        match prompt_mode {
            PromptEditMode::Vi(PromptViMode::Normal) => format!("{}", "NORMAL".red()).into(),
            PromptEditMode::Vi(PromptViMode::Insert) => format!("{}", "INSERT".green()).into(),
            PromptEditMode::Custom(mode) => format!("({mode})").into(),
            _ => "".into(),
        }
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<str> {
        "... ".black().to_string().into()
    }

    fn render_prompt_history_search_indicator(
        &self,
        history_search: PromptHistorySearch,
    ) -> Cow<str> {
        let prefix = match history_search.status {
            PromptHistorySearchStatus::Passing => "",
            PromptHistorySearchStatus::Failing => "failing ",
        };

        Cow::Owned(format!(
            "({}reverse-search: {}) ",
            prefix, history_search.term
        ))
    }
}
