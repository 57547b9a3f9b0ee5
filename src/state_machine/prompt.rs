//! Outgoing prompts

use serde::Serialize;

pub const YES_LABEL: &str = "✅ Sì!";
pub const NO_LABEL: &str = "❌ No.";

/// A message for the conversant, optionally with mutually exclusive choices
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prompt {
    text: String,
    /// Rows of choice labels; empty for a plain notice
    choices: Vec<Vec<String>>,
}

impl Prompt {
    pub fn notice(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            choices: Vec::new(),
        }
    }

    pub fn question(text: impl Into<String>, choices: Vec<Vec<String>>) -> Self {
        Self {
            text: text.into(),
            choices,
        }
    }

    /// Question answered by one of the yes/no labels
    pub fn yes_no(text: impl Into<String>) -> Self {
        Self::question(text, vec![vec![YES_LABEL.to_string(), NO_LABEL.to_string()]])
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn choices(&self) -> &[Vec<String>] {
        &self.choices
    }

    pub fn is_question(&self) -> bool {
        !self.choices.is_empty()
    }
}
