//! Inbound messages that drive a dialog

use crate::db::{ChatId, ConversantId};
use serde::{Deserialize, Serialize};

/// The chat account a message comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversant {
    pub id: ConversantId,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    /// Chat handle, without the leading `@`
    #[serde(default)]
    pub username: Option<String>,
}

/// A message delivered by the chat transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub chat_id: ChatId,
    pub sender: Conversant,
    /// Absent for stickers, photos and other non-text messages
    #[serde(default)]
    pub text: Option<String>,
    /// Sent in a one-to-one chat with the bot
    #[serde(default)]
    pub is_private: bool,
}

impl InboundMessage {
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }
}

/// A `/command[@bot] [argument]` line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command<'a> {
    /// Command word including the leading slash
    pub name: &'a str,
    /// Bot the command is addressed to, from the `@bot` suffix
    pub addressee: Option<&'a str>,
    /// Everything after the first space, trimmed; `None` when blank
    pub argument: Option<&'a str>,
}

impl<'a> Command<'a> {
    pub fn parse(text: &'a str) -> Option<Self> {
        let text = text.trim_start();
        if !text.starts_with('/') {
            return None;
        }

        let (head, rest) = text.split_once(' ').unwrap_or((text, ""));
        let (name, addressee) = match head.split_once('@') {
            Some((name, bot)) => (name, Some(bot)),
            None => (head, None),
        };
        let argument = Some(rest.trim()).filter(|arg| !arg.is_empty());

        Some(Self {
            name: name.trim_end(),
            addressee,
            argument,
        })
    }

    /// Whether the command is meant for the bot with this handle
    pub fn is_for(&self, bot_username: &str) -> bool {
        self.addressee
            .map_or(true, |bot| bot.trim().eq_ignore_ascii_case(bot_username))
    }
}

/// Reply to a yes/no question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
}

impl Answer {
    /// Recognize a tapped choice label or a typed yes/no
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text == super::prompt::YES_LABEL {
            return Some(Answer::Yes);
        }
        if text == super::prompt::NO_LABEL {
            return Some(Answer::No);
        }

        let word: String = text
            .chars()
            .filter(|c| c.is_alphabetic())
            .flat_map(char::to_lowercase)
            .collect();
        match word.as_str() {
            "sì" | "si" | "yes" | "y" => Some(Answer::Yes),
            "no" | "n" => Some(Answer::No),
            _ => None,
        }
    }
}
