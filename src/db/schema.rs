//! Database schema and record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chat-transport identity of a conversant
pub type ConversantId = i64;
/// Chat the reply goes to (the private chat or a group)
pub type ChatId = i64;
pub type StudentId = i64;

/// SQL schema for initialization
pub const SCHEMA: &str = r"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS students (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email_prefix TEXT NOT NULL UNIQUE,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS account_links (
    conversant_id INTEGER PRIMARY KEY,
    student_id INTEGER NOT NULL UNIQUE,
    first_name TEXT NOT NULL,
    last_name TEXT,
    username TEXT,
    privacy BOOLEAN NOT NULL DEFAULT 0,
    linked_at TEXT NOT NULL,

    FOREIGN KEY (student_id) REFERENCES students(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_account_links_username
    ON account_links(username COLLATE NOCASE);
";

/// Student record, as known from the university directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    /// Local part of the institutional e-mail address; unique
    pub email_prefix: String,
    pub first_name: String,
    pub last_name: String,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Student fields supplied by the web login when minting a deep link
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewStudent {
    pub email_prefix: String,
    pub first_name: String,
    pub last_name: String,
}

/// Association between a chat account and a student
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLink {
    pub conversant_id: ConversantId,
    pub student_id: StudentId,
    /// Chat display name captured when the link was made
    pub first_name: String,
    pub last_name: Option<String>,
    /// Chat handle, without the leading `@`
    pub username: Option<String>,
    /// Hidden from the group directory
    pub privacy: bool,
    pub linked_at: DateTime<Utc>,
}

impl AccountLink {
    /// How the chat account is shown in a directory entry
    pub fn handle(&self) -> String {
        match (&self.username, &self.last_name) {
            (Some(username), _) => format!("@{username}"),
            (None, Some(last_name)) => format!("{} {last_name}", self.first_name),
            (None, None) => self.first_name.clone(),
        }
    }
}

/// Link to be created; privacy starts cleared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccountLink {
    pub conversant_id: ConversantId,
    pub student_id: StudentId,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

/// An account link together with the student it points to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedAccount {
    pub link: AccountLink,
    pub student: Student,
}

/// A student together with its account link, if it has one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentRecord {
    pub student: Student,
    pub link: Option<AccountLink>,
}

/// Write staged by a dialog step until the store commits
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingWrite {
    CreateLink(NewAccountLink),
    SetPrivacy { student_id: StudentId, privacy: bool },
}
