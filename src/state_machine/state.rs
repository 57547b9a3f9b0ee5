//! Dialog step types

use crate::config::DialogConfig;
use crate::db::{Student, StudentId};
use crate::token::TokenCodec;

// ============================================================================
// Steps
// ============================================================================

/// A node of the conversation tree, with whatever it captured on entry
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Step {
    /// Fresh session, nothing read yet
    #[default]
    Root,

    /// `/start`, with or without a deep-link token
    Start,

    NormalStart,

    DeeplinkStart { token: String },

    /// Linking the chat account to the student behind a deep link
    Register {
        email_prefix: String,
        phase: RegisterPhase,
    },

    /// Changing the directory visibility of a linked account
    Privacy { phase: PrivacyPhase },

    Whois { query: String },

    WhoisByEmail { local_part: String },

    WhoisByName { full_name: String },

    WhoisByUsername { username: String },
}

/// Where a registration resumes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RegisterPhase {
    /// Nothing asked yet
    #[default]
    Lookup,
    /// Asked whether the conversant is this student
    Confirming { student: Student },
    /// Asked whether to list this student in the directory
    ChoosingVisibility { student: Student },
}

/// Where a privacy change resumes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PrivacyPhase {
    #[default]
    Lookup,
    /// Asked whether to list the linked student in the directory
    ChoosingVisibility { student_id: StudentId },
}

impl Step {
    pub fn register(email_prefix: impl Into<String>) -> Self {
        Step::Register {
            email_prefix: email_prefix.into(),
            phase: RegisterPhase::Lookup,
        }
    }

    pub fn privacy() -> Self {
        Step::Privacy {
            phase: PrivacyPhase::Lookup,
        }
    }

    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Step::Root => "root",
            Step::Start => "start",
            Step::NormalStart => "normal_start",
            Step::DeeplinkStart { .. } => "deeplink_start",
            Step::Register { .. } => "register",
            Step::Privacy { .. } => "privacy",
            Step::Whois { .. } => "whois",
            Step::WhoisByEmail { .. } => "whois_by_email",
            Step::WhoisByName { .. } => "whois_by_name",
            Step::WhoisByUsername { .. } => "whois_by_username",
        }
    }

    /// Whether this step is waiting on an answer to a question it asked
    pub fn is_awaiting_answer(&self) -> bool {
        matches!(
            self,
            Step::Register {
                phase: RegisterPhase::Confirming { .. } | RegisterPhase::ChoosingVisibility { .. },
                ..
            } | Step::Privacy {
                phase: PrivacyPhase::ChoosingVisibility { .. }
            }
        )
    }
}

// ============================================================================
// Dialog Context
// ============================================================================

/// Immutable, process-wide inputs every session shares
#[derive(Debug)]
pub struct DialogContext {
    pub config: DialogConfig,
    pub codec: TokenCodec,
}

impl DialogContext {
    pub fn new(config: DialogConfig, codec: TokenCodec) -> Self {
        Self { config, codec }
    }
}
