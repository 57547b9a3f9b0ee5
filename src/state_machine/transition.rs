//! Step transition function
//!
//! Each call feeds one inbound message to one step. A step reads from the
//! record store, stages at most one unit of writes, and says what happens
//! next: hand the same message to a child step, ask something and wait, or
//! finish.

use super::event::{Answer, Command, InboundMessage};
use super::state::{DialogContext, PrivacyPhase, RegisterPhase, Step};
use super::{texts, Prompt};
use crate::db::{NewAccountLink, StudentRecord};
use crate::runtime::{RecordStore, StoreError};
use crate::token::Opcode;
use thiserror::Error;

/// Longest chain of delegations a single message may go through
pub const MAX_DELEGATION_DEPTH: usize = 8;

/// What a step decided
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Run this child step with the same message
    Delegate(Step),
    /// Send the prompt and resume at `resume` with the next message
    Suspend { prompt: Prompt, resume: Step },
    /// End the session, optionally with a last reply
    Finish(Option<Prompt>),
}

impl Transition {
    fn finish() -> Self {
        Transition::Finish(None)
    }

    fn reply(text: impl Into<String>) -> Self {
        Transition::Finish(Some(Prompt::notice(text)))
    }

    fn ask(prompt: Prompt, resume: Step) -> Self {
        Transition::Suspend { prompt, resume }
    }
}

/// Failures that end a session
#[derive(Debug, Error)]
pub enum EngineFault {
    #[error("Record store failure: {0}")]
    Store(#[from] StoreError),
    #[error("Deep link names unknown student {0:?}")]
    UnknownStudent(String),
    #[error("Delegation chain exceeded {0} steps")]
    DelegationTooDeep(usize),
    #[error("Session already closed")]
    SessionClosed,
}

/// How a `/whois` query is looked up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhoisQuery {
    Email(String),
    Name(String),
    Username(String),
}

/// Run one step against one message
pub async fn transition<S>(
    step: Step,
    msg: &InboundMessage,
    store: &mut S,
    ctx: &DialogContext,
) -> Result<Transition, EngineFault>
where
    S: RecordStore + ?Sized,
{
    match step {
        Step::Root => Ok(root(msg, ctx)),
        Step::Start => Ok(start(msg)),
        Step::NormalStart => Ok(Transition::reply(texts::welcome(&ctx.config))),
        Step::DeeplinkStart { token } => Ok(deeplink_start(&token, ctx)),
        Step::Register {
            email_prefix,
            phase,
        } => register(email_prefix, phase, msg, store, ctx).await,
        Step::Privacy { phase } => privacy(phase, msg, store).await,
        Step::Whois { query } => Ok(whois(&query)),
        Step::WhoisByEmail { local_part } => {
            let record = store.find_student(&local_part).await?;
            Ok(whois_single(record, ctx))
        }
        Step::WhoisByName { full_name } => {
            let records = store.find_students_by_full_name(&full_name).await?;
            Ok(whois_by_name(records, ctx))
        }
        Step::WhoisByUsername { username } => {
            let record = store
                .find_account_link_by_handle(&username)
                .await?
                .map(|linked| StudentRecord {
                    student: linked.student,
                    link: Some(linked.link),
                });
            Ok(whois_single(record, ctx))
        }
    }
}

// ============================================================================
// Entry and /start
// ============================================================================

fn root(msg: &InboundMessage, ctx: &DialogContext) -> Transition {
    let Some(command) = Command::parse(msg.text()) else {
        return Transition::finish();
    };
    if !command.is_for(&ctx.config.bot_username) {
        return Transition::finish();
    }

    match command.name {
        "/whois" => Transition::Delegate(Step::Whois {
            query: command.argument.unwrap_or_default().to_string(),
        }),
        "/start" | "/privacy" if !msg.is_private => {
            Transition::reply(texts::private_chat_only(&ctx.config))
        }
        "/start" => Transition::Delegate(Step::Start),
        "/privacy" => Transition::Delegate(Step::privacy()),
        _ => Transition::finish(),
    }
}

fn start(msg: &InboundMessage) -> Transition {
    match Command::parse(msg.text()).and_then(|command| command.argument) {
        None => Transition::Delegate(Step::NormalStart),
        Some(token) => Transition::Delegate(Step::DeeplinkStart {
            token: token.to_string(),
        }),
    }
}

fn deeplink_start(token: &str, ctx: &DialogContext) -> Transition {
    let token = match ctx.codec.decode(token) {
        Ok(token) => token,
        Err(e) => {
            tracing::info!(error = %e, "Ignoring deep link that does not decode");
            return Transition::finish();
        }
    };

    match token.operation() {
        Some(Opcode::Register) => Transition::Delegate(Step::register(token.payload)),
        None => {
            tracing::info!(opcode = %token.opcode, "Ignoring deep link with unknown opcode");
            Transition::finish()
        }
    }
}

// ============================================================================
// Registration
// ============================================================================

async fn register<S>(
    email_prefix: String,
    phase: RegisterPhase,
    msg: &InboundMessage,
    store: &mut S,
    ctx: &DialogContext,
) -> Result<Transition, EngineFault>
where
    S: RecordStore + ?Sized,
{
    match phase {
        RegisterPhase::Lookup => {
            let existing = store.find_account_link(msg.sender.id).await?;
            let student = store
                .find_student(&email_prefix)
                .await?
                .ok_or_else(|| EngineFault::UnknownStudent(email_prefix.clone()))?
                .student;

            if let Some(linked) = existing {
                return Ok(if linked.student.id == student.id {
                    Transition::reply(texts::already_verified(&ctx.config))
                } else {
                    Transition::reply(texts::already_linked(&linked.student))
                });
            }

            let prompt = Prompt::yes_no(texts::confirm_identity(&student, &ctx.config));
            Ok(Transition::ask(
                prompt,
                Step::Register {
                    email_prefix,
                    phase: RegisterPhase::Confirming { student },
                },
            ))
        }

        RegisterPhase::Confirming { student } => match Answer::parse(msg.text()) {
            Some(Answer::No) => Ok(Transition::reply(texts::LOGOUT_AND_RETRY)),
            Some(Answer::Yes) => Ok(Transition::ask(
                Prompt::yes_no(texts::VISIBILITY_QUESTION),
                Step::Register {
                    email_prefix,
                    phase: RegisterPhase::ChoosingVisibility { student },
                },
            )),
            None => Ok(Transition::ask(
                Prompt::yes_no(texts::confirm_identity(&student, &ctx.config)),
                Step::Register {
                    email_prefix,
                    phase: RegisterPhase::Confirming { student },
                },
            )),
        },

        RegisterPhase::ChoosingVisibility { student } => {
            let Some(answer) = Answer::parse(msg.text()) else {
                return Ok(Transition::ask(
                    Prompt::yes_no(texts::VISIBILITY_QUESTION),
                    Step::Register {
                        email_prefix,
                        phase: RegisterPhase::ChoosingVisibility { student },
                    },
                ));
            };
            // "No" to being listed means hidden
            let privacy = answer == Answer::No;

            store
                .create_account_link(NewAccountLink {
                    conversant_id: msg.sender.id,
                    student_id: student.id,
                    first_name: msg.sender.first_name.clone(),
                    last_name: msg.sender.last_name.clone(),
                    username: msg.sender.username.clone(),
                })
                .await?;
            store.set_privacy(student.id, privacy).await?;
            store.commit().await?;

            tracing::info!(
                conversant_id = msg.sender.id,
                student_id = student.id,
                privacy,
                "Account linked"
            );
            Ok(Transition::reply(texts::verified(&ctx.config)))
        }
    }
}

// ============================================================================
// Privacy
// ============================================================================

async fn privacy<S>(
    phase: PrivacyPhase,
    msg: &InboundMessage,
    store: &mut S,
) -> Result<Transition, EngineFault>
where
    S: RecordStore + ?Sized,
{
    match phase {
        PrivacyPhase::Lookup => {
            let Some(linked) = store.find_account_link(msg.sender.id).await? else {
                return Ok(Transition::reply(texts::NOT_VERIFIED));
            };
            Ok(Transition::ask(
                Prompt::yes_no(texts::VISIBILITY_QUESTION),
                Step::Privacy {
                    phase: PrivacyPhase::ChoosingVisibility {
                        student_id: linked.student.id,
                    },
                },
            ))
        }

        PrivacyPhase::ChoosingVisibility { student_id } => {
            let Some(answer) = Answer::parse(msg.text()) else {
                return Ok(Transition::ask(
                    Prompt::yes_no(texts::VISIBILITY_QUESTION),
                    Step::Privacy {
                        phase: PrivacyPhase::ChoosingVisibility { student_id },
                    },
                ));
            };
            let privacy = answer == Answer::No;

            store.set_privacy(student_id, privacy).await?;
            store.commit().await?;

            tracing::info!(student_id, privacy, "Directory visibility changed");
            Ok(Transition::reply(if privacy {
                texts::NOW_HIDDEN
            } else {
                texts::NOW_VISIBLE
            }))
        }
    }
}

// ============================================================================
// Directory lookups
// ============================================================================

/// Decide how to look up a `/whois` query; `None` when there is nothing to search
pub fn classify_query(query: &str) -> Option<WhoisQuery> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }

    // An `@` past the first character separates an e-mail local part
    let at = query
        .char_indices()
        .skip(1)
        .find_map(|(i, c)| (c == '@').then_some(i));
    if let Some((local_part, _)) = at.map(|i| query.split_at(i)) {
        return Some(WhoisQuery::Email(local_part.to_string()));
    }

    if query.parse::<i64>().is_ok() {
        return Some(WhoisQuery::Email(query.to_string()));
    }

    if query.contains(' ') {
        return Some(WhoisQuery::Name(query.to_string()));
    }

    let username = query.trim_start_matches('@');
    if username.is_empty() {
        return None;
    }
    Some(WhoisQuery::Username(username.to_string()))
}

fn whois(query: &str) -> Transition {
    match classify_query(query) {
        Some(WhoisQuery::Email(local_part)) => {
            Transition::Delegate(Step::WhoisByEmail { local_part })
        }
        Some(WhoisQuery::Name(full_name)) => Transition::Delegate(Step::WhoisByName { full_name }),
        Some(WhoisQuery::Username(username)) => {
            Transition::Delegate(Step::WhoisByUsername { username })
        }
        None => Transition::reply(texts::QUERY_NOT_UNDERSTOOD),
    }
}

/// Reply for a lookup that matches at most one student
fn whois_single(record: Option<StudentRecord>, ctx: &DialogContext) -> Transition {
    match record {
        Some(StudentRecord {
            student,
            link: Some(link),
        }) => {
            if link.privacy {
                Transition::reply(texts::STUDENT_PRIVATE)
            } else {
                Transition::reply(texts::profile(&student, &link, &ctx.config))
            }
        }
        // Students who never linked a chat account are not in the directory
        Some(StudentRecord { link: None, .. }) | None => Transition::reply(texts::NO_STUDENT_FOUND),
    }
}

fn whois_by_name(records: Vec<StudentRecord>, ctx: &DialogContext) -> Transition {
    let mut lines = Vec::new();
    let mut hidden = false;

    for record in records {
        let Some(link) = record.link else {
            continue;
        };
        if link.privacy {
            hidden = true;
            continue;
        }
        lines.push(texts::profile(&record.student, &link, &ctx.config));
    }
    if hidden {
        lines.push(texts::SOME_STUDENTS_PRIVATE.to_string());
    }

    if lines.is_empty() {
        Transition::reply(texts::NO_STUDENT_FOUND)
    } else {
        Transition::reply(lines.join("\n\n"))
    }
}
