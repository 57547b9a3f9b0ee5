//! Runtime for live dialogs
//!
//! The [`Dispatcher`] owns one [`Session`] per conversant and chat. Messages
//! for the same session are handled one at a time; a session that ends is
//! evicted and the next message opens a fresh one.

mod session;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use session::{Outcome, Session};
pub use traits::*;

use crate::db::{ChatId, ConversantId, Database};
use crate::state_machine::{texts, DialogContext, InboundMessage, Prompt, Step};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Dispatcher wired to SQLite and the outbox stream
pub type ProductionDispatcher = Dispatcher<Database, OutboxTransport>;

/// A prompt on its way to the chat transport
#[derive(Debug, Clone, Serialize)]
pub struct OutboundPrompt {
    pub id: Uuid,
    pub chat_id: ChatId,
    pub text: String,
    pub choices: Vec<Vec<String>>,
    pub sent_at: DateTime<Utc>,
}

impl OutboundPrompt {
    pub fn new(chat_id: ChatId, prompt: &Prompt) -> Self {
        Self {
            id: Uuid::new_v4(),
            chat_id,
            text: prompt.text().to_string(),
            choices: prompt.choices().to_vec(),
            sent_at: Utc::now(),
        }
    }
}

/// Where a conversant's dialog stands after a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// A question is pending
    Waiting,
    Closed,
    /// The dialog hit a fault and was dropped
    Failed,
}

/// Result of handling one inbound message
///
/// Once a step has run its writes are committed and the session has moved
/// on, so a reply the transport refused is reported here rather than as an
/// error the caller would retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dispatched {
    pub status: SessionStatus,
    /// Every reply produced for the message reached the transport
    pub delivered: bool,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Nothing was run; the message can be sent again
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Sessions are per conversant and per chat, so a dialog opened in a
/// private chat never answers in a group
type SessionKey = (ChatId, ConversantId);

type SessionSlot<S> = Arc<Mutex<Session<S>>>;

/// Routes inbound messages to per-conversant sessions
pub struct Dispatcher<F: StoreFactory, T: Transport> {
    factory: F,
    transport: T,
    dialog: Arc<DialogContext>,
    sessions: RwLock<HashMap<SessionKey, SessionSlot<F::Store>>>,
}

impl<F: StoreFactory, T: Transport> Dispatcher<F, T> {
    pub fn new(factory: F, transport: T, dialog: Arc<DialogContext>) -> Self {
        Self {
            factory,
            transport,
            dialog,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn dialog(&self) -> &Arc<DialogContext> {
        &self.dialog
    }

    /// Sessions currently waiting on an answer or mid-message
    pub async fn active_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Handle one inbound message and deliver whatever it produces
    pub async fn dispatch(&self, msg: &InboundMessage) -> Result<Dispatched, DispatchError> {
        if !self.transport.is_ready() {
            return Err(DispatchError::Transport(TransportError(
                "no transport is reading prompts".to_string(),
            )));
        }

        let key = (msg.chat_id, msg.sender.id);

        loop {
            let slot = self.session_for(key).await;
            let mut session = slot.lock().await;

            // Closed while this message waited on it
            if session.is_closed() {
                drop(session);
                self.evict(key, &slot).await;
                continue;
            }

            let (status, reply) = match session.advance(msg).await {
                Ok(Outcome::Reply(prompt)) => (SessionStatus::Waiting, Some(prompt)),
                Ok(Outcome::Closed(reply)) => {
                    self.evict(key, &slot).await;
                    (SessionStatus::Closed, reply)
                }
                Err(fault) => {
                    self.evict(key, &slot).await;
                    tracing::error!(
                        conversant_id = msg.sender.id,
                        chat_id = msg.chat_id,
                        error = %fault,
                        "Dialog failed"
                    );
                    (
                        SessionStatus::Failed,
                        Some(Prompt::notice(texts::GENERIC_FAILURE)),
                    )
                }
            };

            let delivered = match reply {
                Some(prompt) => self.deliver(msg, &prompt).await,
                None => true,
            };
            return Ok(Dispatched { status, delivered });
        }
    }

    async fn deliver(&self, msg: &InboundMessage, prompt: &Prompt) -> bool {
        match self.transport.send(msg.chat_id, prompt).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    conversant_id = msg.sender.id,
                    chat_id = msg.chat_id,
                    error = %e,
                    "Reply not delivered"
                );
                false
            }
        }
    }

    /// Drop every session of a conversant; returns whether there was one
    pub async fn cancel(&self, conversant: ConversantId) -> bool {
        let slots: Vec<SessionSlot<F::Store>> = {
            let mut sessions = self.sessions.write().await;
            let keys: Vec<SessionKey> = sessions
                .keys()
                .filter(|(_, sender)| *sender == conversant)
                .copied()
                .collect();
            keys.iter().filter_map(|key| sessions.remove(key)).collect()
        };
        if slots.is_empty() {
            return false;
        }

        let mut pending_questions = 0;
        for slot in &slots {
            let mut session = slot.lock().await;
            if session.step().is_some_and(Step::is_awaiting_answer) {
                pending_questions += 1;
            }
            session.close().await;
        }

        let active = self.active_sessions().await;
        tracing::info!(
            conversant_id = conversant,
            cancelled = slots.len(),
            pending_questions,
            active,
            "Sessions cancelled"
        );
        true
    }

    async fn session_for(&self, key: SessionKey) -> SessionSlot<F::Store> {
        if let Some(slot) = self.sessions.read().await.get(&key) {
            return Arc::clone(slot);
        }

        let (chat_id, conversant) = key;
        let mut sessions = self.sessions.write().await;
        let slot = sessions.entry(key).or_insert_with(|| {
            tracing::debug!(conversant_id = conversant, chat_id, "Opening session");
            Arc::new(Mutex::new(Session::create(
                conversant,
                self.factory.open_store(),
                Arc::clone(&self.dialog),
            )))
        });
        Arc::clone(slot)
    }

    /// Remove `slot` from the map unless it was already replaced
    async fn evict(&self, key: SessionKey, slot: &SessionSlot<F::Store>) {
        let mut sessions = self.sessions.write().await;
        if sessions
            .get(&key)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
        {
            sessions.remove(&key);
        }
    }
}
