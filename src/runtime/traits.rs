//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the sessions with mock implementations.

use crate::db::{
    ChatId, ConversantId, Database, DbError, LinkedAccount, NewAccountLink, PendingWrite,
    StudentId, StudentRecord,
};
use crate::state_machine::Prompt;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("Store handle already closed")]
    Closed,
    #[allow(dead_code)] // Raised by non-SQLite stores
    #[error("Store failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One session's handle on the record store
///
/// Writes are staged until [`RecordStore::commit`] applies them as one unit.
/// [`RecordStore::close`] discards anything still staged.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Link of a chat account, with its student
    async fn find_account_link(&self, conversant: ConversantId)
        -> StoreResult<Option<LinkedAccount>>;

    /// Student with this e-mail prefix; prefixes are unique
    async fn find_student(&self, email_prefix: &str) -> StoreResult<Option<StudentRecord>>;

    /// Students whose full name matches, ignoring case
    async fn find_students_by_full_name(&self, full_name: &str)
        -> StoreResult<Vec<StudentRecord>>;

    /// Link of a chat handle, ignoring case
    async fn find_account_link_by_handle(&self, handle: &str)
        -> StoreResult<Option<LinkedAccount>>;

    async fn create_account_link(&mut self, link: NewAccountLink) -> StoreResult<()>;

    async fn set_privacy(&mut self, student: StudentId, privacy: bool) -> StoreResult<()>;

    /// Apply every staged write atomically
    async fn commit(&mut self) -> StoreResult<()>;

    /// Release the handle; idempotent
    async fn close(&mut self);
}

/// Opens a record-store handle for each new session
pub trait StoreFactory: Send + Sync {
    type Store: RecordStore + 'static;

    fn open_store(&self) -> Self::Store;
}

#[derive(Debug, Error)]
#[error("Transport failure: {0}")]
pub struct TransportError(pub String);

/// Delivers prompts to a chat
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, chat: ChatId, prompt: &Prompt) -> Result<(), TransportError>;

    /// Whether a prompt sent now has somewhere to go
    fn is_ready(&self) -> bool {
        true
    }
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

impl<T: StoreFactory + ?Sized> StoreFactory for Arc<T> {
    type Store = T::Store;

    fn open_store(&self) -> Self::Store {
        (**self).open_store()
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, chat: ChatId, prompt: &Prompt) -> Result<(), TransportError> {
        (**self).send(chat, prompt).await
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

use super::OutboundPrompt;
use tokio::sync::broadcast;

impl StoreFactory for Database {
    type Store = DatabaseStore;

    fn open_store(&self) -> DatabaseStore {
        DatabaseStore::new(self.clone())
    }
}

/// Adapter to use Database as a session's RecordStore
pub struct DatabaseStore {
    db: Database,
    pending: Vec<PendingWrite>,
    closed: bool,
}

impl DatabaseStore {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            pending: Vec::new(),
            closed: false,
        }
    }

    fn open_db(&self) -> StoreResult<&Database> {
        if self.closed {
            Err(StoreError::Closed)
        } else {
            Ok(&self.db)
        }
    }
}

#[async_trait]
impl RecordStore for DatabaseStore {
    async fn find_account_link(
        &self,
        conversant: ConversantId,
    ) -> StoreResult<Option<LinkedAccount>> {
        Ok(self.open_db()?.get_account_link(conversant)?)
    }

    async fn find_student(&self, email_prefix: &str) -> StoreResult<Option<StudentRecord>> {
        Ok(self.open_db()?.get_student_by_email_prefix(email_prefix)?)
    }

    async fn find_students_by_full_name(
        &self,
        full_name: &str,
    ) -> StoreResult<Vec<StudentRecord>> {
        Ok(self.open_db()?.find_students_by_full_name(full_name)?)
    }

    async fn find_account_link_by_handle(
        &self,
        handle: &str,
    ) -> StoreResult<Option<LinkedAccount>> {
        Ok(self.open_db()?.get_account_link_by_username(handle)?)
    }

    async fn create_account_link(&mut self, link: NewAccountLink) -> StoreResult<()> {
        self.open_db()?;
        self.pending.push(PendingWrite::CreateLink(link));
        Ok(())
    }

    async fn set_privacy(&mut self, student: StudentId, privacy: bool) -> StoreResult<()> {
        self.open_db()?;
        self.pending.push(PendingWrite::SetPrivacy {
            student_id: student,
            privacy,
        });
        Ok(())
    }

    async fn commit(&mut self) -> StoreResult<()> {
        let writes = std::mem::take(&mut self.pending);
        if writes.is_empty() {
            return Ok(());
        }
        self.open_db()?.apply_writes(&writes)?;
        Ok(())
    }

    async fn close(&mut self) {
        if !self.pending.is_empty() {
            tracing::warn!(
                discarded = self.pending.len(),
                "Closing store handle with uncommitted writes"
            );
            self.pending.clear();
        }
        self.closed = true;
    }
}

/// Transport that publishes prompts for the chat-transport process to deliver
#[derive(Clone)]
pub struct OutboxTransport {
    outbox_tx: broadcast::Sender<OutboundPrompt>,
}

impl OutboxTransport {
    pub fn new(outbox_tx: broadcast::Sender<OutboundPrompt>) -> Self {
        Self { outbox_tx }
    }
}

#[async_trait]
impl Transport for OutboxTransport {
    async fn send(&self, chat: ChatId, prompt: &Prompt) -> Result<(), TransportError> {
        let outbound = OutboundPrompt::new(chat, prompt);
        let id = outbound.id;
        self.outbox_tx
            .send(outbound)
            .map_err(|_| TransportError("no transport is subscribed to the outbox".to_string()))?;
        tracing::debug!(
            chat_id = chat,
            outbound_id = %id,
            question = prompt.is_question(),
            "Prompt published"
        );
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.outbox_tx.receiver_count() > 0
    }
}
