//! Mock implementations for testing
//!
//! These mocks enable session and dispatcher testing without real I/O.

use super::traits::*;
use crate::db::{
    AccountLink, ChatId, ConversantId, LinkedAccount, NewAccountLink, PendingWrite, Student,
    StudentId, StudentRecord,
};
use crate::state_machine::event::Conversant;
use crate::state_machine::{InboundMessage, Prompt};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// Message Builders
// ============================================================================

pub fn conversant(id: ConversantId, username: Option<&str>) -> Conversant {
    Conversant {
        id,
        first_name: "Jane".to_string(),
        last_name: Some("Doe".to_string()),
        username: username.map(str::to_string),
    }
}

/// Message in the one-to-one chat of conversant `id`
pub fn private_message(id: ConversantId, text: &str) -> InboundMessage {
    InboundMessage {
        chat_id: id,
        sender: conversant(id, None),
        text: Some(text.to_string()),
        is_private: true,
    }
}

pub fn group_message(id: ConversantId, chat_id: ChatId, text: &str) -> InboundMessage {
    InboundMessage {
        chat_id,
        sender: conversant(id, None),
        text: Some(text.to_string()),
        is_private: false,
    }
}

// ============================================================================
// Mock Record Store
// ============================================================================

#[derive(Debug, Default)]
struct MockRecords {
    students: Vec<Student>,
    links: Vec<AccountLink>,
    opened: usize,
    closes: usize,
    commits: usize,
    fail_reads: bool,
    fail_commits: bool,
}

impl MockRecords {
    fn record_of(&self, student: &Student) -> StudentRecord {
        StudentRecord {
            student: student.clone(),
            link: self
                .links
                .iter()
                .find(|link| link.student_id == student.id)
                .cloned(),
        }
    }

    fn linked(&self, link: &AccountLink) -> Option<LinkedAccount> {
        self.students
            .iter()
            .find(|student| student.id == link.student_id)
            .map(|student| LinkedAccount {
                link: link.clone(),
                student: student.clone(),
            })
    }

    /// Apply writes to a copy so a failing batch leaves nothing behind
    fn apply(&mut self, writes: &[PendingWrite]) -> StoreResult<()> {
        let mut links = self.links.clone();
        for write in writes {
            match write {
                PendingWrite::CreateLink(new) => {
                    if links.iter().any(|link| {
                        link.conversant_id == new.conversant_id || link.student_id == new.student_id
                    }) {
                        return Err(StoreError::Backend("account link already exists".into()));
                    }
                    links.push(new_link(new.clone(), false));
                }
                PendingWrite::SetPrivacy {
                    student_id,
                    privacy,
                } => {
                    let link = links
                        .iter_mut()
                        .find(|link| link.student_id == *student_id)
                        .ok_or_else(|| StoreError::Backend("no link for student".into()))?;
                    link.privacy = *privacy;
                }
            }
        }
        self.links = links;
        Ok(())
    }
}

fn new_link(new: NewAccountLink, privacy: bool) -> AccountLink {
    AccountLink {
        conversant_id: new.conversant_id,
        student_id: new.student_id,
        first_name: new.first_name,
        last_name: new.last_name,
        username: new.username,
        privacy,
        linked_at: Utc::now(),
    }
}

/// In-memory record store
///
/// Clones share the same records but each keeps its own staged writes, so
/// the mock doubles as its own [`StoreFactory`].
#[derive(Debug, Clone, Default)]
pub struct MockRecordStore {
    records: Arc<Mutex<MockRecords>>,
    pending: Vec<PendingWrite>,
    closed: bool,
}

#[allow(dead_code)]
impl MockRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_student(&self, email_prefix: &str, first_name: &str, last_name: &str) -> Student {
        let mut records = self.records.lock().unwrap();
        #[allow(clippy::cast_possible_wrap)]
        let student = Student {
            id: records.students.len() as StudentId + 1,
            email_prefix: email_prefix.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        };
        records.students.push(student.clone());
        student
    }

    pub fn add_link(&self, conversant: &Conversant, student: &Student, privacy: bool) {
        let link = new_link(
            NewAccountLink {
                conversant_id: conversant.id,
                student_id: student.id,
                first_name: conversant.first_name.clone(),
                last_name: conversant.last_name.clone(),
                username: conversant.username.clone(),
            },
            privacy,
        );
        self.records.lock().unwrap().links.push(link);
    }

    pub fn links(&self) -> Vec<AccountLink> {
        self.records.lock().unwrap().links.clone()
    }

    pub fn privacy_of(&self, student: StudentId) -> Option<bool> {
        self.records
            .lock()
            .unwrap()
            .links
            .iter()
            .find(|link| link.student_id == student)
            .map(|link| link.privacy)
    }

    /// Handles opened through the factory side
    pub fn opened(&self) -> usize {
        self.records.lock().unwrap().opened
    }

    pub fn closes(&self) -> usize {
        self.records.lock().unwrap().closes
    }

    /// Commits that applied at least one write
    pub fn commits(&self) -> usize {
        self.records.lock().unwrap().commits
    }

    pub fn fail_reads(&self, fail: bool) {
        self.records.lock().unwrap().fail_reads = fail;
    }

    pub fn fail_commits(&self, fail: bool) {
        self.records.lock().unwrap().fail_commits = fail;
    }

    fn read(&self) -> StoreResult<std::sync::MutexGuard<'_, MockRecords>> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        let records = self.records.lock().unwrap();
        if records.fail_reads {
            return Err(StoreError::Backend("injected read failure".into()));
        }
        Ok(records)
    }
}

impl StoreFactory for MockRecordStore {
    type Store = MockRecordStore;

    fn open_store(&self) -> MockRecordStore {
        self.records.lock().unwrap().opened += 1;
        MockRecordStore {
            records: Arc::clone(&self.records),
            pending: Vec::new(),
            closed: false,
        }
    }
}

#[async_trait]
impl RecordStore for MockRecordStore {
    async fn find_account_link(
        &self,
        conversant: ConversantId,
    ) -> StoreResult<Option<LinkedAccount>> {
        let records = self.read()?;
        Ok(records
            .links
            .iter()
            .find(|link| link.conversant_id == conversant)
            .and_then(|link| records.linked(link)))
    }

    async fn find_student(&self, email_prefix: &str) -> StoreResult<Option<StudentRecord>> {
        let records = self.read()?;
        Ok(records
            .students
            .iter()
            .find(|student| student.email_prefix == email_prefix)
            .map(|student| records.record_of(student)))
    }

    async fn find_students_by_full_name(
        &self,
        full_name: &str,
    ) -> StoreResult<Vec<StudentRecord>> {
        let records = self.read()?;
        let wanted = full_name.to_lowercase();
        Ok(records
            .students
            .iter()
            .filter(|student| student.full_name().to_lowercase() == wanted)
            .map(|student| records.record_of(student))
            .collect())
    }

    async fn find_account_link_by_handle(
        &self,
        handle: &str,
    ) -> StoreResult<Option<LinkedAccount>> {
        let records = self.read()?;
        Ok(records
            .links
            .iter()
            .find(|link| {
                link.username
                    .as_deref()
                    .is_some_and(|username| username.eq_ignore_ascii_case(handle))
            })
            .and_then(|link| records.linked(link)))
    }

    async fn create_account_link(&mut self, link: NewAccountLink) -> StoreResult<()> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        self.pending.push(PendingWrite::CreateLink(link));
        Ok(())
    }

    async fn set_privacy(&mut self, student: StudentId, privacy: bool) -> StoreResult<()> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        self.pending.push(PendingWrite::SetPrivacy {
            student_id: student,
            privacy,
        });
        Ok(())
    }

    async fn commit(&mut self) -> StoreResult<()> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        let writes = std::mem::take(&mut self.pending);
        if writes.is_empty() {
            return Ok(());
        }
        let mut records = self.records.lock().unwrap();
        if records.fail_commits {
            return Err(StoreError::Backend("injected commit failure".into()));
        }
        records.apply(&writes)?;
        records.commits += 1;
        Ok(())
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.pending.clear();
        self.records.lock().unwrap().closes += 1;
    }
}

// ============================================================================
// Recording Transport
// ============================================================================

/// Transport that keeps every prompt it was asked to send
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(ChatId, Prompt)>>,
    fail: AtomicBool,
    offline: AtomicBool,
}

#[allow(dead_code)]
impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(ChatId, Prompt)> {
        self.sent.lock().unwrap().clone()
    }

    /// Texts of everything sent, in order
    pub fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, prompt)| prompt.text().to_string())
            .collect()
    }

    pub fn last(&self) -> Option<Prompt> {
        self.sent.lock().unwrap().last().map(|(_, prompt)| prompt.clone())
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Report no reader, as an outbox with nobody subscribed does
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, chat: ChatId, prompt: &Prompt) -> Result<(), TransportError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError("injected send failure".to_string()));
        }
        self.sent.lock().unwrap().push((chat, prompt.clone()));
        Ok(())
    }

    fn is_ready(&self) -> bool {
        !self.offline.load(Ordering::SeqCst)
    }
}
