//! Database module
//!
//! Persists students and the account links that tie chat accounts to them.

mod schema;

pub use schema::*;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Database connection lock poisoned")]
    Poisoned,
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

const STUDENT_RECORD_COLUMNS: &str =
    "s.id, s.email_prefix, s.first_name, s.last_name,
     l.conversant_id, l.first_name, l.last_name, l.username, l.privacy, l.linked_at";

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    // ==================== Student Operations ====================

    /// Insert a student, or refresh the names of an existing one
    pub fn upsert_student(&self, student: &NewStudent) -> DbResult<Student> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO students (email_prefix, first_name, last_name) VALUES (?1, ?2, ?3)
             ON CONFLICT(email_prefix) DO UPDATE SET
                first_name = excluded.first_name,
                last_name = excluded.last_name",
            params![student.email_prefix, student.first_name, student.last_name],
        )?;

        let id: StudentId = conn.query_row(
            "SELECT id FROM students WHERE email_prefix = ?1",
            params![student.email_prefix],
            |row| row.get(0),
        )?;

        Ok(Student {
            id,
            email_prefix: student.email_prefix.clone(),
            first_name: student.first_name.clone(),
            last_name: student.last_name.clone(),
        })
    }

    /// Get the student with the given e-mail prefix, with its link
    pub fn get_student_by_email_prefix(&self, email_prefix: &str) -> DbResult<Option<StudentRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {STUDENT_RECORD_COLUMNS}
             FROM students s LEFT JOIN account_links l ON l.student_id = s.id
             WHERE s.email_prefix = ?1"
        ))?;

        Ok(stmt
            .query_row(params![email_prefix], parse_student_record_row)
            .optional()?)
    }

    /// Students whose "first last" name matches, ignoring case
    pub fn find_students_by_full_name(&self, full_name: &str) -> DbResult<Vec<StudentRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {STUDENT_RECORD_COLUMNS}
             FROM students s LEFT JOIN account_links l ON l.student_id = s.id
             WHERE (s.first_name || ' ' || s.last_name) = ?1 COLLATE NOCASE
             ORDER BY s.id"
        ))?;

        let records = stmt
            .query_map(params![full_name.trim()], parse_student_record_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    // ==================== Account Link Operations ====================

    /// Get the link of a chat account
    pub fn get_account_link(&self, conversant_id: ConversantId) -> DbResult<Option<LinkedAccount>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {STUDENT_RECORD_COLUMNS}
             FROM account_links l JOIN students s ON s.id = l.student_id
             WHERE l.conversant_id = ?1"
        ))?;

        Ok(stmt
            .query_row(params![conversant_id], parse_linked_account_row)
            .optional()?)
    }

    /// Get the link of a chat handle, ignoring case
    pub fn get_account_link_by_username(&self, username: &str) -> DbResult<Option<LinkedAccount>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {STUDENT_RECORD_COLUMNS}
             FROM account_links l JOIN students s ON s.id = l.student_id
             WHERE l.username = ?1 COLLATE NOCASE"
        ))?;

        Ok(stmt
            .query_row(params![username], parse_linked_account_row)
            .optional()?)
    }

    /// Apply staged writes as a single transaction
    pub fn apply_writes(&self, writes: &[PendingWrite]) -> DbResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let now = Utc::now();

        for write in writes {
            match write {
                PendingWrite::CreateLink(link) => {
                    tx.execute(
                        "INSERT INTO account_links
                            (conversant_id, student_id, first_name, last_name, username, privacy, linked_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
                        params![
                            link.conversant_id,
                            link.student_id,
                            link.first_name,
                            link.last_name,
                            link.username,
                            now.to_rfc3339()
                        ],
                    )?;
                }
                PendingWrite::SetPrivacy {
                    student_id,
                    privacy,
                } => {
                    tx.execute(
                        "UPDATE account_links SET privacy = ?1 WHERE student_id = ?2",
                        params![privacy, student_id],
                    )?;
                }
            }
        }

        tx.commit()?;
        tracing::debug!(writes = writes.len(), "Committed staged writes");
        Ok(())
    }
}

fn parse_student(row: &rusqlite::Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: row.get(0)?,
        email_prefix: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
    })
}

fn parse_link(row: &rusqlite::Row<'_>, student_id: StudentId) -> rusqlite::Result<Option<AccountLink>> {
    let Some(conversant_id) = row.get::<_, Option<ConversantId>>(4)? else {
        return Ok(None);
    };
    Ok(Some(AccountLink {
        conversant_id,
        student_id,
        first_name: row.get(5)?,
        last_name: row.get(6)?,
        username: row.get(7)?,
        privacy: row.get(8)?,
        linked_at: parse_datetime(&row.get::<_, String>(9)?),
    }))
}

fn parse_student_record_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StudentRecord> {
    let student = parse_student(row)?;
    let link = parse_link(row, student.id)?;
    Ok(StudentRecord { student, link })
}

fn parse_linked_account_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LinkedAccount> {
    let student = parse_student(row)?;
    let link = parse_link(row, student.id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
    Ok(LinkedAccount { link, student })
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
