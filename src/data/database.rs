use std::sync::{Arc, Mutex};
use std::time::Duration;

use actix_web::web;
use rusqlite::Connection;
use tracing::info;

use crate::error::{ApiError, Result};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    email TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    photo TEXT,
    role TEXT NOT NULL,
    phone TEXT,
    bio TEXT,
    location TEXT,
    location_key TEXT,
    subjects TEXT NOT NULL DEFAULT '[]',
    qualifications TEXT,
    experience_years INTEGER NOT NULL DEFAULT 0,
    search_key TEXT NOT NULL,
    created_at TEXT NOT NULL,
    last_login_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS role_requests (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL,
    requested_role TEXT NOT NULL,
    qualifications TEXT,
    experience TEXT,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    decided_at TEXT
);
CREATE UNIQUE INDEX IF NOT EXISTS role_requests_one_pending
    ON role_requests (email) WHERE status = 'pending';

CREATE TABLE IF NOT EXISTS tuitions (
    id TEXT PRIMARY KEY,
    student_email TEXT NOT NULL,
    subject TEXT NOT NULL,
    subject_key TEXT NOT NULL,
    class_level TEXT NOT NULL,
    class_key TEXT NOT NULL,
    location TEXT NOT NULL,
    location_key TEXT NOT NULL,
    salary REAL NOT NULL,
    days_per_week INTEGER,
    schedule TEXT,
    medium TEXT,
    description TEXT,
    search_key TEXT NOT NULL,
    status TEXT NOT NULL,
    assigned_tutor_email TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS tuitions_by_status ON tuitions (status);
CREATE INDEX IF NOT EXISTS tuitions_by_student ON tuitions (student_email);

CREATE TABLE IF NOT EXISTS applications (
    id TEXT PRIMARY KEY,
    tuition_id TEXT NOT NULL,
    tutor_email TEXT NOT NULL,
    qualifications TEXT,
    experience TEXT,
    expected_salary REAL,
    message TEXT,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (tutor_email, tuition_id)
);
CREATE INDEX IF NOT EXISTS applications_by_tuition ON applications (tuition_id);

CREATE TABLE IF NOT EXISTS payments (
    id TEXT PRIMARY KEY,
    transaction_id TEXT NOT NULL UNIQUE,
    tuition_id TEXT NOT NULL,
    application_id TEXT NOT NULL,
    student_email TEXT NOT NULL,
    tutor_email TEXT NOT NULL,
    amount REAL NOT NULL,
    status TEXT NOT NULL,
    paid_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS notifications (
    id TEXT PRIMARY KEY,
    recipient_email TEXT NOT NULL,
    kind TEXT NOT NULL,
    message TEXT NOT NULL,
    link TEXT,
    read INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS notifications_by_recipient ON notifications (recipient_email);

CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    participant_a TEXT NOT NULL,
    participant_b TEXT NOT NULL,
    last_message TEXT,
    updated_at TEXT NOT NULL,
    UNIQUE (participant_a, participant_b)
);

CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL,
    sender_email TEXT NOT NULL,
    recipient_email TEXT NOT NULL,
    content TEXT NOT NULL,
    read INTEGER NOT NULL DEFAULT 0,
    sent_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS messages_by_conversation ON messages (conversation_id);

CREATE TABLE IF NOT EXISTS reviews (
    id TEXT PRIMARY KEY,
    student_email TEXT NOT NULL,
    tutor_email TEXT NOT NULL,
    rating INTEGER NOT NULL,
    comment TEXT,
    created_at TEXT NOT NULL,
    UNIQUE (student_email, tutor_email)
);

CREATE TABLE IF NOT EXISTS bookmarks (
    id TEXT PRIMARY KEY,
    owner_email TEXT NOT NULL,
    target_type TEXT NOT NULL,
    target_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (owner_email, target_type, target_id)
);
";

/// Shared handle to the document store. Cloning shares the same connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: &str, busy_timeout: Duration) -> Result<Database> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };
        conn.busy_timeout(busy_timeout)?;
        let db = Database::from_connection(conn)?;
        info!(path, "database ready");
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Database> {
        Database::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Database> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` against the connection on the blocking thread pool.
    pub async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        web::block(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| ApiError::Internal("Database lock poisoned".to_string()))?;
            f(&mut guard)
        })
        .await?
    }

    /// Synchronous access for start-up code and tests.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| ApiError::Internal("Database lock poisoned".to_string()))?;
        f(&mut guard)
    }
}

pub fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Trimmed, lower-cased form used by every search and exact-match column.
pub fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

pub fn json_column<T: serde::de::DeserializeOwned>(
    row: &rusqlite::Row<'_>,
    column: &str,
) -> rusqlite::Result<T> {
    let raw: String = row.get(column)?;
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}
