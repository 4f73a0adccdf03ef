use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::data::database::{new_id, normalize, now, Database};
use crate::error::{ApiError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub recipient_email: String,
    pub kind: String,
    pub message: String,
    pub link: Option<String>,
    pub read: bool,
    pub created_at: String,
}

/// A notification waiting to be written. Delivery is best effort: see [`deliver`].
#[derive(Debug, Clone)]
pub struct Notice {
    pub recipient: String,
    pub kind: &'static str,
    pub message: String,
    pub link: Option<String>,
}

impl Notice {
    pub fn new(recipient: impl Into<String>, kind: &'static str, message: impl Into<String>) -> Notice {
        Notice {
            recipient: recipient.into(),
            kind,
            message: message.into(),
            link: None,
        }
    }

    pub fn link(mut self, link: impl Into<String>) -> Notice {
        self.link = Some(link.into());
        self
    }
}

impl Notification {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
        Ok(Notification {
            id: row.get("id")?,
            recipient_email: row.get("recipient_email")?,
            kind: row.get("kind")?,
            message: row.get("message")?,
            link: row.get("link")?,
            read: row.get("read")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn insert(conn: &Connection, notice: &Notice) -> Result<Notification> {
        let notification = Notification {
            id: new_id(),
            recipient_email: normalize(&notice.recipient),
            kind: notice.kind.to_string(),
            message: notice.message.clone(),
            link: notice.link.clone(),
            read: false,
            created_at: now(),
        };
        conn.execute(
            "INSERT INTO notifications (id, recipient_email, kind, message, link, read, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                notification.id,
                notification.recipient_email,
                notification.kind,
                notification.message,
                notification.link,
                notification.read,
                notification.created_at
            ],
        )?;
        Ok(notification)
    }

    pub fn for_recipient(conn: &Connection, email: &str) -> Result<Vec<Notification>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM notifications WHERE recipient_email = ?1 ORDER BY created_at DESC",
        )?;
        let notifications = stmt
            .query_map([normalize(email)], Notification::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(notifications)
    }

    pub fn unread_count(conn: &Connection, email: &str) -> Result<i64> {
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE recipient_email = ?1 AND read = 0",
            [normalize(email)],
            |row| row.get(0),
        )?)
    }

    pub fn mark_read(conn: &Connection, id: &str, email: &str) -> Result<()> {
        let updated = conn.execute(
            "UPDATE notifications SET read = 1 WHERE id = ?1 AND recipient_email = ?2",
            params![id, normalize(email)],
        )?;
        if updated == 0 {
            return Err(ApiError::not_found("Notification not found"));
        }
        Ok(())
    }

    /// Returns how many notifications flipped from unread to read.
    pub fn mark_all_read(conn: &Connection, email: &str) -> Result<usize> {
        Ok(conn.execute(
            "UPDATE notifications SET read = 1 WHERE recipient_email = ?1 AND read = 0",
            [normalize(email)],
        )?)
    }

    pub fn delete(conn: &Connection, id: &str, email: &str) -> Result<()> {
        let deleted = conn.execute(
            "DELETE FROM notifications WHERE id = ?1 AND recipient_email = ?2",
            params![id, normalize(email)],
        )?;
        if deleted == 0 {
            return Err(ApiError::not_found("Notification not found"));
        }
        Ok(())
    }
}

/// Writes each notice, logging and swallowing failures. The caller's
/// operation has already succeeded and must not be failed by this.
pub async fn deliver(db: &Database, notices: Vec<Notice>) {
    if notices.is_empty() {
        return;
    }
    let result = db
        .run(move |conn| {
            for notice in &notices {
                if let Err(e) = Notification::insert(conn, notice) {
                    warn!(recipient = %notice.recipient, kind = notice.kind, error = %e, "notification not stored");
                }
            }
            Ok(())
        })
        .await;
    if let Err(e) = result {
        warn!(error = %e, "notification delivery failed");
    }
}
