use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::data::database::{new_id, normalize, now};
use crate::data::users::User;
use crate::error::{ApiError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub participants: [String; 2],
    pub last_message: Option<String>,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_email: String,
    pub recipient_email: String,
    pub content: String,
    pub read: bool,
    pub sent_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub recipient_email: String,
    pub content: String,
}

/// Participants are stored sorted so a pair maps to exactly one conversation.
fn ordered_pair(a: &str, b: &str) -> (String, String) {
    let (a, b) = (normalize(a), normalize(b));
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl Conversation {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
        Ok(Conversation {
            id: row.get("id")?,
            participants: [row.get("participant_a")?, row.get("participant_b")?],
            last_message: row.get("last_message")?,
            updated_at: row.get("updated_at")?,
        })
    }

    pub fn other_participant(&self, email: &str) -> &str {
        let email = normalize(email);
        if self.participants[0] == email {
            &self.participants[1]
        } else {
            &self.participants[0]
        }
    }

    pub fn includes(&self, email: &str) -> bool {
        let email = normalize(email);
        self.participants.iter().any(|p| *p == email)
    }

    fn find_between(conn: &Connection, a: &str, b: &str) -> Result<Option<Conversation>> {
        let (a, b) = ordered_pair(a, b);
        let conversation = conn
            .query_row(
                "SELECT * FROM conversations WHERE participant_a = ?1 AND participant_b = ?2",
                params![a, b],
                Conversation::from_row,
            )
            .optional()?;
        Ok(conversation)
    }

    /// Loads a conversation the caller takes part in.
    pub fn get_for(conn: &Connection, id: &str, email: &str) -> Result<Conversation> {
        let conversation = conn
            .query_row("SELECT * FROM conversations WHERE id = ?1", [id], Conversation::from_row)
            .optional()?
            .ok_or_else(|| ApiError::not_found("Conversation not found"))?;
        if !conversation.includes(email) {
            return Err(ApiError::forbidden("You are not part of this conversation"));
        }
        Ok(conversation)
    }

    pub fn for_participant(conn: &Connection, email: &str) -> Result<Vec<Conversation>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM conversations
             WHERE participant_a = ?1 OR participant_b = ?1
             ORDER BY updated_at DESC",
        )?;
        let conversations = stmt
            .query_map([normalize(email)], Conversation::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(conversations)
    }

    pub fn unread_for(conn: &Connection, id: &str, email: &str) -> Result<i64> {
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM messages
             WHERE conversation_id = ?1 AND recipient_email = ?2 AND read = 0",
            params![id, normalize(email)],
            |row| row.get(0),
        )?)
    }
}

impl Message {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
        Ok(Message {
            id: row.get("id")?,
            conversation_id: row.get("conversation_id")?,
            sender_email: row.get("sender_email")?,
            recipient_email: row.get("recipient_email")?,
            content: row.get("content")?,
            read: row.get("read")?,
            sent_at: row.get("sent_at")?,
        })
    }

    /// Stores a message, opening the conversation on first contact.
    pub fn send(conn: &mut Connection, sender_email: &str, new: NewMessage) -> Result<(Message, Conversation)> {
        let sender = normalize(sender_email);
        let recipient = normalize(&new.recipient_email);
        let content = new.content.trim().to_string();

        if content.is_empty() {
            return Err(ApiError::bad_request("Message content cannot be empty"));
        }
        if sender == recipient {
            return Err(ApiError::bad_request("You cannot message yourself"));
        }
        if User::find(conn, &recipient)?.is_none() {
            return Err(ApiError::not_found("Recipient not found"));
        }

        let timestamp = now();
        let tx = conn.transaction()?;
        let mut conversation = match Conversation::find_between(&tx, &sender, &recipient)? {
            Some(conversation) => conversation,
            None => {
                let (a, b) = ordered_pair(&sender, &recipient);
                let conversation = Conversation {
                    id: new_id(),
                    participants: [a, b],
                    last_message: None,
                    updated_at: timestamp.clone(),
                };
                tx.execute(
                    "INSERT INTO conversations (id, participant_a, participant_b, last_message, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        conversation.id,
                        conversation.participants[0],
                        conversation.participants[1],
                        conversation.last_message,
                        conversation.updated_at
                    ],
                )?;
                conversation
            }
        };

        let message = Message {
            id: new_id(),
            conversation_id: conversation.id.clone(),
            sender_email: sender,
            recipient_email: recipient,
            content,
            read: false,
            sent_at: timestamp.clone(),
        };
        tx.execute(
            "INSERT INTO messages (id, conversation_id, sender_email, recipient_email, content, read, sent_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                message.id,
                message.conversation_id,
                message.sender_email,
                message.recipient_email,
                message.content,
                message.read,
                message.sent_at
            ],
        )?;

        conversation.last_message = Some(message.content.clone());
        conversation.updated_at = timestamp;
        tx.execute(
            "UPDATE conversations SET last_message = ?1, updated_at = ?2 WHERE id = ?3",
            params![conversation.last_message, conversation.updated_at, conversation.id],
        )?;
        tx.commit()?;

        Ok((message, conversation))
    }

    pub fn in_conversation(conn: &Connection, conversation_id: &str) -> Result<Vec<Message>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM messages WHERE conversation_id = ?1 ORDER BY sent_at ASC",
        )?;
        let messages = stmt
            .query_map([conversation_id], Message::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(messages)
    }

    pub fn mark_read(conn: &Connection, conversation_id: &str, reader_email: &str) -> Result<usize> {
        Ok(conn.execute(
            "UPDATE messages SET read = 1
             WHERE conversation_id = ?1 AND recipient_email = ?2 AND read = 0",
            params![conversation_id, normalize(reader_email)],
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::database::Database;

    fn text(to: &str, content: &str) -> NewMessage {
        NewMessage {
            recipient_email: to.into(),
            content: content.into(),
        }
    }

    #[test]
    fn both_directions_share_a_conversation() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            User::login(conn, "a@x.com", None, None)?;
            User::login(conn, "b@x.com", None, None)?;

            let (_, first) = Message::send(conn, "b@x.com", text("a@x.com", "hi"))?;
            let (_, second) = Message::send(conn, "a@x.com", text("B@x.com", "hello back"))?;
            assert_eq!(first.id, second.id);
            assert_eq!(second.last_message.as_deref(), Some("hello back"));
            assert_eq!(second.other_participant("a@x.com"), "b@x.com");

            assert_eq!(Conversation::unread_for(conn, &first.id, "a@x.com")?, 1);
            assert_eq!(Message::mark_read(conn, &first.id, "a@x.com")?, 1);
            assert_eq!(Conversation::unread_for(conn, &first.id, "a@x.com")?, 0);
            assert_eq!(Conversation::unread_for(conn, &first.id, "b@x.com")?, 1);

            assert_eq!(Message::in_conversation(conn, &first.id)?.len(), 2);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn outsiders_cannot_read() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            User::login(conn, "a@x.com", None, None)?;
            User::login(conn, "b@x.com", None, None)?;
            let (_, conversation) = Message::send(conn, "a@x.com", text("b@x.com", "hi"))?;
            assert!(matches!(
                Conversation::get_for(conn, &conversation.id, "c@x.com"),
                Err(ApiError::Forbidden(_))
            ));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn validates_recipient_and_content() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            User::login(conn, "a@x.com", None, None)?;
            assert!(matches!(
                Message::send(conn, "a@x.com", text("ghost@x.com", "hi")),
                Err(ApiError::NotFound(_))
            ));
            assert!(matches!(
                Message::send(conn, "a@x.com", text("a@x.com", "hi")),
                Err(ApiError::BadRequest(_))
            ));
            assert!(matches!(
                Message::send(conn, "a@x.com", text("b@x.com", "   ")),
                Err(ApiError::BadRequest(_))
            ));
            Ok(())
        })
        .unwrap();
    }
}
