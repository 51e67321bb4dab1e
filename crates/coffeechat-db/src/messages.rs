//! Message store: an append-only ledger of directed messages between two users.

use coffeechat_types::models::{MAX_MESSAGE_CHARS, PageRequest, UserSummary};
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::debug;

use crate::models::MessageRow;
use crate::users::{query_user_summary, user_exists};
use crate::{Database, Error, Result, now_timestamp};

/// Columns selected by every message query, sender profile joined in.
pub(crate) const MESSAGE_COLUMNS: &str =
    "m.id, m.sender_id, m.recipient_id, m.content, m.created_at, u.name, u.image";

pub(crate) fn map_message_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    let sender_id: String = row.get(1)?;
    Ok(MessageRow {
        id: row.get(0)?,
        recipient_id: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
        sender: UserSummary {
            id: sender_id.clone(),
            name: row.get(5)?,
            image: row.get(6)?,
        },
        sender_id,
    })
}

/// Field checks that run before any write is attempted.
pub fn validate_message(sender_id: &str, recipient_id: &str, content: &str) -> Result<()> {
    if recipient_id.is_empty() {
        return Err(Error::InvalidInput("Recipient ID is required".into()));
    }
    // Whitespace-only content is rejected too, not just the empty string.
    if content.trim().is_empty() {
        return Err(Error::InvalidInput("Message content is required".into()));
    }
    if content.chars().count() > MAX_MESSAGE_CHARS {
        return Err(Error::InvalidInput(format!(
            "Message must be at most {} characters",
            MAX_MESSAGE_CHARS
        )));
    }
    if sender_id == recipient_id {
        return Err(Error::InvalidInput("Cannot send a message to yourself".into()));
    }
    Ok(())
}

impl Database {
    /// Append a message. The insert is a single transaction: either the
    /// message is fully visible to readers afterwards or not at all.
    pub fn send_message(&self, sender_id: &str, recipient_id: &str, content: &str) -> Result<MessageRow> {
        validate_message(sender_id, recipient_id, content)?;

        let message = self.with_tx(|conn| {
            if !user_exists(conn, recipient_id)? {
                return Err(Error::NotFound("Recipient"));
            }
            let sender = query_user_summary(conn, sender_id)?.ok_or(Error::NotFound("Sender"))?;

            let created_at = next_created_at(conn)?;
            conn.execute(
                "INSERT INTO messages (sender_id, recipient_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![sender_id, recipient_id, content, created_at],
            )?;

            Ok(MessageRow {
                id: conn.last_insert_rowid(),
                sender_id: sender_id.to_string(),
                recipient_id: recipient_id.to_string(),
                content: content.to_string(),
                created_at,
                sender,
            })
        })?;

        debug!(
            "Message {} stored from {} to {}",
            message.id, message.sender_id, message.recipient_id
        );
        Ok(message)
    }

    /// Messages exchanged between two users in reading order, plus the
    /// total count for the pair.
    pub fn list_messages_between(
        &self,
        user_a: &str,
        user_b: &str,
        page: PageRequest,
    ) -> Result<(Vec<MessageRow>, u64)> {
        self.with_conn(|conn| query_messages_between(conn, user_a, user_b, page))
    }
}

/// Store-assigned creation time, never earlier than the newest message.
/// Must run inside the insert transaction so `(created_at, id)` follows commit order.
fn next_created_at(conn: &Connection) -> Result<String> {
    let now = now_timestamp();
    let latest: Option<String> = conn
        .query_row("SELECT MAX(created_at) FROM messages", [], |r| r.get(0))
        .optional()?
        .flatten();

    Ok(match latest {
        Some(latest) if latest > now => latest,
        _ => now,
    })
}

pub(crate) fn query_messages_between(
    conn: &Connection,
    user_a: &str,
    user_b: &str,
    page: PageRequest,
) -> Result<(Vec<MessageRow>, u64)> {
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM messages
         WHERE (sender_id = ?1 AND recipient_id = ?2) OR (sender_id = ?2 AND recipient_id = ?1)",
        [user_a, user_b],
        |r| r.get(0),
    )?;

    let sql = format!(
        "SELECT {MESSAGE_COLUMNS}
         FROM messages m
         JOIN users u ON m.sender_id = u.id
         WHERE (m.sender_id = ?1 AND m.recipient_id = ?2)
            OR (m.sender_id = ?2 AND m.recipient_id = ?1)
         ORDER BY m.created_at ASC, m.id ASC
         LIMIT ?3 OFFSET ?4"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            rusqlite::params![user_a, user_b, page.limit as i64, page.offset() as i64],
            map_message_row,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok((rows, total as u64))
}
