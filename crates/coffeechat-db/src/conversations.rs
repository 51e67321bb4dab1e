//! Conversation index: per-user inbox and thread views derived from the
//! message ledger on every read. Nothing here is materialized, so an inbox
//! entry exists exactly when at least one message with that partner exists.

use coffeechat_types::models::{PageRequest, UserSummary};
use rusqlite::Connection;
use tracing::warn;

use crate::messages::{MESSAGE_COLUMNS, map_message_row, query_messages_between};
use crate::models::{ConversationRow, ThreadRows};
use crate::users::query_user_summary;
use crate::{Database, Error, Result};

impl Database {
    /// One entry per counterparty, most recent conversation first.
    pub fn list_conversations(&self, user_id: &str) -> Result<Vec<ConversationRow>> {
        self.with_conn(|conn| query_latest_per_partner(conn, user_id))
    }

    /// Full thread with one partner in reading order. Count, page and
    /// partner profile are read from the same snapshot.
    pub fn get_thread(&self, user_id: &str, partner_id: &str, page: PageRequest) -> Result<ThreadRows> {
        self.with_conn(|conn| {
            let other_user = query_user_summary(conn, partner_id)?.ok_or(Error::NotFound("User"))?;
            let (messages, total) = query_messages_between(conn, user_id, partner_id, page)?;
            Ok(ThreadRows {
                messages,
                other_user,
                total,
            })
        })
    }
}

/// Newest message per counterparty, ranked in SQL so only one row per
/// partner leaves the database. Ties on `created_at` go to the higher id.
fn query_latest_per_partner(conn: &Connection, user_id: &str) -> Result<Vec<ConversationRow>> {
    let sql = format!(
        "WITH ranked AS (
             SELECT id, partner_id,
                    ROW_NUMBER() OVER (
                        PARTITION BY partner_id ORDER BY created_at DESC, id DESC
                    ) AS rn
             FROM (
                 SELECT id, created_at,
                        CASE WHEN sender_id = ?1 THEN recipient_id ELSE sender_id END AS partner_id
                 FROM messages
                 WHERE (sender_id = ?1 OR recipient_id = ?1) AND sender_id <> recipient_id
             )
         )
         SELECT {MESSAGE_COLUMNS}, r.partner_id, p.name, p.image
         FROM ranked r
         JOIN messages m ON m.id = r.id
         JOIN users u ON m.sender_id = u.id
         LEFT JOIN users p ON p.id = r.partner_id
         WHERE r.rn = 1
         ORDER BY m.created_at DESC, m.id DESC"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([user_id], |row| {
        let last_message = map_message_row(row)?;
        let partner_id: String = row.get(7)?;
        let name: Option<String> = row.get(8)?;
        let image: Option<String> = row.get(9)?;
        Ok((last_message, partner_id, name, image))
    })?;

    let mut conversations = Vec::new();
    for row in rows {
        let (last_message, partner_id, name, image) = row?;
        let partner = match name {
            Some(name) => UserSummary {
                id: partner_id,
                name,
                image,
            },
            None => {
                warn!("Conversation partner '{}' has no user row", partner_id);
                UserSummary {
                    id: partner_id,
                    name: "unknown".to_string(),
                    image: None,
                }
            }
        };
        conversations.push(ConversationRow { partner, last_message });
    }

    Ok(conversations)
}
