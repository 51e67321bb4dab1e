use coffeechat_types::models::UserSummary;
use rusqlite::{Connection, OptionalExtension};

use crate::models::UserRow;
use crate::{Database, Result, now_timestamp};

impl Database {
    /// Provision or refresh a profile vouched for by the identity provider.
    /// The rating aggregate columns are left untouched on refresh.
    pub fn upsert_user(&self, id: &str, name: &str, image: Option<&str>) -> Result<()> {
        self.with_tx(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, image, created_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name, image = excluded.image",
                rusqlite::params![id, name, image, now_timestamp()],
            )?;
            Ok(())
        })
    }

    pub fn get_user(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, id))
    }

    /// Batch-fetch public profiles. Unknown ids are skipped.
    pub fn get_user_summaries(&self, ids: &[String]) -> Result<Vec<UserSummary>> {
        self.with_conn(|conn| query_user_summaries(conn, ids))
    }
}

pub(crate) fn query_user(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, image, average_rating, total_reviews, created_at
         FROM users WHERE id = ?1",
    )?;

    let row = stmt
        .query_row([id], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                name: row.get(1)?,
                image: row.get(2)?,
                average_rating: row.get(3)?,
                total_reviews: row.get::<_, i64>(4)? as u64,
                created_at: row.get(5)?,
            })
        })
        .optional()?;

    Ok(row)
}

pub(crate) fn query_user_summary(conn: &Connection, id: &str) -> Result<Option<UserSummary>> {
    let summary = conn
        .query_row(
            "SELECT id, name, image FROM users WHERE id = ?1",
            [id],
            |row| {
                Ok(UserSummary {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    image: row.get(2)?,
                })
            },
        )
        .optional()?;

    Ok(summary)
}

pub(crate) fn user_exists(conn: &Connection, id: &str) -> Result<bool> {
    let found = conn
        .query_row("SELECT 1 FROM users WHERE id = ?1", [id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

/// Bound parameters per `IN (...)` lookup, well under SQLite's variable limit.
const IDS_PER_QUERY: usize = 500;

pub(crate) fn query_user_summaries(conn: &Connection, ids: &[String]) -> Result<Vec<UserSummary>> {
    let mut summaries = Vec::with_capacity(ids.len());

    for chunk in ids.chunks(IDS_PER_QUERY) {
        let placeholders: Vec<String> = (1..=chunk.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "SELECT id, name, image FROM users WHERE id IN ({})",
            placeholders.join(", ")
        );

        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(chunk.iter()), |row| {
            Ok(UserSummary {
                id: row.get(0)?,
                name: row.get(1)?,
                image: row.get(2)?,
            })
        })?;
        for row in rows {
            summaries.push(row?);
        }
    }

    Ok(summaries)
}
