use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (users, messages, reviews)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                name            TEXT NOT NULL,
                image           TEXT,
                average_rating  REAL NOT NULL DEFAULT 0
                                CHECK (average_rating >= 0 AND average_rating <= 5),
                total_reviews   INTEGER NOT NULL DEFAULT 0 CHECK (total_reviews >= 0),
                created_at      TEXT NOT NULL
            );

            CREATE TABLE messages (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                sender_id       TEXT NOT NULL REFERENCES users(id),
                recipient_id    TEXT NOT NULL REFERENCES users(id),
                content         TEXT NOT NULL,
                created_at      TEXT NOT NULL,
                CHECK (sender_id <> recipient_id)
            );

            CREATE INDEX idx_messages_pair
                ON messages(sender_id, recipient_id, created_at, id);
            CREATE INDEX idx_messages_recipient
                ON messages(recipient_id, created_at);
            CREATE INDEX idx_messages_created
                ON messages(created_at);

            CREATE TABLE reviews (
                id              TEXT PRIMARY KEY,
                reviewer_id     TEXT NOT NULL REFERENCES users(id),
                reviewee_id     TEXT NOT NULL REFERENCES users(id),
                rating          INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
                feedback        TEXT,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL,
                UNIQUE (reviewer_id, reviewee_id),
                CHECK (reviewer_id <> reviewee_id)
            );

            CREATE INDEX idx_reviews_reviewee
                ON reviews(reviewee_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }
}
