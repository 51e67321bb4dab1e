//! Rating aggregator: keeps `users.average_rating` / `users.total_reviews`
//! equal to the mean and count of the reviews ledger for that user.
//!
//! The pair is always recomputed from the ledger rather than adjusted
//! incrementally, and only ever inside the transaction of the review write
//! that changed it.

use coffeechat_types::models::RatingDistribution;
use rusqlite::Connection;
use tracing::debug;

use crate::models::RatingAggregate;
use crate::users::user_exists;
use crate::{Database, Error, Result};

impl Database {
    /// Stored aggregate for a user, `None` if the user is unknown.
    pub fn get_rating(&self, user_id: &str) -> Result<Option<RatingAggregate>> {
        Ok(self.get_user(user_id)?.map(|user| RatingAggregate {
            average_rating: user.average_rating,
            total_reviews: user.total_reviews,
        }))
    }

    pub fn rating_distribution(&self, user_id: &str) -> Result<RatingDistribution> {
        self.with_conn(|conn| {
            if !user_exists(conn, user_id)? {
                return Err(Error::NotFound("User"));
            }
            query_distribution(conn, user_id)
        })
    }

    /// Users whose stored aggregate no longer matches the ledger.
    pub fn find_rating_drift(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id
                 FROM users u
                 LEFT JOIN (
                     SELECT reviewee_id, AVG(rating) AS avg_rating, COUNT(*) AS n
                     FROM reviews GROUP BY reviewee_id
                 ) r ON r.reviewee_id = u.id
                 WHERE u.total_reviews <> COALESCE(r.n, 0)
                    OR u.average_rating <> COALESCE(r.avg_rating, 0.0)
                 ORDER BY u.id",
            )?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(ids)
        })
    }
}

/// Recompute the aggregate for `reviewee_id` from every ledger row and write
/// it onto the user. Must be called on the transaction of the triggering
/// review write; an error here aborts that transaction.
pub(crate) fn recompute(conn: &Connection, reviewee_id: &str) -> Result<RatingAggregate> {
    let (average_rating, total_reviews): (f64, i64) = conn.query_row(
        "SELECT COALESCE(AVG(rating), 0.0), COUNT(*) FROM reviews WHERE reviewee_id = ?1",
        [reviewee_id],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;

    let updated = conn.execute(
        "UPDATE users SET average_rating = ?1, total_reviews = ?2 WHERE id = ?3",
        rusqlite::params![average_rating, total_reviews, reviewee_id],
    )?;
    if updated != 1 {
        return Err(Error::NotFound("User"));
    }

    debug!(
        "Rating for {} recomputed: avg={} count={}",
        reviewee_id, average_rating, total_reviews
    );
    Ok(RatingAggregate {
        average_rating,
        total_reviews: total_reviews as u64,
    })
}

pub(crate) fn query_distribution(conn: &Connection, user_id: &str) -> Result<RatingDistribution> {
    let mut stmt = conn.prepare(
        "SELECT rating, COUNT(*) FROM reviews WHERE reviewee_id = ?1 GROUP BY rating",
    )?;

    let mut dist = RatingDistribution::default();
    let rows = stmt.query_map([user_id], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?)))?;
    for row in rows {
        let (rating, count) = row?;
        dist.record(rating, count as u64);
    }
    Ok(dist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{open_db, seed_users};

    fn assert_aggregate(db: &Database, user: &str, avg: f64, count: u64) {
        let agg = db.get_rating(user).unwrap().unwrap();
        assert!(
            (agg.average_rating - avg).abs() < 1e-9,
            "expected avg {avg}, got {}",
            agg.average_rating
        );
        assert_eq!(agg.total_reviews, count);
    }

    #[test]
    fn aggregate_tracks_each_write() {
        let (_dir, db) = open_db();
        seed_users(&db, &["u1", "r1", "r2", "r3"]);

        assert_aggregate(&db, "u1", 0.0, 0);

        db.create_review("r1", "u1", 5, None).unwrap();
        assert_aggregate(&db, "u1", 5.0, 1);

        db.create_review("r2", "u1", 5, None).unwrap();
        assert_aggregate(&db, "u1", 5.0, 2);

        let third = db.create_review("r3", "u1", 3, Some("ok".into())).unwrap();
        assert_aggregate(&db, "u1", 13.0 / 3.0, 3);

        db.update_review(&third.id, "r3", 4, None).unwrap();
        assert_aggregate(&db, "u1", 14.0 / 3.0, 3);

        assert!(db.find_rating_drift().unwrap().is_empty());
    }

    #[test]
    fn distribution_is_dense_and_sums_to_total() {
        let (_dir, db) = open_db();
        seed_users(&db, &["u1", "r1", "r2", "r3"]);
        db.create_review("r1", "u1", 5, None).unwrap();
        db.create_review("r2", "u1", 5, None).unwrap();
        db.create_review("r3", "u1", 2, None).unwrap();

        let dist = db.rating_distribution("u1").unwrap();
        let counts: Vec<u64> = dist.buckets().iter().map(|b| b.count).collect();
        assert_eq!(counts, [0, 1, 0, 0, 2]);
        assert_eq!(dist.total(), db.get_rating("u1").unwrap().unwrap().total_reviews);

        assert!(matches!(db.rating_distribution("ghost"), Err(Error::NotFound(_))));
    }

    #[test]
    fn failed_recompute_rolls_back_review() {
        let (_dir, db) = open_db();
        seed_users(&db, &["u1", "r1"]);
        db.with_tx(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER reject_aggregate BEFORE UPDATE OF average_rating ON users
                 BEGIN SELECT RAISE(ABORT, 'aggregate write rejected'); END;",
            )?;
            Ok(())
        })
        .unwrap();

        let result = db.create_review("r1", "u1", 4, None);
        assert!(matches!(result, Err(Error::Sqlite(_))));

        let total: i64 = db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM reviews", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(total, 0);
        assert_aggregate(&db, "u1", 0.0, 0);
    }

    #[test]
    fn failed_recompute_rolls_back_update() {
        let (_dir, db) = open_db();
        seed_users(&db, &["u1", "r1"]);
        let review = db.create_review("r1", "u1", 2, Some("first".into())).unwrap();
        db.with_tx(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER reject_aggregate BEFORE UPDATE OF average_rating ON users
                 BEGIN SELECT RAISE(ABORT, 'aggregate write rejected'); END;",
            )?;
            Ok(())
        })
        .unwrap();

        let result = db.update_review(&review.id, "r1", 5, Some("second".into()));
        assert!(matches!(result, Err(Error::Sqlite(_))));

        let stored = db.get_review(&review.id).unwrap().unwrap();
        assert_eq!(stored.rating, 2);
        assert_eq!(stored.feedback.as_deref(), Some("first"));
        assert_eq!(stored.updated_at, review.updated_at);
        assert_aggregate(&db, "u1", 2.0, 1);
        assert!(db.find_rating_drift().unwrap().is_empty());
    }

    #[test]
    fn drift_is_detected() {
        let (_dir, db) = open_db();
        seed_users(&db, &["u1", "r1"]);
        db.create_review("r1", "u1", 4, None).unwrap();

        db.with_tx(|conn| {
            conn.execute("UPDATE users SET total_reviews = 7 WHERE id = 'u1'", [])?;
            Ok(())
        })
        .unwrap();

        assert_eq!(db.find_rating_drift().unwrap(), ["u1"]);
    }
}
