//! Review ledger: at most one review per (reviewer, reviewee) pair. Every
//! write recomputes the reviewee's rating aggregate in the same transaction.

use coffeechat_types::models::{MAX_FEEDBACK_CHARS, MAX_RATING, MIN_RATING, PageRequest, UserSummary};
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::is_unique_violation;
use crate::models::{ReviewRow, ReviewsPageRows};
use crate::ratings::{query_distribution, recompute};
use crate::users::user_exists;
use crate::{Database, Error, Result, now_timestamp};

const REVIEW_COLUMNS: &str = "r.id, r.reviewer_id, r.reviewee_id, r.rating, r.feedback, \
     r.created_at, r.updated_at, u.name, u.image";

fn map_review_row(row: &Row<'_>) -> rusqlite::Result<ReviewRow> {
    let reviewer_id: String = row.get(1)?;
    Ok(ReviewRow {
        id: row.get(0)?,
        reviewee_id: row.get(2)?,
        rating: row.get(3)?,
        feedback: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        reviewer: UserSummary {
            id: reviewer_id.clone(),
            name: row.get(7)?,
            image: row.get(8)?,
        },
        reviewer_id,
    })
}

pub fn validate_rating(rating: i64) -> Result<u8> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(Error::InvalidInput(format!(
            "Rating must be between {} and {}",
            MIN_RATING, MAX_RATING
        )));
    }
    Ok(rating as u8)
}

pub fn validate_feedback(feedback: Option<&str>) -> Result<()> {
    if feedback.is_some_and(|f| f.chars().count() > MAX_FEEDBACK_CHARS) {
        return Err(Error::InvalidInput(format!(
            "Feedback must be at most {} characters",
            MAX_FEEDBACK_CHARS
        )));
    }
    Ok(())
}

impl Database {
    /// Record `reviewer_id`'s review of `reviewee_id`.
    ///
    /// Duplicate detection is the table's UNIQUE constraint, so two
    /// concurrent creates for the same pair cannot both succeed.
    pub fn create_review(
        &self,
        reviewer_id: &str,
        reviewee_id: &str,
        rating: i64,
        feedback: Option<String>,
    ) -> Result<ReviewRow> {
        if reviewee_id.is_empty() {
            return Err(Error::InvalidInput("Reviewee ID is required".into()));
        }
        let rating = validate_rating(rating)?;
        validate_feedback(feedback.as_deref())?;
        if reviewer_id == reviewee_id {
            return Err(Error::InvalidInput("Cannot review yourself".into()));
        }

        let review = self.with_tx(|conn| {
            if !user_exists(conn, reviewee_id)? {
                return Err(Error::NotFound("User"));
            }

            let id = Uuid::new_v4().to_string();
            let now = now_timestamp();
            conn.execute(
                "INSERT INTO reviews (id, reviewer_id, reviewee_id, rating, feedback, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                rusqlite::params![id, reviewer_id, reviewee_id, rating, feedback, now],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    warn!("Duplicate review from {} for {}", reviewer_id, reviewee_id);
                    Error::Conflict("You have already reviewed this user".into())
                } else {
                    Error::from(e)
                }
            })?;

            recompute(conn, reviewee_id)?;
            query_review(conn, &id)?.ok_or(Error::NotFound("Review"))
        })?;

        debug!("Review {} created by {} for {}", review.id, reviewer_id, reviewee_id);
        Ok(review)
    }

    /// Replace rating and feedback on an existing review. Only the original
    /// reviewer may do so; the reviewee never changes.
    pub fn update_review(
        &self,
        review_id: &str,
        requester_id: &str,
        rating: i64,
        feedback: Option<String>,
    ) -> Result<ReviewRow> {
        let rating = validate_rating(rating)?;
        validate_feedback(feedback.as_deref())?;

        let review = self.with_tx(|conn| {
            let (reviewer_id, reviewee_id): (String, String) = conn
                .query_row(
                    "SELECT reviewer_id, reviewee_id FROM reviews WHERE id = ?1",
                    [review_id],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )
                .optional()?
                .ok_or(Error::NotFound("Review"))?;

            if reviewer_id != requester_id {
                warn!("User {} attempted to update review {} owned by {}", requester_id, review_id, reviewer_id);
                return Err(Error::Forbidden("Can only update your own reviews".into()));
            }

            conn.execute(
                "UPDATE reviews SET rating = ?1, feedback = ?2, updated_at = ?3 WHERE id = ?4",
                rusqlite::params![rating, feedback, now_timestamp(), review_id],
            )?;

            recompute(conn, &reviewee_id)?;
            query_review(conn, review_id)?.ok_or(Error::NotFound("Review"))
        })?;

        debug!("Review {} updated by {}", review.id, requester_id);
        Ok(review)
    }

    pub fn get_review(&self, review_id: &str) -> Result<Option<ReviewRow>> {
        self.with_conn(|conn| query_review(conn, review_id))
    }

    /// Reviews received by `user_id`, newest first, with the rating
    /// histogram and total read from the same snapshot.
    pub fn list_reviews_for_user(&self, user_id: &str, page: PageRequest) -> Result<ReviewsPageRows> {
        self.with_conn(|conn| {
            if !user_exists(conn, user_id)? {
                return Err(Error::NotFound("User"));
            }

            let sql = format!(
                "SELECT {REVIEW_COLUMNS}
                 FROM reviews r
                 JOIN users u ON r.reviewer_id = u.id
                 WHERE r.reviewee_id = ?1
                 ORDER BY r.created_at DESC, r.id DESC
                 LIMIT ?2 OFFSET ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let reviews = stmt
                .query_map(
                    rusqlite::params![user_id, page.limit as i64, page.offset() as i64],
                    map_review_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let distribution = query_distribution(conn, user_id)?;
            Ok(ReviewsPageRows {
                reviews,
                total: distribution.total(),
                distribution,
            })
        })
    }
}

fn query_review(conn: &Connection, review_id: &str) -> Result<Option<ReviewRow>> {
    let sql = format!(
        "SELECT {REVIEW_COLUMNS}
         FROM reviews r
         JOIN users u ON r.reviewer_id = u.id
         WHERE r.id = ?1"
    );
    Ok(conn.query_row(&sql, [review_id], map_review_row).optional()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{open_db, seed_users};
    use std::sync::Arc;

    fn review_count(db: &Database) -> i64 {
        db.with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM reviews", [], |r| r.get(0))?))
            .unwrap()
    }

    #[test]
    fn create_embeds_reviewer_and_sets_timestamps() {
        let (_dir, db) = open_db();
        seed_users(&db, &["alice", "bob"]);

        let review = db.create_review("alice", "bob", 4, Some("Great tutor".into())).unwrap();
        assert_eq!(review.rating, 4);
        assert_eq!(review.feedback.as_deref(), Some("Great tutor"));
        assert_eq!(review.reviewer.name, "User alice");
        assert_eq!(review.created_at, review.updated_at);
        assert!(db.get_review(&review.id).unwrap().is_some());
    }

    #[test]
    fn self_review_is_rejected_without_a_row() {
        let (_dir, db) = open_db();
        seed_users(&db, &["alice"]);

        let result = db.create_review("alice", "alice", 5, None);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(review_count(&db), 0);
    }

    #[test]
    fn invalid_fields_are_rejected() {
        let (_dir, db) = open_db();
        seed_users(&db, &["alice", "bob"]);

        for rating in [0, 6, -1] {
            assert!(matches!(db.create_review("alice", "bob", rating, None), Err(Error::InvalidInput(_))));
        }
        let long = "x".repeat(MAX_FEEDBACK_CHARS + 1);
        assert!(matches!(db.create_review("alice", "bob", 3, Some(long)), Err(Error::InvalidInput(_))));
        assert_eq!(review_count(&db), 0);
    }

    #[test]
    fn unknown_reviewee_is_not_found() {
        let (_dir, db) = open_db();
        seed_users(&db, &["alice"]);

        assert!(matches!(db.create_review("alice", "ghost", 3, None), Err(Error::NotFound(_))));
    }

    #[test]
    fn duplicate_review_conflicts_and_leaves_aggregate() {
        let (_dir, db) = open_db();
        seed_users(&db, &["alice", "bob"]);

        db.create_review("alice", "bob", 5, None).unwrap();
        let result = db.create_review("alice", "bob", 1, None);
        assert!(matches!(result, Err(Error::Conflict(_))));

        let agg = db.get_rating("bob").unwrap().unwrap();
        assert_eq!(agg.total_reviews, 1);
        assert_eq!(agg.average_rating, 5.0);

        // The pair is directional.
        db.create_review("bob", "alice", 2, None).unwrap();
    }

    #[test]
    fn concurrent_creates_for_one_pair_admit_exactly_one() {
        let (_dir, db) = open_db();
        seed_users(&db, &["alice", "bob"]);
        let db = Arc::new(db);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let db = db.clone();
                std::thread::spawn(move || db.create_review("alice", "bob", 1 + (i % 5), None))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let created = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results.iter().filter(|r| matches!(r, Err(Error::Conflict(_)))).count();
        assert_eq!(created, 1);
        assert_eq!(conflicts, 7);
        assert_eq!(db.get_rating("bob").unwrap().unwrap().total_reviews, 1);
    }

    #[test]
    fn concurrent_creates_for_one_reviewee_lose_no_update() {
        let (_dir, db) = open_db();
        let reviewers: Vec<String> = (0..10).map(|i| format!("r{i}")).collect();
        seed_users(&db, &["target"]);
        for r in &reviewers {
            db.upsert_user(r, r, None).unwrap();
        }
        let db = Arc::new(db);

        let handles: Vec<_> = reviewers
            .into_iter()
            .enumerate()
            .map(|(i, reviewer)| {
                let db = db.clone();
                std::thread::spawn(move || db.create_review(&reviewer, "target", 1 + (i as i64 % 5), None))
            })
            .collect();
        for h in handles {
            h.join().unwrap().unwrap();
        }

        let agg = db.get_rating("target").unwrap().unwrap();
        assert_eq!(agg.total_reviews, 10);
        assert!((agg.average_rating - 3.0).abs() < 1e-9);
        assert!(db.find_rating_drift().unwrap().is_empty());
    }

    #[test]
    fn only_the_reviewer_may_update() {
        let (_dir, db) = open_db();
        seed_users(&db, &["alice", "bob", "mallory"]);
        let review = db.create_review("alice", "bob", 2, Some("meh".into())).unwrap();

        let result = db.update_review(&review.id, "mallory", 5, None);
        assert!(matches!(result, Err(Error::Forbidden(_))));
        assert_eq!(db.get_review(&review.id).unwrap().unwrap().rating, 2);

        let updated = db.update_review(&review.id, "alice", 5, None).unwrap();
        assert_eq!(updated.rating, 5);
        assert_eq!(updated.feedback, None);
        assert_eq!(updated.reviewee_id, "bob");
        assert!(updated.updated_at >= updated.created_at);
        assert_eq!(db.get_rating("bob").unwrap().unwrap().average_rating, 5.0);
    }

    #[test]
    fn update_of_unknown_review_is_not_found() {
        let (_dir, db) = open_db();
        seed_users(&db, &["alice"]);

        assert!(matches!(db.update_review("nope", "alice", 3, None), Err(Error::NotFound(_))));
    }

    #[test]
    fn listing_is_newest_first_with_distribution() {
        let (_dir, db) = open_db();
        seed_users(&db, &["target", "r1", "r2", "r3"]);
        db.create_review("r1", "target", 5, None).unwrap();
        db.create_review("r2", "target", 4, None).unwrap();
        db.create_review("r3", "target", 4, None).unwrap();

        let first = db.list_reviews_for_user("target", PageRequest { page: 1, limit: 2 }).unwrap();
        let second = db.list_reviews_for_user("target", PageRequest { page: 2, limit: 2 }).unwrap();

        assert_eq!(first.total, 3);
        assert_eq!(first.reviews.len(), 2);
        assert_eq!(second.reviews.len(), 1);
        assert_eq!(second.reviews[0].reviewer_id, "r1");
        assert!(first.reviews.iter().all(|r| r.id != second.reviews[0].id));
        assert_eq!(first.distribution.buckets()[3].count, 2);

        assert!(matches!(
            db.list_reviews_for_user("ghost", PageRequest { page: 1, limit: 10 }),
            Err(Error::NotFound(_))
        ));
    }
}
