/// Database row types. These map directly to SQLite rows and stay
/// independent of the wire types in coffeechat-types.
use coffeechat_types::models::{RatingDistribution, UserSummary};

pub struct UserRow {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
    pub average_rating: f64,
    pub total_reviews: u64,
    pub created_at: String,
}

impl UserRow {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            image: self.image.clone(),
        }
    }
}

/// A message joined with its sender's public profile.
#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: i64,
    pub sender_id: String,
    pub recipient_id: String,
    pub content: String,
    pub created_at: String,
    pub sender: UserSummary,
}

/// One inbox entry: a counterparty and the latest message exchanged with them.
#[derive(Debug, Clone)]
pub struct ConversationRow {
    pub partner: UserSummary,
    pub last_message: MessageRow,
}

pub struct ThreadRows {
    pub messages: Vec<MessageRow>,
    pub other_user: UserSummary,
    pub total: u64,
}

/// A review joined with its reviewer's public profile.
#[derive(Debug, Clone)]
pub struct ReviewRow {
    pub id: String,
    pub reviewer_id: String,
    pub reviewee_id: String,
    pub rating: u8,
    pub feedback: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub reviewer: UserSummary,
}

pub struct ReviewsPageRows {
    pub reviews: Vec<ReviewRow>,
    pub distribution: RatingDistribution,
    pub total: u64,
}

/// The denormalized `(averageRating, totalReviews)` pair stored on a user.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingAggregate {
    pub average_rating: f64,
    pub total_reviews: u64,
}
