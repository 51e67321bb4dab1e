use serde::{Deserialize, Serialize};

/// Upper bound on message content, counted in chars.
pub const MAX_MESSAGE_CHARS: usize = 1000;

/// Upper bound on review feedback, counted in chars.
pub const MAX_FEEDBACK_CHARS: usize = 500;

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

/// Public profile fields embedded wherever another user is referenced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Offset pagination request after server-side clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    /// Clamp raw query values: `page` is at least 1, `limit` falls in `1..=max_limit`.
    pub fn clamped(page: Option<u32>, limit: Option<u32>, default_limit: u32, max_limit: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).clamp(1, max_limit),
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.limit as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(req: PageRequest, total: u64) -> Self {
        Self {
            page: req.page,
            limit: req.limit,
            total,
            total_pages: total.div_ceil(req.limit as u64),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingBucket {
    pub rating: u8,
    pub count: u64,
}

/// Dense histogram of ratings 1..=5. Buckets with no reviews report 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RatingDistribution {
    counts: [u64; 5],
}

impl RatingDistribution {
    pub fn record(&mut self, rating: i64, count: u64) {
        if (MIN_RATING..=MAX_RATING).contains(&rating) {
            self.counts[(rating - MIN_RATING) as usize] += count;
        }
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn buckets(&self) -> Vec<RatingBucket> {
        self.counts
            .iter()
            .enumerate()
            .map(|(i, &count)| RatingBucket {
                rating: (i as i64 + MIN_RATING) as u8,
                count,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_request_clamps_bounds() {
        let req = PageRequest::clamped(Some(0), Some(10_000), 50, 100);
        assert_eq!(req, PageRequest { page: 1, limit: 100 });

        let req = PageRequest::clamped(None, Some(0), 50, 100);
        assert_eq!(req, PageRequest { page: 1, limit: 1 });

        let req = PageRequest::clamped(Some(3), None, 20, 100);
        assert_eq!(req.offset(), 40);
    }

    #[test]
    fn total_pages_rounds_up() {
        let req = PageRequest { page: 1, limit: 3 };
        assert_eq!(Pagination::new(req, 0).total_pages, 0);
        assert_eq!(Pagination::new(req, 3).total_pages, 1);
        assert_eq!(Pagination::new(req, 4).total_pages, 2);
    }

    #[test]
    fn distribution_is_dense() {
        let mut dist = RatingDistribution::default();
        dist.record(5, 2);
        dist.record(3, 1);

        let buckets = dist.buckets();
        assert_eq!(buckets.len(), 5);
        assert_eq!(buckets[0], RatingBucket { rating: 1, count: 0 });
        assert_eq!(buckets[2], RatingBucket { rating: 3, count: 1 });
        assert_eq!(buckets[4], RatingBucket { rating: 5, count: 2 });
        assert_eq!(dist.total(), 3);
    }
}
