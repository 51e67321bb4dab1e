use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::info;

use coffeechat_db::models::ReviewRow;
use coffeechat_types::api::{
    CreateReviewRequest, Envelope, PageQuery, ReviewResponse, ReviewsPage, UpdateReviewRequest,
};
use coffeechat_types::models::{PageRequest, Pagination};

use crate::auth::{AppState, Principal};
use crate::error::ApiError;
use crate::{run_db, to_utc};

const REVIEWS_DEFAULT_LIMIT: u32 = 10;
const REVIEWS_MAX_LIMIT: u32 = 50;

fn review_response(row: ReviewRow) -> ReviewResponse {
    ReviewResponse {
        created_at: to_utc(&row.created_at, "review", &row.id),
        updated_at: to_utc(&row.updated_at, "review", &row.id),
        id: row.id,
        reviewer_id: row.reviewer_id,
        reviewee_id: row.reviewee_id,
        rating: row.rating,
        feedback: row.feedback,
        reviewer: row.reviewer,
    }
}

/// POST /api/reviews
pub async fn create_review(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    WithRejection(Json(req), _): WithRejection<Json<CreateReviewRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let reviewer_id = principal.user_id;
    let row = run_db(&state, move |db| {
        db.create_review(&reviewer_id, &req.reviewee_id, req.rating, req.feedback)
    })
    .await?;

    info!("Review {} created for {}", row.id, row.reviewee_id);

    Ok((
        StatusCode::CREATED,
        Json(Envelope::new("Review created successfully", review_response(row))),
    ))
}

/// PUT /api/reviews/{review_id}
pub async fn update_review(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(review_id): Path<String>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateReviewRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let requester_id = principal.user_id;
    let row = run_db(&state, move |db| {
        db.update_review(&review_id, &requester_id, req.rating, req.feedback)
    })
    .await?;

    info!("Review {} updated", row.id);

    Ok(Json(Envelope::new("Review updated successfully", review_response(row))))
}

/// GET /api/reviews/user/{user_id}
pub async fn list_user_reviews(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    WithRejection(Query(query), _): WithRejection<Query<PageQuery>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let page = PageRequest::clamped(query.page, query.limit, REVIEWS_DEFAULT_LIMIT, REVIEWS_MAX_LIMIT);
    let rows = run_db(&state, move |db| db.list_reviews_for_user(&user_id, page)).await?;

    Ok(Json(Envelope::new(
        "Reviews retrieved successfully",
        ReviewsPage {
            reviews: rows.reviews.into_iter().map(review_response).collect(),
            rating_distribution: rows.distribution.buckets(),
            pagination: Pagination::new(page, rows.total),
        },
    )))
}
