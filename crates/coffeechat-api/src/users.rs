use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use coffeechat_types::api::{Envelope, UserRating};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::run_db;

/// GET /api/users/{user_id}/rating
pub async fn get_user_rating(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = user_id.clone();
    let aggregate = run_db(&state, move |db| db.get_rating(&uid))
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(Json(Envelope::new(
        "Rating retrieved successfully",
        UserRating {
            user_id,
            average_rating: aggregate.average_rating,
            total_reviews: aggregate.total_reviews,
        },
    )))
}
