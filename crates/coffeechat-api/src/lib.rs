pub mod auth;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod reviews;
pub mod users;

use axum::{
    Json, Router,
    response::IntoResponse,
    routing::{get, post, put},
};
use chrono::{DateTime, Utc};
use tracing::{error, warn};

use coffeechat_db::Database;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::require_auth;

/// Build the HTTP surface. Reads of public reputation data are open; every
/// route that needs a writer identity sits behind `require_auth`.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api", get(index))
        .route("/api/health", get(health))
        .route("/api/reviews/user/{user_id}", get(reviews::list_user_reviews))
        .route("/api/users/{user_id}/rating", get(users::get_user_rating))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/messages", post(messages::send_message))
        .route("/api/messages/conversations", get(messages::list_conversations))
        .route("/api/messages/conversations/{user_id}", get(messages::get_thread))
        .route("/api/reviews", post(reviews::create_review))
        .route("/api/reviews/{review_id}", put(reviews::update_review))
        .layer(axum::middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok", "message": "CoffeeChat API is running" }))
}

async fn index() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Welcome to CoffeeChat API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "messages": "/api/messages",
            "reviews": "/api/reviews",
            "users": "/api/users",
        }
    }))
}

/// Run a blocking store call off the async runtime.
pub(crate) async fn run_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> coffeechat_db::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.to_string())
        })?
        .map_err(ApiError::from)
}

/// Parse a stored timestamp, logging instead of failing the request on a corrupt row.
pub(crate) fn to_utc(raw: &str, kind: &str, id: &str) -> DateTime<Utc> {
    coffeechat_db::parse_timestamp(raw).unwrap_or_else(|| {
        warn!("Corrupt timestamp '{}' on {} '{}'", raw, kind, id);
        DateTime::default()
    })
}
