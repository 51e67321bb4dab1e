use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::run_db;

/// Resolve the caller, make sure their user row exists, and stash the
/// `Principal` in request extensions for handlers.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = state.resolver.resolve(req.headers())?;

    let p = principal.clone();
    run_db(&state, move |db| {
        let current = db.get_user(&p.user_id)?;
        let stale = current.is_none_or(|u| u.name != p.name || u.image != p.image);
        if stale {
            debug!("Syncing profile for {}", p.user_id);
            db.upsert_user(&p.user_id, &p.name, p.image.as_deref())?;
        }
        Ok(())
    })
    .await?;

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}
