use std::sync::Arc;

use axum::http::HeaderMap;
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use coffeechat_db::Database;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub resolver: Box<dyn PrincipalResolver>,
}

/// The authenticated caller of a request.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: String,
    pub name: String,
    pub image: Option<String>,
}

/// Maps an inbound request to an authenticated user, or rejects it.
pub trait PrincipalResolver: Send + Sync {
    fn resolve(&self, headers: &HeaderMap) -> Result<Principal, ApiError>;
}

/// Session token claims issued by the identity provider. `sub` is the stable user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub exp: usize,
}

/// Resolves HS256 bearer tokens signed with a shared secret.
pub struct JwtResolver {
    decoding_key: DecodingKey,
}

impl JwtResolver {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

impl PrincipalResolver for JwtResolver {
    fn resolve(&self, headers: &HeaderMap) -> Result<Principal, ApiError> {
        let bearer = headers
            .typed_get::<Authorization<Bearer>>()
            .ok_or(ApiError::Unauthorized)?;

        let token_data = decode::<Claims>(bearer.token(), &self.decoding_key, &Validation::default())
            .map_err(|_| ApiError::Unauthorized)?;

        let claims = token_data.claims;
        if claims.sub.is_empty() {
            return Err(ApiError::Unauthorized);
        }
        Ok(Principal {
            user_id: claims.sub,
            name: claims.name,
            image: claims.image,
        })
    }
}

/// Mint a session token. Used by development tooling and tests; production
/// tokens come from the identity provider.
pub fn create_token(secret: &str, principal: &Principal, ttl: chrono::Duration) -> Result<String, ApiError> {
    let claims = Claims {
        sub: principal.user_id.clone(),
        name: principal.name.clone(),
        image: principal.image.clone(),
        exp: (chrono::Utc::now() + ttl).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("token encoding failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    fn principal() -> Principal {
        Principal {
            user_id: "user-1".into(),
            name: "Ada".into(),
            image: None,
        }
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, format!("Bearer {token}").parse().unwrap());
        headers
    }

    #[test]
    fn resolves_valid_token() {
        let token = create_token("secret", &principal(), chrono::Duration::hours(1)).unwrap();
        let resolved = JwtResolver::new("secret").resolve(&bearer(&token)).unwrap();
        assert_eq!(resolved.user_id, "user-1");
        assert_eq!(resolved.name, "Ada");
    }

    #[test]
    fn rejects_missing_wrong_and_expired_tokens() {
        let resolver = JwtResolver::new("secret");
        assert!(matches!(resolver.resolve(&HeaderMap::new()), Err(ApiError::Unauthorized)));

        let forged = create_token("other", &principal(), chrono::Duration::hours(1)).unwrap();
        assert!(matches!(resolver.resolve(&bearer(&forged)), Err(ApiError::Unauthorized)));

        let expired = create_token("secret", &principal(), chrono::Duration::hours(-2)).unwrap();
        assert!(matches!(resolver.resolve(&bearer(&expired)), Err(ApiError::Unauthorized)));

        assert!(matches!(resolver.resolve(&bearer("not-a-jwt")), Err(ApiError::Unauthorized)));
    }
}
