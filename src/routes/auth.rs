use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::convert::Infallible;
use tracing::debug;

use crate::app_state::AppState;

/// Claims read from the bearer token. Tokens issued by the account service
/// carry `user_id`; `sub` is accepted as a fallback.
#[derive(Debug, Clone, Deserialize)]
struct Claims {
    user_id: Option<serde_json::Value>,
    sub: Option<String>,
}

/// Resolves the submitter identity from an HS256 bearer token.
///
/// Without a configured secret every request is anonymous.
pub struct OwnerResolver {
    key: Option<DecodingKey>,
    validation: Validation,
}

impl OwnerResolver {
    pub fn new(secret: Option<&str>) -> Self {
        Self {
            key: secret
                .filter(|s| !s.is_empty())
                .map(|s| DecodingKey::from_secret(s.as_bytes())),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Returns the owner id for a valid token; invalid or missing tokens
    /// resolve to `None`.
    pub fn resolve(&self, token: &str) -> Option<String> {
        let key = self.key.as_ref()?;
        let claims = match decode::<Claims>(token, key, &self.validation) {
            Ok(data) => data.claims,
            Err(e) => {
                debug!(error = %e, "Ignoring invalid bearer token");
                return None;
            }
        };

        match claims.user_id {
            Some(serde_json::Value::String(id)) => Some(id),
            Some(serde_json::Value::Number(id)) => Some(id.to_string()),
            _ => claims.sub,
        }
    }
}

/// The caller's identity when a valid bearer token was sent.
#[derive(Debug, Clone)]
pub struct MaybeOwner(pub Option<String>);

impl FromRequestParts<AppState> for MaybeOwner {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let owner = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .and_then(|token| state.auth.resolve(token.trim()));
        Ok(MaybeOwner(owner))
    }
}
