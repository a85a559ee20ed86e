use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Claims carried by an opaque bearer token presented as `player:authenticate
/// {token}` (§6). Issuance is out of scope; this crate only resolves a
/// token to a `playerId`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: i64,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("token is malformed or has an invalid signature")]
    Invalid,
}

/// Resolves bearer tokens to player ids. A trait so the websocket handler's
/// `player:authenticate` step can be exercised in tests without a real
/// signing key, grounded on the reference server's `auth::validate_token`
/// decode-only path (password hashing/issuance there has no counterpart
/// here).
pub trait TokenResolver: Send + Sync {
    fn resolve(&self, token: &str) -> Result<Uuid, TokenError>;
}

pub struct JwtResolver {
    secret: String,
}

impl JwtResolver {
    pub fn new(secret: impl Into<String>) -> Self {
        JwtResolver { secret: secret.into() }
    }
}

impl TokenResolver for JwtResolver {
    fn resolve(&self, token: &str) -> Result<Uuid, TokenError> {
        let data = decode::<Claims>(token, &DecodingKey::from_secret(self.secret.as_bytes()), &Validation::default())
            .map_err(|e| {
                if e.to_string().contains("expired") {
                    TokenError::Expired
                } else {
                    TokenError::Invalid
                }
            })?;
        Ok(data.claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token_for(player_id: Uuid, secret: &str, exp: i64) -> String {
        encode(&Header::default(), &Claims { sub: player_id, exp }, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn resolves_a_valid_token_to_its_player_id() {
        let resolver = JwtResolver::new("test-secret");
        let player_id = Uuid::new_v4();
        let token = token_for(player_id, "test-secret", (Utc::now() + Duration::hours(1)).timestamp());
        assert_eq!(resolver.resolve(&token).unwrap(), player_id);
    }

    #[test]
    fn rejects_an_expired_token() {
        let resolver = JwtResolver::new("test-secret");
        let token = token_for(Uuid::new_v4(), "test-secret", (Utc::now() - Duration::hours(1)).timestamp());
        assert_eq!(resolver.resolve(&token).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn rejects_a_token_signed_with_a_different_secret() {
        let resolver = JwtResolver::new("test-secret");
        let token = token_for(Uuid::new_v4(), "wrong-secret", (Utc::now() + Duration::hours(1)).timestamp());
        assert_eq!(resolver.resolve(&token).unwrap_err(), TokenError::Invalid);
    }
}
