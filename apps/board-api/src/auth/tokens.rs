//! Bearer token validation.
//!
//! Crewboard does not issue credentials; the identity service does. This
//! module only validates the HS256 tokens it mints. `mint` exists for the
//! test suites and local tooling.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by a Crewboard access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id (`usr_` prefixed).
    pub sub: String,
    /// Display name at issuance time.
    pub name: String,
    pub iat: u64,
    pub exp: u64,
}

/// Validate a token and return its claims.
pub fn verify(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )?;
    Ok(data.claims)
}

/// Mint a token. Used by tests and local tooling only; production tokens
/// come from the identity service sharing the same secret.
pub fn mint(
    secret: &str,
    user_id: &str,
    display_name: &str,
    ttl_secs: u64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock before Unix epoch")
        .as_secs();
    let claims = Claims {
        sub: user_id.to_string(),
        name: display_name.to_string(),
        iat: now,
        exp: now + ttl_secs,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_tokens_verify() {
        let token = mint("test-secret", "usr_1", "Bob", 60).unwrap();
        let claims = verify("test-secret", &token).unwrap();
        assert_eq!(claims.sub, "usr_1");
        assert_eq!(claims.name, "Bob");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = mint("test-secret", "usr_1", "Bob", 60).unwrap();
        assert!(verify("other-secret", &token).is_err());
    }

    #[test]
    fn garbage_tokens_are_rejected() {
        assert!(verify("test-secret", "not-a-jwt").is_err());
    }
}
