use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Dashboard tokens live for twelve hours.
pub const TOKEN_LIFETIME_SECS: i64 = 12 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Stable id for this login.
    pub sub: Uuid,
    pub username: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

pub fn generate_token(
    username: &str,
    role: &str,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: Uuid::new_v4(),
        username: username.to_string(),
        role: role.to_string(),
        exp: now + TOKEN_LIFETIME_SECS,
        iat: now,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
}

pub fn validate_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_ref()), &validation)
        .map(|data| data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_and_validate_token() {
        let token = generate_token("admin", "admin", "secret").expect("failed to generate token");
        let claims = validate_token(&token, "secret").expect("failed to validate token");
        assert_eq!(claims.username, "admin");
        assert_eq!(claims.role, "admin");
        assert!(claims.exp - claims.iat == TOKEN_LIFETIME_SECS);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_token("admin", "admin", "secret").unwrap();
        assert!(validate_token(&token, "other-secret").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: Uuid::new_v4(),
            username: "admin".into(),
            role: "admin".into(),
            exp: now - 100,
            iat: now - 1_000,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        assert!(validate_token(&token, "secret").is_err());
    }
}
