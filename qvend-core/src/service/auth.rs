use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, SaltString};
use argon2::{Argon2, PasswordVerifier};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{config::AuthConfig, Error, Result};

/// Claims carried by an admin session token
#[derive(Debug, Serialize, Deserialize)]
pub struct AdminClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Single-administrator authentication.
///
/// The console is gated by one admin password (argon2-hashed); a
/// successful login yields a short-lived HS256 bearer token that the
/// state-changing endpoints require.
#[derive(Clone)]
pub struct AdminAuthService {
    password_hash: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl_hours: u64,
}

impl std::fmt::Debug for AdminAuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminAuthService").finish()
    }
}

impl AdminAuthService {
    /// Build from configuration. A plain `admin_password` is hashed at
    /// startup when no PHC hash is configured (development convenience).
    pub fn new(config: &AuthConfig) -> Result<Self> {
        if config.token_secret.is_empty() {
            return Err(Error::Internal(
                "auth.token_secret is not configured".to_string(),
            ));
        }

        let password_hash = if config.admin_password_hash.is_empty() {
            if config.admin_password.is_empty() {
                return Err(Error::Internal(
                    "no admin password configured".to_string(),
                ));
            }
            hash_password(&config.admin_password)?
        } else {
            config.admin_password_hash.clone()
        };

        Ok(Self {
            password_hash,
            encoding_key: EncodingKey::from_secret(config.token_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.token_secret.as_bytes()),
            token_ttl_hours: config.token_ttl_hours,
        })
    }

    /// Verify the admin password and issue a bearer token
    pub fn login(&self, password: &str) -> Result<String> {
        let parsed = PasswordHash::new(&self.password_hash)
            .map_err(|e| Error::Internal(format!("stored password hash is invalid: {e}")))?;

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| Error::Authentication("Invalid password".to_string()))?;

        let now = Utc::now().timestamp();
        let claims = AdminClaims {
            sub: "admin".to_string(),
            iat: now,
            exp: now + (self.token_ttl_hours as i64) * 3600,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| Error::Internal(format!("failed to sign token: {e}")))
    }

    /// Lifetime of issued tokens, in seconds
    #[must_use]
    pub const fn token_ttl_seconds(&self) -> u64 {
        self.token_ttl_hours * 3600
    }

    /// Validate a bearer token and return its claims
    pub fn verify(&self, token: &str) -> Result<AdminClaims> {
        decode::<AdminClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| Error::Authentication(format!("Invalid token: {e}")))
    }
}

/// Hash a password with argon2 and a fresh salt
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Internal(format!("failed to hash password: {e}")))
}
