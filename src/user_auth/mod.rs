//! JWT validation
//!
//! Token issuance lives in the identity service; this module only
//! validates bearer tokens and injects the claims into the request.

pub mod middleware;

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // Subject (user_id as string)
    pub exp: usize,  // Expiration time (as UTC timestamp)
    pub iat: usize,  // Issued at
    /// Administrative role flag, set by the identity service.
    #[serde(default)]
    pub admin: bool,
}

impl Claims {
    pub fn user_id(&self) -> i64 {
        self.sub.parse().unwrap_or_default()
    }
}

/// Validates bearer tokens against the shared JWT secret.
#[derive(Clone)]
pub struct AuthVerifier {
    jwt_secret: String,
}

impl AuthVerifier {
    pub fn new(jwt_secret: String) -> Self {
        Self { jwt_secret }
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )?;
        Ok(data.claims)
    }
}
