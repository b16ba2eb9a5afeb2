//! Access-token verification for the socket handshake.
//!
//! Tokens are minted by the external login flow; this service only verifies
//! them (HS256 signature + expiry) and reads the user id out of the claims.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by an access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// The user id this token was issued for.
    pub sub: String,
    /// Expiry as a unix timestamp (seconds).
    pub exp: i64,
}

/// Verify an access token's signature and expiry, returning its claims.
pub fn verify_access_token(
    secret: &str,
    token: &str,
) -> Result<AccessTokenClaims, jsonwebtoken::errors::Error> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::new(Algorithm::HS256);
    let data = decode::<AccessTokenClaims>(token, &key, &validation)?;
    Ok(data.claims)
}
