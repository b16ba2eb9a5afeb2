//! Socket handshake authentication.
//!
//! Decides once, at upgrade time, whether a connection is trusted and which
//! user it belongs to. Rejections are fatal to the connection attempt but
//! never to the process; a rejected connection joins no room and receives a
//! single `socketError` frame before the server abandons it.

use crate::auth::tokens;
use crate::db::users::UserProfile;
use crate::AppState;

/// Cookie carrying the access token on the upgrade request.
pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";

/// Why a handshake was rejected. The message text is stable per category so
/// clients can tell an expired token from a missing one, but nothing more.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeError {
    MissingToken,
    InvalidToken,
    UnknownUser,
}

impl HandshakeError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::MissingToken => "unauthorized handshake: missing token",
            Self::InvalidToken => "unauthorized handshake: invalid token",
            Self::UnknownUser => "unauthorized handshake: unknown user",
        }
    }
}

/// Pick the credential for the handshake: the access-token cookie wins over
/// the explicit auth field when both are present. Empty values count as
/// absent, so a blank cookie falls back to the auth field.
pub fn select_token(cookie: Option<&str>, auth_field: Option<&str>) -> Option<String> {
    cookie
        .filter(|t| !t.is_empty())
        .or_else(|| auth_field.filter(|t| !t.is_empty()))
        .map(str::to_string)
}

/// Validate the presented token and resolve the identity it names.
///
/// Single attempt, read-only: a bad token is a client error, not a transient
/// fault, so there are no retries. Store failures funnel through the same
/// rejection path as a missing user.
pub async fn authenticate(
    state: &AppState,
    token: Option<&str>,
) -> Result<UserProfile, HandshakeError> {
    let token = token.ok_or(HandshakeError::MissingToken)?;

    let claims = tokens::verify_access_token(&state.config.access_token_secret, token)
        .map_err(|err| {
            tracing::debug!(?err, "access token failed verification");
            HandshakeError::InvalidToken
        })?;

    match state.users.find_by_id(&claims.sub).await {
        Ok(Some(profile)) => Ok(profile),
        Ok(None) => Err(HandshakeError::UnknownUser),
        Err(err) => {
            tracing::debug!(?err, user_id = %claims.sub, "user lookup failed during handshake");
            Err(HandshakeError::UnknownUser)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};

    use super::*;
    use crate::auth::tokens::AccessTokenClaims;
    use crate::config::Config;
    use crate::db::users::MemoryUserStore;
    use crate::socket::rooms::RoomRegistry;

    const SECRET: &str = "handshake-test-secret";

    fn test_state() -> (AppState, Arc<MemoryUserStore>) {
        let users = Arc::new(MemoryUserStore::new());
        let state = AppState {
            config: Arc::new(Config {
                access_token_secret: SECRET.to_string(),
                port: 0,
            }),
            users: users.clone(),
            rooms: Arc::new(RoomRegistry::new()),
        };
        (state, users)
    }

    fn seed_user(users: &MemoryUserStore, id: &str) {
        users.insert(UserProfile {
            id: id.to_string(),
            username: "tester".to_string(),
            email: "tester@example.com".to_string(),
            avatar_url: None,
            created_at: Utc::now(),
        });
    }

    fn mint(sub: &str, exp: i64) -> String {
        let claims = AccessTokenClaims {
            sub: sub.to_string(),
            exp,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn cookie_wins_over_auth_field() {
        assert_eq!(
            select_token(Some("from-cookie"), Some("from-auth")),
            Some("from-cookie".to_string())
        );
    }

    #[test]
    fn auth_field_used_when_no_cookie() {
        assert_eq!(
            select_token(None, Some("from-auth")),
            Some("from-auth".to_string())
        );
        assert_eq!(select_token(None, None), None);
    }

    #[test]
    fn empty_cookie_falls_back_to_auth_field() {
        assert_eq!(
            select_token(Some(""), Some("from-auth")),
            Some("from-auth".to_string())
        );
    }

    #[test]
    fn empty_values_count_as_missing() {
        assert_eq!(select_token(Some(""), None), None);
        assert_eq!(select_token(Some(""), Some("")), None);
        assert_eq!(select_token(None, Some("")), None);
    }

    #[tokio::test]
    async fn missing_token_is_rejected() {
        let (state, _) = test_state();
        let err = authenticate(&state, None).await.unwrap_err();
        assert_eq!(err, HandshakeError::MissingToken);
        assert_eq!(err.message(), "unauthorized handshake: missing token");
    }

    #[tokio::test]
    async fn invalid_token_is_rejected() {
        let (state, _) = test_state();
        let err = authenticate(&state, Some("garbage")).await.unwrap_err();
        assert_eq!(err, HandshakeError::InvalidToken);
    }

    #[tokio::test]
    async fn expired_token_is_rejected_as_invalid() {
        let (state, users) = test_state();
        seed_user(&users, "usr_1");
        let token = mint("usr_1", Utc::now().timestamp() - 3600);
        let err = authenticate(&state, Some(&token)).await.unwrap_err();
        assert_eq!(err, HandshakeError::InvalidToken);
        assert_eq!(err.message(), "unauthorized handshake: invalid token");
    }

    #[tokio::test]
    async fn unknown_user_is_rejected() {
        let (state, _) = test_state();
        let token = mint("usr_missing", Utc::now().timestamp() + 3600);
        let err = authenticate(&state, Some(&token)).await.unwrap_err();
        assert_eq!(err, HandshakeError::UnknownUser);
        assert_eq!(err.message(), "unauthorized handshake: unknown user");
    }

    #[tokio::test]
    async fn valid_token_resolves_the_profile() {
        let (state, users) = test_state();
        seed_user(&users, "usr_1");
        let token = mint("usr_1", Utc::now().timestamp() + 3600);
        let profile = authenticate(&state, Some(&token)).await.unwrap();
        assert_eq!(profile.id, "usr_1");
        assert_eq!(profile.username, "tester");
    }
}
