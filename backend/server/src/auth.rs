//! # Sessions
//!
//! Sign-in happens against the hosted identity service; what reaches us is the
//! access token it issued. We verify it (HS256, shared secret) and read the
//! role out of `user_metadata`:
//!
//! - `is_admin: true` (or `isAdmin`) is the owner
//! - anyone else is the recipient
//!
//! Every coupon route takes a [`Session`], so the role always arrives as an
//! explicit [`Actor`] rather than something read from global state.
use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use bank::{Actor, Role};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{error::AppError, state::State};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, alias = "isAdmin")]
    pub is_admin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

impl SessionClaims {
    pub fn actor(&self) -> Actor {
        let username = self
            .user_metadata
            .username
            .clone()
            .filter(|name| !name.trim().is_empty())
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| self.sub.clone());

        Actor::new(username, Role::from_admin_flag(self.user_metadata.is_admin))
    }
}

#[derive(Clone)]
pub struct SessionVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl SessionVerifier {
    pub fn new(secret: &str, audience: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);

        match audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, AppError> {
        decode::<SessionClaims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AppError::Unauthorized("session expired".into()),
                _ => {
                    debug!("Rejected session token: {e}");
                    AppError::Unauthorized("invalid session".into())
                }
            })
    }
}

pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// The verified caller of a request.
#[derive(Debug, Clone)]
pub struct Session(pub Actor);

#[async_trait]
impl FromRequestParts<Arc<State>> for Session {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<State>) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("missing authorization header".into()))?;

        let token = bearer_token(header)
            .ok_or_else(|| AppError::Unauthorized("expected a bearer token".into()))?;

        let claims = state.verifier.verify(token)?;

        Ok(Session(claims.actor()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use jsonwebtoken::{EncodingKey, Header, encode};

    use super::*;

    const SECRET: &str = "test-secret-test-secret-test-secret";

    fn claims(username: Option<&str>, is_admin: bool, exp_offset: i64) -> SessionClaims {
        SessionClaims {
            sub: "3f1c".into(),
            exp: (Utc::now().timestamp() + exp_offset) as u64,
            email: Some("someone@example.com".into()),
            user_metadata: UserMetadata {
                username: username.map(str::to_string),
                is_admin,
            },
        }
    }

    fn sign(claims: &SessionClaims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_admin_flag_selects_owner() {
        let verifier = SessionVerifier::new(SECRET, None);

        let owner = verifier
            .verify(&sign(&claims(Some("alex"), true, 3600), SECRET))
            .unwrap()
            .actor();
        assert_eq!(owner, Actor::owner("alex"));

        let recipient = verifier
            .verify(&sign(&claims(Some("sam"), false, 3600), SECRET))
            .unwrap()
            .actor();
        assert_eq!(recipient, Actor::recipient("sam"));
    }

    #[test]
    fn test_camel_case_metadata() {
        let metadata: UserMetadata =
            serde_json::from_str(r#"{"username":"alex","isAdmin":true}"#).unwrap();

        assert!(metadata.is_admin);
    }

    #[test]
    fn test_username_fallbacks() {
        assert_eq!(claims(None, false, 0).actor().username, "someone@example.com");

        let mut anonymous = claims(Some("  "), false, 0);
        anonymous.email = None;
        assert_eq!(anonymous.actor().username, "3f1c");
    }

    #[test]
    fn test_rejects_bad_tokens() {
        let verifier = SessionVerifier::new(SECRET, None);

        let forged = sign(&claims(Some("alex"), true, 3600), "another-secret-another-secret");
        assert!(matches!(verifier.verify(&forged), Err(AppError::Unauthorized(_))));

        let expired = sign(&claims(Some("alex"), true, -3600), SECRET);
        assert!(matches!(
            verifier.verify(&expired),
            Err(AppError::Unauthorized(msg)) if msg == "session expired"
        ));
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Basic abc"), None);
    }
}
