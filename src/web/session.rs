//! Verification of identity tokens minted by the external auth provider.
//! Token: `base64(user_id|email|exp).base64(hmac_sha256(payload))`.
use crate::domain::models::UserProfile;
use crate::state::SharedState;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, HeaderMap, StatusCode},
};
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionClaims {
    pub user_id: Uuid,
    pub email: String,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SessionError {
    #[error("invalid token format")]
    Invalid,
    #[error("signature mismatch")]
    Signature,
    #[error("expired")]
    Expired,
}

/// Tokens are minted by the auth provider; this signer only backs tests.
#[cfg(test)]
pub fn sign_session(
    user_id: Uuid,
    email: &str,
    ttl: chrono::Duration,
    key: &[u8],
) -> Result<String, SessionError> {
    if email.contains('|') {
        return Err(SessionError::Invalid);
    }
    let exp = Utc::now() + ttl;
    let payload = format!("{}|{}|{}", user_id, email, exp.timestamp());
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SessionError::Invalid)?;
    mac.update(payload.as_bytes());
    let sig = mac.finalize().into_bytes();
    Ok(format!(
        "{}.{}",
        general_purpose::STANDARD.encode(payload.as_bytes()),
        general_purpose::STANDARD.encode(sig)
    ))
}

pub fn verify_session(token: &str, key: &[u8]) -> Result<SessionClaims, SessionError> {
    let (payload_b64, sig_b64) = token.split_once('.').ok_or(SessionError::Invalid)?;
    let payload_bytes = general_purpose::STANDARD
        .decode(payload_b64)
        .map_err(|_| SessionError::Invalid)?;
    let sig_bytes = general_purpose::STANDARD
        .decode(sig_b64)
        .map_err(|_| SessionError::Invalid)?;

    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SessionError::Invalid)?;
    mac.update(&payload_bytes);
    mac.verify_slice(&sig_bytes)
        .map_err(|_| SessionError::Signature)?;

    let payload = String::from_utf8(payload_bytes).map_err(|_| SessionError::Invalid)?;
    let pieces: Vec<&str> = payload.split('|').collect();
    let [user_id, email, exp] = pieces.as_slice() else {
        return Err(SessionError::Invalid);
    };
    let user_id = Uuid::parse_str(user_id).map_err(|_| SessionError::Invalid)?;
    let exp: i64 = exp.parse().map_err(|_| SessionError::Invalid)?;
    if Utc::now().timestamp() > exp {
        return Err(SessionError::Expired);
    }
    Ok(SessionClaims {
        user_id,
        email: email.to_string(),
        exp,
    })
}

pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth) = headers.get(axum::http::header::AUTHORIZATION) {
        if let Ok(val) = auth.to_str() {
            if let Some(bearer) = val.strip_prefix("Bearer ") {
                return Some(bearer.trim().to_string());
            }
        }
    }
    if let Some(cookie) = headers.get(axum::http::header::COOKIE) {
        if let Ok(val) = cookie.to_str() {
            for pair in val.split(';') {
                if let Some(rest) = pair.trim().strip_prefix("session=") {
                    return Some(rest.to_string());
                }
            }
        }
    }
    None
}

/// Authenticated caller plus the profile they set up, if any.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub profile: Option<UserProfile>,
}

impl AuthUser {
    pub fn display_name(&self) -> String {
        match &self.profile {
            Some(p) if !p.name.trim().is_empty() => p.name.clone(),
            _ if !self.email.is_empty() => self.email.clone(),
            _ => "Unknown".to_string(),
        }
    }

    pub fn is_staff(&self) -> bool {
        self.profile
            .as_ref()
            .map_or(false, |p| p.is_active && p.role.is_staff())
    }
}

async fn authenticate(headers: &HeaderMap, state: &SharedState) -> Result<AuthUser, StatusCode> {
    let token = extract_token(headers).ok_or(StatusCode::UNAUTHORIZED)?;

    let claims = verify_session(&token, &state.session_key).map_err(|e| {
        tracing::warn!("Session verification failed: {}", e);
        StatusCode::UNAUTHORIZED
    })?;

    let profile = state.store.get_profile(claims.user_id).await.map_err(|e| {
        tracing::error!("Profile lookup failed for {}: {}", claims.user_id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    if matches!(&profile, Some(p) if !p.is_active) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(AuthUser {
        user_id: claims.user_id,
        email: claims.email,
        profile,
    })
}

/// Rejects requests without a valid token.
pub struct UserSession(pub AuthUser);

/// Requires an active `authority` or `admin` profile.
pub struct StaffSession(pub AuthUser);

/// `None` when no token is sent; an invalid token is still rejected.
pub struct OptionalSession(pub Option<AuthUser>);

#[async_trait]
impl<S> FromRequestParts<S> for UserSession
where
    S: Send + Sync,
    SharedState: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let shared = SharedState::from_ref(state);
        authenticate(&parts.headers, &shared).await.map(UserSession)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for StaffSession
where
    S: Send + Sync,
    SharedState: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let shared = SharedState::from_ref(state);
        let user = authenticate(&parts.headers, &shared).await?;
        if !user.is_staff() {
            tracing::warn!("Staff-only route refused for user {}", user.user_id);
            return Err(StatusCode::FORBIDDEN);
        }
        Ok(StaffSession(user))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for OptionalSession
where
    S: Send + Sync,
    SharedState: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if extract_token(&parts.headers).is_none() {
            return Ok(OptionalSession(None));
        }
        let shared = SharedState::from_ref(state);
        authenticate(&parts.headers, &shared)
            .await
            .map(|user| OptionalSession(Some(user)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

    #[test]
    fn test_sign_and_verify() {
        let user_id = Uuid::new_v4();
        let token = sign_session(user_id, "warden@hostel.edu", Duration::hours(1), KEY).unwrap();
        let claims = verify_session(&token, KEY).unwrap();
        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.email, "warden@hostel.edu");
    }

    #[test]
    fn test_tampered_token_fails() {
        let token = sign_session(Uuid::new_v4(), "a@b.c", Duration::hours(1), KEY).unwrap();
        let (_, sig) = token.split_once('.').unwrap();
        let forged_payload =
            general_purpose::STANDARD.encode(format!("{}|x@y.z|9999999999", Uuid::new_v4()));
        let forged = format!("{}.{}", forged_payload, sig);
        assert_eq!(verify_session(&forged, KEY), Err(SessionError::Signature));
        assert_eq!(
            verify_session(&token, b"another-key-another-key-another!"),
            Err(SessionError::Signature)
        );
        assert_eq!(verify_session("garbage", KEY), Err(SessionError::Invalid));
    }

    #[test]
    fn test_expired_token() {
        let token = sign_session(Uuid::new_v4(), "a@b.c", Duration::hours(-1), KEY).unwrap();
        assert_eq!(verify_session(&token, KEY), Err(SessionError::Expired));
    }

    #[test]
    fn test_extract_token_sources() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_token(&headers), None);
        headers.insert("cookie", "theme=dark; session=abc.def".parse().unwrap());
        assert_eq!(extract_token(&headers).as_deref(), Some("abc.def"));
        headers.insert("authorization", "Bearer tok.sig".parse().unwrap());
        assert_eq!(extract_token(&headers).as_deref(), Some("tok.sig"));
    }
}
