//! Token issuance and the authorization gate.
//!
//! Every protected operation goes through one of the extractors below, which
//! verify the signed token and funnel role checks through [`authorize`] so
//! there is a single decision point for the whole capability set.

use async_trait::async_trait;
use axum::extract::{FromRequest, RequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::Duration;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::account::Role;
use crate::util;

pub const TOKEN_LIFETIME: Duration = Duration::days(1);

/// The legacy clients send their token in a bare `token` header instead of
/// an `Authorization` bearer token. Both are accepted.
pub const LEGACY_TOKEN_HEADER: &str = "token";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// The ID of the account the token was issued to
    pub sub: Uuid,
    /// The role the account held when it logged in
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(account_id: Uuid, role: Role) -> Self {
        let now = util::current_time();

        Self {
            sub: account_id,
            role,
            iat: now.unix_timestamp(),
            exp: (now + TOKEN_LIFETIME).unix_timestamp(),
        }
    }
}

pub fn issue_token(claims: &Claims, secret: &str) -> ApiResult<String> {
    jsonwebtoken::encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|err| ApiError::Internal(anyhow::anyhow!("Failed to sign token: {}", err)))
}

/// Verifies a token's signature and expiry.
///
/// Expired tokens fail with a distinct message so clients can prompt for a
/// re-login instead of treating the session as tampered with.
pub fn verify_token(token: &str, secret: &str) -> ApiResult<Claims> {
    jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|err| match err.kind() {
        ErrorKind::ExpiredSignature => ApiError::TokenExpired,
        _ => ApiError::Unauthorized,
    })
}

pub fn get_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_owned)
        .or_else(|| {
            headers
                .get(LEGACY_TOKEN_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned)
        })
}

/// The single role-gate decision for the closed set of roles.
pub fn authorize(claims: &Claims, allowed: &[Role]) -> ApiResult<()> {
    if allowed.contains(&claims.role) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "you do not have access to this resource".to_owned(),
        ))
    }
}

fn claims_from_request<B: Send>(req: &RequestParts<B>) -> ApiResult<Claims> {
    let token = get_token(req.headers()).ok_or(ApiError::Unauthorized)?;
    let secret = util::jwt_secret()?;

    verify_token(&token, &secret)
}

/// Any authenticated account.
pub struct User(pub Claims);

#[async_trait]
impl<B: Send> FromRequest<B> for User {
    type Rejection = ApiError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        claims_from_request(req).map(User)
    }
}

/// An authenticated organiser. Admins pass as well, since they may manage
/// any organiser-owned resource.
pub struct Organiser(pub Claims);

#[async_trait]
impl<B: Send> FromRequest<B> for Organiser {
    type Rejection = ApiError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let claims = claims_from_request(req)?;
        authorize(&claims, &[Role::Organiser, Role::Admin])?;

        Ok(Organiser(claims))
    }
}

/// An authenticated staff member.
pub struct Staff(pub Claims);

#[async_trait]
impl<B: Send> FromRequest<B> for Staff {
    type Rejection = ApiError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let claims = claims_from_request(req)?;
        authorize(&claims, &[Role::Staff])?;

        Ok(Staff(claims))
    }
}

/// An authenticated admin.
pub struct Admin(pub Claims);

#[async_trait]
impl<B: Send> FromRequest<B> for Admin {
    type Rejection = ApiError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let claims = claims_from_request(req)?;
        authorize(&claims, &[Role::Admin])?;

        Ok(Admin(claims))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn tokens_round_trip() {
        let claims = Claims::new(Uuid::new_v4(), Role::Staff);
        let token = issue_token(&claims, SECRET).unwrap();
        let decoded = verify_token(&token, SECRET).unwrap();

        assert_eq!(decoded, claims);
    }

    #[test]
    fn expired_tokens_fail_distinctly() {
        let mut claims = Claims::new(Uuid::new_v4(), Role::Organiser);
        // well past the default verification leeway
        claims.exp = claims.iat - 3600;

        let token = issue_token(&claims, SECRET).unwrap();
        match verify_token(&token, SECRET) {
            Err(ApiError::TokenExpired) => {}
            other => panic!("expected TokenExpired, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn tampered_tokens_are_invalid() {
        let claims = Claims::new(Uuid::new_v4(), Role::User);
        let token = issue_token(&claims, SECRET).unwrap();

        match verify_token(&token, "other-secret") {
            Err(ApiError::Unauthorized) => {}
            other => panic!("expected Unauthorized, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn role_gate_is_a_closed_set() {
        let staff = Claims::new(Uuid::new_v4(), Role::Staff);
        assert!(authorize(&staff, &[Role::Staff]).is_ok());
        assert!(authorize(&staff, &[Role::Organiser, Role::Admin]).is_err());

        let admin = Claims::new(Uuid::new_v4(), Role::Admin);
        assert!(authorize(&admin, &[Role::Organiser, Role::Admin]).is_ok());
    }

    #[test]
    fn both_token_headers_are_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(get_token(&headers).as_deref(), Some("abc123"));

        let mut headers = HeaderMap::new();
        headers.insert(LEGACY_TOKEN_HEADER, HeaderValue::from_static("xyz789"));
        assert_eq!(get_token(&headers).as_deref(), Some("xyz789"));

        assert_eq!(get_token(&HeaderMap::new()), None);
    }
}
