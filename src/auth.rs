use std::collections::HashMap;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{config::AppConfig, error::ApiError, models::take_string};

/// Lifetime of every issued token: one hour.
pub const TOKEN_TTL_SECS: usize = 60 * 60;

/// Claims
///
/// Payload of an identity token. `email` is the only field the server reads; anything
/// else the client submitted to `/jwt` rides along in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Issued At (iat), seconds since the epoch.
    pub iat: usize,
    /// Expiration Time (exp). Tokens are rejected once this has passed.
    pub exp: usize,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl Claims {
    /// Builds claims for `payload`, stamped with the current time and a one hour expiry.
    /// Any `iat`/`exp` the client supplied is discarded.
    pub fn for_payload(mut payload: HashMap<String, Value>) -> Self {
        payload.remove("iat");
        payload.remove("exp");

        let email = take_string(&mut payload, "email");

        let now = Utc::now().timestamp() as usize;
        Self {
            email,
            iat: now,
            exp: now + TOKEN_TTL_SECS,
            extra: payload,
        }
    }
}

/// issue_token
///
/// Signs `claims` with HS256. Fails with [`ApiError::SigningKeyMissing`] when no
/// secret is configured so a token is never signed with an empty key.
pub fn issue_token(claims: &Claims, secret: Option<&str>) -> Result<String, ApiError> {
    let secret = secret.ok_or(ApiError::SigningKeyMissing)?;
    let key = EncodingKey::from_secret(secret.as_bytes());
    Ok(encode(&Header::default(), claims, &key)?)
}

/// verify_token
///
/// Checks signature and expiry, with no clock leeway. Other registered claims a client
/// may have put in its `/jwt` payload (`aud`, `nbf`, ...) are carried but not enforced.
/// Every failure collapses into `Unauthorized`.
pub fn verify_token(token: &str, secret: Option<&str>) -> Result<Claims, ApiError> {
    let secret = secret.ok_or_else(|| {
        tracing::warn!("bearer token received but no signing secret is configured");
        ApiError::Unauthorized
    })?;

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::default();
    validation.leeway = 0;
    validation.validate_aud = false;
    validation.validate_nbf = false;

    match decode::<Claims>(token, &decoding_key, &validation) {
        Ok(data) => Ok(data.claims),
        Err(e) => {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("expired token"),
                other => tracing::debug!(reason = ?other, "invalid token"),
            }
            Err(ApiError::Unauthorized)
        }
    }
}

/// bearer_token
///
/// Pulls the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or(ApiError::Unauthorized)?;

    if token.is_empty() {
        return Err(ApiError::Unauthorized);
    }
    Ok(token)
}

/// AuthUser
///
/// The verified identity of a request. Produced once by the bearer middleware and
/// cached in the request extensions, so handlers extracting it again do not re-verify.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub claims: Claims,
}

impl AuthUser {
    pub fn email(&self) -> Option<&str> {
        self.claims.email.as_deref()
    }

    /// True when the verified identity is the owner of `email`.
    pub fn is(&self, email: &str) -> bool {
        self.email() == Some(email)
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let config = AppConfig::from_ref(state);
        let token = bearer_token(&parts.headers)?;
        let claims = verify_token(token, config.jwt_secret.as_deref())?;

        let user = AuthUser { claims };
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}
