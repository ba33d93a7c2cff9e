use axum::{
    extract::FromRequestParts,
    http::{Method, Request, StatusCode, Uri, header, request::Parts},
};
use camp_booking_api::{
    AppState, InMemoryRepository,
    auth::{self, AuthUser, Claims, TOKEN_TTL_SECS},
    config::AppConfig,
    error::ApiError,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use std::{collections::HashMap, sync::Arc, time::SystemTime};

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";
const TEST_EMAIL: &str = "student@camp.test";

fn now() -> usize {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize
}

/// Mints a token directly with `jsonwebtoken`, bypassing the issuer under test.
fn create_token(email: &str, iat: usize, exp: usize, secret: &str) -> String {
    let claims = json!({ "email": email, "iat": iat, "exp": exp });
    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

fn create_app_state(jwt_secret: Option<&str>) -> AppState {
    let mut config = AppConfig::default();
    config.jwt_secret = jwt_secret.map(str::to_string);

    AppState {
        repo: Arc::new(InMemoryRepository::new()),
        config,
    }
}

fn get_request_parts(authorization: Option<&str>) -> Parts {
    let mut builder = Request::builder()
        .method(Method::GET)
        .uri("/carts".parse::<Uri>().unwrap());
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    let (parts, _) = builder.body(axum::body::Body::empty()).unwrap().into_parts();
    parts
}

async fn extract(state: &AppState, authorization: Option<&str>) -> Result<AuthUser, ApiError> {
    let mut parts = get_request_parts(authorization);
    AuthUser::from_request_parts(&mut parts, state).await
}

fn payload(value: Value) -> HashMap<String, Value> {
    serde_json::from_value(value).unwrap()
}

// --- Verifier ---

#[tokio::test]
async fn test_auth_success_with_valid_jwt() {
    let token = create_token(TEST_EMAIL, now(), now() + 3600, TEST_JWT_SECRET);
    let state = create_app_state(Some(TEST_JWT_SECRET));

    let user = extract(&state, Some(&format!("Bearer {}", token)))
        .await
        .unwrap();

    assert_eq!(user.email(), Some(TEST_EMAIL));
    assert!(user.is(TEST_EMAIL));
    assert!(!user.is("someone@else.test"));
}

#[tokio::test]
async fn test_auth_failure_with_missing_header() {
    let state = create_app_state(Some(TEST_JWT_SECRET));

    let result = extract(&state, None).await;

    let err = result.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));
    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_failure_with_expired_jwt() {
    let token = create_token(TEST_EMAIL, now() - 7200, now() - 3600, TEST_JWT_SECRET);
    let state = create_app_state(Some(TEST_JWT_SECRET));

    let result = extract(&state, Some(&format!("Bearer {}", token))).await;

    assert!(matches!(result, Err(ApiError::Unauthorized)));
}

#[tokio::test]
async fn test_auth_failure_just_after_expiry() {
    let token = create_token(TEST_EMAIL, now() - 3605, now() - 5, TEST_JWT_SECRET);
    let state = create_app_state(Some(TEST_JWT_SECRET));

    let result = extract(&state, Some(&format!("Bearer {}", token))).await;

    assert!(matches!(result, Err(ApiError::Unauthorized)));
}

#[tokio::test]
async fn test_auth_failure_with_wrong_secret() {
    let token = create_token(TEST_EMAIL, now(), now() + 3600, "some-other-secret");
    let state = create_app_state(Some(TEST_JWT_SECRET));

    let result = extract(&state, Some(&format!("Bearer {}", token))).await;

    assert!(matches!(result, Err(ApiError::Unauthorized)));
}

#[tokio::test]
async fn test_auth_failure_with_malformed_token() {
    let state = create_app_state(Some(TEST_JWT_SECRET));

    for header_value in ["Bearer not.a.jwt", "Bearer ", "Basic dXNlcjpwYXNz", "garbage"] {
        let result = extract(&state, Some(header_value)).await;
        assert!(
            matches!(result, Err(ApiError::Unauthorized)),
            "expected 401 for {:?}",
            header_value
        );
    }
}

#[tokio::test]
async fn test_auth_failure_without_configured_secret() {
    let token = create_token(TEST_EMAIL, now(), now() + 3600, TEST_JWT_SECRET);
    let state = create_app_state(None);

    let result = extract(&state, Some(&format!("Bearer {}", token))).await;

    assert!(matches!(result, Err(ApiError::Unauthorized)));
}

#[tokio::test]
async fn test_cached_identity_is_reused() {
    let state = create_app_state(Some(TEST_JWT_SECRET));
    let mut parts = get_request_parts(None);
    parts.extensions.insert(AuthUser {
        claims: Claims::for_payload(payload(json!({ "email": TEST_EMAIL }))),
    });

    // No Authorization header, but the middleware already verified this request.
    let user = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();
    assert_eq!(user.email(), Some(TEST_EMAIL));
}

// --- Issuer ---

#[test]
fn test_claims_carry_payload_and_one_hour_expiry() {
    let claims = Claims::for_payload(payload(json!({
        "email": TEST_EMAIL,
        "name": "Student",
        "exp": 1,
        "iat": 1
    })));

    assert_eq!(claims.email.as_deref(), Some(TEST_EMAIL));
    assert_eq!(claims.exp - claims.iat, TOKEN_TTL_SECS);
    assert!(claims.iat + 5 >= now());
    assert_eq!(claims.extra.get("name"), Some(&json!("Student")));
    assert!(!claims.extra.contains_key("exp"));
}

#[test]
fn test_issued_token_verifies() {
    let claims = Claims::for_payload(payload(json!({ "email": TEST_EMAIL, "uid": 7 })));

    let token = auth::issue_token(&claims, Some(TEST_JWT_SECRET)).unwrap();
    let decoded = auth::verify_token(&token, Some(TEST_JWT_SECRET)).unwrap();

    assert_eq!(decoded, claims);
}

#[test]
fn test_issued_token_with_audience_and_not_before_verifies() {
    let claims = Claims::for_payload(payload(json!({
        "email": TEST_EMAIL,
        "aud": "web",
        "nbf": now() + 600
    })));

    let token = auth::issue_token(&claims, Some(TEST_JWT_SECRET)).unwrap();
    let decoded = auth::verify_token(&token, Some(TEST_JWT_SECRET)).unwrap();

    assert_eq!(decoded.email.as_deref(), Some(TEST_EMAIL));
    assert_eq!(decoded.extra.get("aud"), Some(&json!("web")));
}

#[test]
fn test_issue_without_secret_fails() {
    let claims = Claims::for_payload(payload(json!({ "email": TEST_EMAIL })));

    let result = auth::issue_token(&claims, None);

    let err = result.unwrap_err();
    assert!(matches!(err, ApiError::SigningKeyMissing));
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
