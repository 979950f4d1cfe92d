// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{
    DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};

use crate::{error::AppError, models::user::User, state::AppState};

pub const ROLE_USER: &str = "user";
pub const ROLE_ADMIN: &str = "admin";

/// JWT Claims structure.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - the user's email.
    pub sub: String,
    /// Numeric id of the user the token was issued for.
    pub user_id: i64,
    /// User's role (e.g., 'user', 'admin').
    pub role: String,
    /// Issued-at as Unix timestamp.
    pub iat: usize,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

/// Identity resolved from a validated bearer token.
///
/// Lives in the request extensions for the remainder of the request;
/// nothing about it is persisted or shared across requests.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub email: String,
    pub role: String,
}

/// Signs a new JWT for the user.
///
/// The token embeds the email as subject plus `user_id` and `role` claims,
/// and expires `expiration_seconds` after issuance.
pub fn sign_jwt(
    user_id: i64,
    email: &str,
    role: &str,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    let issued_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs() as usize;

    let claims = Claims {
        sub: email.to_owned(),
        user_id,
        role: role.to_owned(),
        iat: issued_at,
        exp: issued_at + expiration_seconds as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies and decodes a JWT string.
///
/// An expired token is reported distinctly from a malformed or
/// signature-mismatched one; both map to 401.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::AuthError("Token expired".to_string()),
        _ => AppError::AuthError("Invalid token".to_string()),
    })?;

    Ok(token_data.claims)
}

/// Verifies a token and additionally checks it was issued for `expected_email`.
pub fn verify_subject(token: &str, secret: &str, expected_email: &str) -> Result<Claims, AppError> {
    let claims = verify_jwt(token, secret)?;

    if claims.sub != expected_email {
        return Err(AppError::AuthError("Token subject mismatch".to_string()));
    }

    Ok(claims)
}

/// Axum Middleware: Authentication Gate.
///
/// Runs once per request, before any route-specific logic. A missing header,
/// a non-Bearer scheme, or a token that fails validation all leave the
/// request unauthenticated rather than rejecting it; whether anonymous
/// access is acceptable is decided at the route layer. On success the
/// subject email is resolved against the users table and a `CurrentUser`
/// is attached to the request extensions.
pub async fn auth_gate(State(state): State<AppState>, mut req: Request<Body>, next: Next) -> Response {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(|token| token.to_string());

    let Some(token) = token else {
        return next.run(req).await;
    };

    match verify_jwt(&token, &state.config.jwt_secret) {
        Ok(claims) => {
            let user = sqlx::query_as::<_, User>(
                "SELECT id, username, email, password_hash, display_name, role, created_at
                 FROM users WHERE email = $1",
            )
            .bind(&claims.sub)
            .fetch_optional(&state.pool)
            .await;

            match user {
                Ok(Some(user)) => {
                    req.extensions_mut().insert(CurrentUser {
                        id: user.id,
                        email: user.email,
                        role: user.role,
                    });
                }
                // Unknown subject degrades to anonymous like any bad token.
                Ok(None) => {
                    tracing::debug!("Bearer token subject has no matching user");
                }
                Err(e) => {
                    tracing::error!("User lookup failed during authentication: {:?}", e);
                }
            }
        }
        Err(e) => {
            tracing::debug!("Discarding invalid bearer token: {}", e);
        }
    }

    next.run(req).await
}

/// Axum Middleware: Authentication Enforcement.
///
/// Layered onto routes that require a logged-in user. Returns 401 when the
/// gate did not attach an identity.
pub async fn require_auth(req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    if req.extensions().get::<CurrentUser>().is_none() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(req).await)
}
