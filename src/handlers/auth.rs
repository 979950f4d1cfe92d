// src/handlers/auth.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::{LoginRequest, RegisterRequest, User},
    utils::{
        hash::{hash_password, verify_password},
        jwt::{ROLE_USER, sign_jwt},
    },
};

/// Registers a new user.
///
/// Username and email must be globally unique; collisions return 409.
/// The role is always 'user' (elevation is not exposed through
/// registration) and only the Argon2 hash of the password is stored.
/// Returns 201 Created and the user object (excluding the hash).
pub async fn register(
    State(pool): State<PgPool>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    // Explicit duplicate checks give precise 409 messages; the unique
    // constraints below still catch races.
    let username_taken =
        sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE username = $1")
            .bind(&payload.username)
            .fetch_optional(&pool)
            .await?;
    if username_taken.is_some() {
        return Err(AppError::Conflict(format!(
            "Username '{}' already exists",
            payload.username
        )));
    }

    let email_taken = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE email = $1")
        .bind(&payload.email)
        .fetch_optional(&pool)
        .await?;
    if email_taken.is_some() {
        return Err(AppError::Conflict(format!(
            "Email '{}' already exists",
            payload.email
        )));
    }

    let hashed_password = hash_password(&payload.password)?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, email, password_hash, display_name, role)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, username, email, password_hash, display_name, role, created_at
        "#,
    )
    .bind(&payload.username)
    .bind(&payload.email)
    .bind(&hashed_password)
    .bind(&payload.display_name)
    .bind(ROLE_USER)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        // Postgres error code for unique violation is 23505
        if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
            AppError::Conflict("Username or email already exists".to_string())
        } else {
            tracing::error!("Failed to register user: {:?}", e);
            AppError::from(e)
        }
    })?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Authenticates a user and returns a JWT token.
///
/// Looks the user up by email and verifies the password. The same
/// deliberately generic message covers both an unknown email and a wrong
/// password. On success, returns the signed token alongside a snapshot of
/// the public profile fields.
pub async fn login(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, email, password_hash, display_name, role, created_at
        FROM users
        WHERE email = $1
        "#,
    )
    .bind(&payload.email)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Login DB error: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let user = user.ok_or(AppError::AuthError("Invalid email or password".to_string()))?;

    let is_valid = verify_password(&payload.password, &user.password_hash)?;

    if !is_valid {
        return Err(AppError::AuthError("Invalid email or password".to_string()));
    }

    let token = sign_jwt(
        user.id,
        &user.email,
        &user.role,
        &config.jwt_secret,
        config.jwt_expiration,
    )?;

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "user_id": user.id,
        "username": user.username,
        "email": user.email,
        "display_name": user.display_name,
        "role": user.role,
        "created_at": user.created_at,
    })))
}
