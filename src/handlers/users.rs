// src/handlers/users.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::{
    error::AppError,
    models::user::{UpdateUserRequest, User},
    utils::{
        hash::hash_password,
        jwt::{CurrentUser, ROLE_ADMIN, ROLE_USER},
        policy::can_mutate,
    },
};

/// Lists all users. Public read; password hashes never serialize.
pub async fn list_users(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, email, password_hash, display_name, role, created_at
        FROM users
        ORDER BY id
        "#,
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(users))
}

/// Retrieves a single user by ID.
pub async fn get_user(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, email, password_hash, display_name, role, created_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

/// Updates a user's profile.
/// Requires: Login + (Self OR Admin). Role changes are admin-only.
pub async fn update_user(
    State(pool): State<PgPool>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    // Check existence
    let _exists = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    if !can_mutate(&current, id) {
        return Err(AppError::Forbidden(
            "You are not authorized to update this user".to_string(),
        ));
    }

    if let Some(role) = &payload.role {
        if current.role != ROLE_ADMIN {
            return Err(AppError::Forbidden(
                "Only admins can change roles".to_string(),
            ));
        }
        if role != ROLE_USER && role != ROLE_ADMIN {
            return Err(AppError::BadRequest(format!("Unknown role '{}'", role)));
        }
    }

    if payload.username.is_none()
        && payload.email.is_none()
        && payload.display_name.is_none()
        && payload.password.is_none()
        && payload.role.is_none()
    {
        return Ok(StatusCode::OK);
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET ");
    let mut separated = builder.separated(", ");

    if let Some(username) = payload.username {
        separated.push("username = ");
        separated.push_bind_unseparated(username);
    }

    if let Some(email) = payload.email {
        separated.push("email = ");
        separated.push_bind_unseparated(email);
    }

    if let Some(display_name) = payload.display_name {
        separated.push("display_name = ");
        separated.push_bind_unseparated(display_name);
    }

    if let Some(password) = payload.password {
        let hashed = hash_password(&password)?;
        separated.push("password_hash = ");
        separated.push_bind_unseparated(hashed);
    }

    if let Some(role) = payload.role {
        separated.push("role = ");
        separated.push_bind_unseparated(role);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    builder.build().execute(&pool).await.map_err(|e| {
        if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
            AppError::Conflict("Username or email already exists".to_string())
        } else {
            tracing::error!("Failed to update user: {:?}", e);
            AppError::InternalServerError(e.to_string())
        }
    })?;

    Ok(StatusCode::OK)
}

/// Deletes a user by ID.
/// Requires: Login + (Self OR Admin).
pub async fn delete_user(
    State(pool): State<PgPool>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let _exists = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    if !can_mutate(&current, id) {
        return Err(AppError::Forbidden(
            "You are not authorized to delete this user".to_string(),
        ));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete user: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
