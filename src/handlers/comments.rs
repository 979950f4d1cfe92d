use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::comment::{CommentResponse, CreateCommentRequest},
    utils::{html::clean_html, jwt::CurrentUser, policy::can_mutate},
};

/// Create a new comment, optionally as a reply to an existing one.
/// Requires: Login. The author is the authenticated identity.
///
/// The parent, when given, must already exist and belong to the same
/// post, so reply threads cannot form cycles.
pub async fn create_comment(
    State(pool): State<PgPool>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let _post = sqlx::query_scalar::<_, i64>("SELECT id FROM posts WHERE id = $1")
        .bind(payload.post_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Post not found".to_string()))?;

    if let Some(parent_id) = payload.parent_id {
        let parent_post_id =
            sqlx::query_scalar::<_, i64>("SELECT post_id FROM comments WHERE id = $1")
                .bind(parent_id)
                .fetch_optional(&pool)
                .await?
                .ok_or(AppError::NotFound("Parent comment not found".to_string()))?;

        if parent_post_id != payload.post_id {
            return Err(AppError::BadRequest(
                "Parent comment belongs to a different post".to_string(),
            ));
        }
    }

    let content = clean_html(&payload.content);

    let new_id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO comments (post_id, user_id, parent_id, content)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(payload.post_id)
    .bind(current.id)
    .bind(payload.parent_id)
    .bind(&content)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create comment: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let comment = fetch_comment(&pool, new_id)
        .await?
        .ok_or(AppError::InternalServerError(
            "Comment vanished after insert".to_string(),
        ))?;

    Ok((StatusCode::CREATED, Json(comment)))
}

/// List all comments for a post, oldest first, with author usernames.
pub async fn list_comments_for_post(
    State(pool): State<PgPool>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let comments = sqlx::query_as::<_, CommentResponse>(
        r#"
        SELECT c.id, c.post_id, c.user_id, u.username, c.parent_id, c.content, c.created_at
        FROM comments c
        JOIN users u ON c.user_id = u.id
        WHERE c.post_id = $1
        ORDER BY c.created_at ASC, c.id ASC
        "#,
    )
    .bind(post_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(comments))
}

/// Get a single comment by ID.
pub async fn get_comment(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let comment = fetch_comment(&pool, id)
        .await?
        .ok_or(AppError::NotFound("Comment not found".to_string()))?;

    Ok(Json(comment))
}

/// Delete a comment. Replies cascade with it.
/// Requires: Login + (Author OR Admin).
pub async fn delete_comment(
    State(pool): State<PgPool>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let author_id = sqlx::query_scalar::<_, i64>("SELECT user_id FROM comments WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Comment not found".to_string()))?;

    if !can_mutate(&current, author_id) {
        return Err(AppError::Forbidden(
            "You are not authorized to delete this comment".to_string(),
        ));
    }

    sqlx::query("DELETE FROM comments WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete comment: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_comment(pool: &PgPool, id: i64) -> Result<Option<CommentResponse>, AppError> {
    let comment = sqlx::query_as::<_, CommentResponse>(
        r#"
        SELECT c.id, c.post_id, c.user_id, u.username, c.parent_id, c.content, c.created_at
        FROM comments c
        JOIN users u ON c.user_id = u.id
        WHERE c.id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(comment)
}
