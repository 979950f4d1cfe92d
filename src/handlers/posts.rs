use axum::{
    Extension, Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::AppError,
    models::post::{
        CreatePostRequest, Post, PostImage, PostListParams, PostResponse, PostStatus,
        UpdatePostRequest,
    },
    state::AppState,
    utils::{html::clean_html, jwt::CurrentUser, policy::can_mutate},
};

/// Create a new post from a multipart request.
/// Requires: Login.
///
/// Expects a 'post' part carrying the JSON payload plus zero or more
/// 'files' parts, processed in the order supplied. The author is always
/// the authenticated identity. A post created directly as 'published'
/// gets its publication time stamped now. The whole attach operation is
/// all-or-nothing: image rows share one transaction with the post insert,
/// and files already written to disk are removed when a later step fails.
pub async fn create_post(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    // 1. Pull the JSON payload and the raw files out of the multipart body.
    let mut payload: Option<CreatePostRequest> = None;
    let mut files: Vec<(String, axum::body::Bytes)> = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "post" => {
                let text = field.text().await?;
                payload = Some(serde_json::from_str(&text)?);
            }
            "files" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await?;
                if !bytes.is_empty() {
                    files.push((file_name, bytes));
                }
            }
            _ => {}
        }
    }

    let payload = payload.ok_or(AppError::BadRequest("Missing 'post' part".to_string()))?;
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let content = clean_html(&payload.content);
    let published_at = match payload.status {
        PostStatus::Published => Some(Utc::now()),
        PostStatus::Draft => None,
    };

    // 2. Insert the post.
    let mut tx = state.pool.begin().await?;

    let mut post = sqlx::query_as::<_, Post>(
        r#"
        INSERT INTO posts (author_id, title, content, status, category, featured, published_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, author_id, title, content, status, category, thumbnail_url, featured,
                  created_at, published_at
        "#,
    )
    .bind(current.id)
    .bind(&payload.title)
    .bind(&content)
    .bind(payload.status)
    .bind(&payload.category)
    .bind(payload.featured)
    .bind(published_at)
    .fetch_one(&mut *tx)
    .await?;

    // 3. Store each file and link it to the post. The first stored file
    // becomes the thumbnail when the post has none yet.
    let mut images: Vec<PostImage> = Vec::with_capacity(files.len());
    let mut stored_paths: Vec<String> = Vec::new();

    for (file_name, bytes) in &files {
        let image_url = match state.storage.save_file(file_name, bytes).await {
            Ok(url) => url,
            Err(e) => {
                remove_stored_files(&state, &stored_paths).await;
                return Err(e);
            }
        };
        stored_paths.push(image_url.clone());

        let inserted = sqlx::query_as::<_, PostImage>(
            r#"
            INSERT INTO post_images (post_id, image_url)
            VALUES ($1, $2)
            RETURNING id, post_id, image_url
            "#,
        )
        .bind(post.id)
        .bind(&image_url)
        .fetch_one(&mut *tx)
        .await;

        let image = match inserted {
            Ok(image) => image,
            Err(e) => {
                remove_stored_files(&state, &stored_paths).await;
                return Err(e.into());
            }
        };

        if post.thumbnail_url.is_none() {
            post.thumbnail_url = Some(image_url);
        }
        images.push(image);
    }

    if let Some(thumbnail_url) = &post.thumbnail_url {
        let updated = sqlx::query("UPDATE posts SET thumbnail_url = $1 WHERE id = $2")
            .bind(thumbnail_url)
            .bind(post.id)
            .execute(&mut *tx)
            .await;

        if let Err(e) = updated {
            remove_stored_files(&state, &stored_paths).await;
            return Err(e.into());
        }
    }

    if let Err(e) = tx.commit().await {
        remove_stored_files(&state, &stored_paths).await;
        return Err(e.into());
    }

    Ok((StatusCode::CREATED, Json(PostResponse { post, images })))
}

/// Best-effort removal of files written before a failed create.
async fn remove_stored_files(state: &AppState, paths: &[String]) {
    for path in paths {
        if let Err(e) = state.storage.remove_file(path).await {
            tracing::warn!("Failed to remove stored file {}: {}", path, e);
        }
    }
}

/// List posts (Recent first).
/// Supports optional filters and cursor-based pagination.
pub async fn list_posts(
    State(pool): State<PgPool>,
    Query(params): Query<PostListParams>,
) -> Result<impl IntoResponse, AppError> {
    let limit = params.limit.unwrap_or(20).min(100); // Default 20, max 100

    let search_pattern = params.q.map(|k| format!("%{}%", k));

    let posts = sqlx::query_as::<_, Post>(
        r#"
        SELECT id, author_id, title, content, status, category, thumbnail_url, featured,
               created_at, published_at
        FROM posts
        WHERE ($1::TEXT IS NULL OR category = $1)
          AND ($2::post_status IS NULL OR status = $2)
          AND ($3::BOOLEAN IS NULL OR featured = $3)
          AND ($4::TEXT IS NULL OR title ILIKE $4)
          AND ($5::TIMESTAMPTZ IS NULL OR created_at < $5)
        ORDER BY created_at DESC
        LIMIT $6
        "#,
    )
    .bind(params.category)
    .bind(params.status)
    .bind(params.featured)
    .bind(search_pattern)
    .bind(params.cursor)
    .bind(limit)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list posts: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(posts))
}

/// Get a single post by ID, with its attached images.
pub async fn get_post(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let post = sqlx::query_as::<_, Post>(
        r#"
        SELECT id, author_id, title, content, status, category, thumbnail_url, featured,
               created_at, published_at
        FROM posts
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Post not found".to_string()))?;

    let images = sqlx::query_as::<_, PostImage>(
        "SELECT id, post_id, image_url FROM post_images WHERE post_id = $1 ORDER BY id",
    )
    .bind(id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(PostResponse { post, images }))
}

/// Update a post.
/// Requires: Login + (Author OR Admin).
///
/// Partial update; transitioning to 'published' with no stored or supplied
/// publication time stamps the current time.
pub async fn update_post(
    State(pool): State<PgPool>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    // 1. Fetch the post to check ownership
    let post = sqlx::query_as::<_, Post>(
        r#"
        SELECT id, author_id, title, content, status, category, thumbnail_url, featured,
               created_at, published_at
        FROM posts
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Post not found".to_string()))?;

    // 2. Check Permission
    if !can_mutate(&current, post.author_id) {
        return Err(AppError::Forbidden(
            "You are not authorized to edit this post".to_string(),
        ));
    }

    // First transition to 'published' stamps the publication time.
    let published_at = match (payload.status, payload.published_at) {
        (Some(PostStatus::Published), None) if post.published_at.is_none() => Some(Utc::now()),
        (_, supplied) => supplied,
    };

    if payload.title.is_none()
        && payload.content.is_none()
        && payload.category.is_none()
        && payload.status.is_none()
        && payload.featured.is_none()
        && published_at.is_none()
    {
        return Ok(Json(post));
    }

    // 3. Apply the provided fields
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE posts SET ");
    let mut separated = builder.separated(", ");

    if let Some(title) = payload.title {
        separated.push("title = ");
        separated.push_bind_unseparated(title);
    }

    if let Some(content) = payload.content {
        separated.push("content = ");
        separated.push_bind_unseparated(clean_html(&content));
    }

    if let Some(category) = payload.category {
        separated.push("category = ");
        separated.push_bind_unseparated(category);
    }

    if let Some(status) = payload.status {
        separated.push("status = ");
        separated.push_bind_unseparated(status);
    }

    if let Some(featured) = payload.featured {
        separated.push("featured = ");
        separated.push_bind_unseparated(featured);
    }

    if let Some(published_at) = published_at {
        separated.push("published_at = ");
        separated.push_bind_unseparated(published_at);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update post: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let updated = sqlx::query_as::<_, Post>(
        r#"
        SELECT id, author_id, title, content, status, category, thumbnail_url, featured,
               created_at, published_at
        FROM posts
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(updated))
}

/// Delete a post.
/// Requires: Login + (Author OR Admin).
///
/// Image rows go with the post (FK cascade); stored files are removed
/// afterwards, best-effort, so a failure leaves at most orphan files and
/// never dangling rows.
pub async fn delete_post(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    // 1. Fetch the post to check ownership
    let author_id = sqlx::query_scalar::<_, i64>("SELECT author_id FROM posts WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::NotFound("Post not found".to_string()))?;

    // 2. Check Permission
    if !can_mutate(&current, author_id) {
        return Err(AppError::Forbidden(
            "You are not authorized to delete this post".to_string(),
        ));
    }

    let image_urls =
        sqlx::query_scalar::<_, String>("SELECT image_url FROM post_images WHERE post_id = $1")
            .bind(id)
            .fetch_all(&state.pool)
            .await?;

    // 3. Delete (post_images cascade)
    sqlx::query("DELETE FROM posts WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete post: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    for url in &image_urls {
        if let Err(e) = state.storage.remove_file(url).await {
            tracing::warn!("Failed to remove stored file {}: {}", url, e);
        }
    }

    Ok(StatusCode::NO_CONTENT)
}
