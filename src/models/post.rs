use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Lifecycle status of a post. Maps to the 'post_status' Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "post_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Published,
}

impl Default for PostStatus {
    fn default() -> Self {
        PostStatus::Draft
    }
}

/// Represents the 'posts' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub author_id: i64,
    pub title: String,

    /// Sanitized HTML body.
    pub content: String,

    pub status: PostStatus,
    pub category: Option<String>,

    /// The post's primary representative image, defaulted to the first
    /// uploaded file.
    pub thumbnail_url: Option<String>,

    pub featured: bool,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,

    /// Stamped once, when the post first transitions to 'published'.
    pub published_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Represents the 'post_images' table. Rows are owned by their post and
/// removed with it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PostImage {
    pub id: i64,
    pub post_id: i64,
    pub image_url: String,
}

/// A post together with its attached images, as returned to clients.
#[derive(Debug, Serialize)]
pub struct PostResponse {
    #[serde(flatten)]
    pub post: Post,
    pub images: Vec<PostImage>,
}

/// DTO for the JSON part of a multipart post creation request.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Title length must be between 1 and 255 chars"
    ))]
    pub title: String,

    #[validate(length(
        min = 1,
        max = 20000,
        message = "Content length must be between 1 and 20000 chars"
    ))]
    pub content: String,

    #[validate(length(max = 100, message = "Category must be at most 100 chars"))]
    pub category: Option<String>,

    #[serde(default)]
    pub status: PostStatus,

    #[serde(default)]
    pub featured: bool,
}

/// DTO for updating a post. Fields are optional.
#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub status: Option<PostStatus>,
    pub featured: Option<bool>,
    pub published_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Query parameters for listing posts.
#[derive(Debug, Deserialize)]
pub struct PostListParams {
    /// Cursor for pagination: the created_at timestamp of the last post in the previous page.
    pub cursor: Option<chrono::DateTime<chrono::Utc>>,

    /// Number of items to return (default: 20, max: 100).
    pub limit: Option<i64>,

    pub category: Option<String>,

    pub status: Option<PostStatus>,

    pub featured: Option<bool>,

    /// Search keyword for title match.
    pub q: Option<String>,
}
