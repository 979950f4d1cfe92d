use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'comments' table in the database.
///
/// Replies reference their parent through `parent_id` (adjacency list,
/// no depth limit). A parent must already exist and belong to the same
/// post, so threads are cycle-free by construction.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for creating a new comment.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    pub post_id: i64,

    /// Optional: the ID of the comment being replied to.
    pub parent_id: Option<i64>,

    #[validate(length(
        min = 1,
        max = 2000,
        message = "Comment must be between 1 and 2000 characters"
    ))]
    pub content: String,
}

/// DTO for displaying a comment with author info.
#[derive(Debug, Serialize, FromRow)]
pub struct CommentResponse {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub username: String,
    pub parent_id: Option<i64>,
    pub content: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}
