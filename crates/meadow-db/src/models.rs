/// Database row types — these map directly to SQLite rows.
/// Distinct from the meadow-types API models to keep the DB layer
/// independent.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    /// Argon2 PHC string; plaintext is never at rest.
    pub password: String,
    pub is_active: bool,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct PostRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
    pub version: i64,
}

#[derive(Debug, Clone)]
pub struct CommentRow {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub author_username: String,
    pub content: String,
    pub created_at: String,
}

/// A feed entry: a post joined with its author and comment count.
#[derive(Debug, Clone)]
pub struct FeedItemRow {
    pub id: String,
    pub user_id: String,
    pub author_username: String,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub version: i64,
    pub comments_count: i64,
    pub created_at: String,
    pub updated_at: String,
}
