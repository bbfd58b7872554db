use crate::page::{PageLimit, PageToken, PostPage};
use async_trait::async_trait;
use microblog_common::model::{
    Id,
    post::{NewPost, Post, PostMarker, UserId},
};
use thiserror::Error;

pub type Result<T, E = StorageError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Post with id {0} was not found.")]
    NotFound(Id<PostMarker>),
    #[error("Generated post id {0} already exists.")]
    Collision(Id<PostMarker>),
    #[error("Page token {0:?} is not a valid cursor.")]
    InvalidPageToken(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Cache(#[from] redis::RedisError),
    #[error("Cached post could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Capability contract shared by every post backend.
///
/// Ids are assigned server-side and are time-ordered, so `id` descending is
/// the per-author feed order. Operations are driven by the caller's future;
/// dropping it cancels in-flight I/O.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Assigns an id and both timestamps, persists the post and returns the
    /// stored copy. Fails with [`StorageError::Collision`] if the generated
    /// id already exists instead of overwriting.
    async fn add_post(&self, new_post: NewPost) -> Result<Post>;

    /// Fails with [`StorageError::NotFound`] if no post has this id.
    async fn get_post(&self, id: Id<PostMarker>) -> Result<Post>;

    /// Returns up to `limit` posts of `author_id` ordered by id descending,
    /// resuming strictly after the post named by `token`.
    ///
    /// An issued token resolves to a fixed position in the feed no matter
    /// how many posts are inserted after it was issued: new posts carry
    /// larger ids and sort strictly before any outstanding cursor. An
    /// author without posts gets an empty page, not an error.
    async fn user_posts(
        &self,
        author_id: &UserId,
        token: Option<&PageToken>,
        limit: PageLimit,
    ) -> Result<PostPage>;

    /// Overwrites `text` and refreshes `last_modified_at` of the post with
    /// this id. Fails with [`StorageError::NotFound`] if the id does not
    /// exist; matching zero rows is never a silent success.
    async fn update_post(&self, id: Id<PostMarker>, text: String) -> Result<Post>;
}
