//! Reference backend backed by process memory.

use crate::{
    page::{PageLimit, PageToken, PostPage},
    storage::{Result, Storage, StorageError},
};
use async_trait::async_trait;
use microblog_common::{
    model::{
        Id, MicroblogSnowflakeGenerator,
        post::{NewPost, Post, PostMarker, UserId},
    },
    snowflake::WorkerId,
};
use std::collections::HashMap;
use time::OffsetDateTime;
use tokio::sync::RwLock;

/// Id map, per-author feeds and the id generator form one owned unit behind
/// a single reader-writer lock, so the two maps can never drift apart.
#[derive(Debug, Default)]
struct Inner {
    generator: MicroblogSnowflakeGenerator,
    posts: HashMap<Id<PostMarker>, Post>,
    feeds: HashMap<UserId, Vec<Post>>,
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: RwLock<Inner>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new(worker_id: WorkerId) -> Self {
        Self {
            inner: RwLock::new(Inner {
                generator: MicroblogSnowflakeGenerator::new(worker_id),
                posts: HashMap::new(),
                feeds: HashMap::new(),
            }),
        }
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn add_post(&self, new_post: NewPost) -> Result<Post> {
        let mut inner = self.inner.write().await;

        let id = Id::from(inner.generator.generate());
        if inner.posts.contains_key(&id) {
            return Err(StorageError::Collision(id));
        }

        let now = OffsetDateTime::now_utc();
        let post = Post {
            id,
            text: new_post.text,
            author_id: new_post.author_id,
            created_at: now,
            last_modified_at: now,
        };

        inner.posts.insert(id, post.clone());
        inner
            .feeds
            .entry(post.author_id.clone())
            .or_default()
            // Newest first; fresh ids always sort before the existing feed.
            .insert(0, post.clone());

        Ok(post)
    }

    async fn get_post(&self, id: Id<PostMarker>) -> Result<Post> {
        let inner = self.inner.read().await;
        inner.posts.get(&id).cloned().ok_or(StorageError::NotFound(id))
    }

    async fn user_posts(
        &self,
        author_id: &UserId,
        token: Option<&PageToken>,
        limit: PageLimit,
    ) -> Result<PostPage> {
        let cursor = token.map(PageToken::cursor).transpose()?;

        let inner = self.inner.read().await;
        let Some(feed) = inner.feeds.get(author_id) else {
            return Ok(PostPage::empty());
        };

        // The feed is id-descending, so the resumption point is the first
        // entry strictly below the cursor.
        let start = match cursor {
            Some(cursor) => feed.partition_point(|post| post.id >= cursor),
            None => 0,
        };

        let fetched: Vec<Post> = feed[start..]
            .iter()
            .take(limit.fetch_count())
            .cloned()
            .collect();

        Ok(PostPage::from_fetched(fetched, limit))
    }

    async fn update_post(&self, id: Id<PostMarker>, text: String) -> Result<Post> {
        let mut inner = self.inner.write().await;

        let Some(post) = inner.posts.get_mut(&id) else {
            return Err(StorageError::NotFound(id));
        };
        post.text = text;
        post.last_modified_at = OffsetDateTime::now_utc();
        let updated = post.clone();

        if let Some(feed) = inner.feeds.get_mut(&updated.author_id)
            && let Some(entry) = feed.iter_mut().find(|entry| entry.id == id)
        {
            *entry = updated.clone();
        }

        Ok(updated)
    }
}
