//! Read-through/write-through cache decorating another [`Storage`].
//!
//! Single posts are cached under `post:<id>` as their JSON encoding with a
//! bounded TTL. Feeds are never cached: pagination over a partially cached
//! feed cannot be kept consistent with the authoritative store.

use crate::{
    page::{PageLimit, PageToken, PostPage},
    storage::{Result, Storage},
};
use async_trait::async_trait;
use microblog_common::model::{
    Id,
    post::{NewPost, Post, PostMarker, UserId},
};
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use std::{sync::Arc, time::Duration};
use tracing::{debug, warn};

pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// The key-value capability the decorator needs from a cache client.
#[async_trait]
pub trait PostCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;
}

#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl PostCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut connection = self.manager.clone();
        Ok(connection.get(key).await?)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let mut connection = self.manager.clone();
        let seconds = ttl.as_secs();
        connection.set_ex::<_, _, ()>(key, value, seconds).await?;
        Ok(())
    }
}

/// Composes a cache client with any persistence backend, including another
/// decorated one.
pub struct CacheStorage<C = RedisCache> {
    persistence: Arc<dyn Storage>,
    cache: C,
    ttl: Duration,
}

impl<C: PostCache> CacheStorage<C> {
    #[must_use]
    pub fn new(persistence: Arc<dyn Storage>, cache: C) -> Self {
        Self::with_ttl(persistence, cache, DEFAULT_TTL)
    }

    #[must_use]
    pub fn with_ttl(persistence: Arc<dyn Storage>, cache: C, ttl: Duration) -> Self {
        Self {
            persistence,
            cache,
            ttl,
        }
    }

    fn post_key(id: Id<PostMarker>) -> String {
        format!("post:{id}")
    }

    async fn store_post(&self, post: &Post) -> Result<()> {
        let raw = serde_json::to_vec(post)?;
        self.cache
            .set(&Self::post_key(post.id), &raw, self.ttl)
            .await
    }
}

#[async_trait]
impl<C: PostCache> Storage for CacheStorage<C> {
    async fn add_post(&self, new_post: NewPost) -> Result<Post> {
        let post = self.persistence.add_post(new_post).await?;
        // The post is durable at this point; a failed cache fill is still
        // reported to the caller.
        self.store_post(&post).await?;
        Ok(post)
    }

    async fn get_post(&self, id: Id<PostMarker>) -> Result<Post> {
        let key = Self::post_key(id);
        match self.cache.get(&key).await {
            Ok(Some(raw)) => {
                debug!(%id, "serving post from cache");
                return Ok(serde_json::from_slice(&raw)?);
            }
            Ok(None) => {}
            Err(error) => {
                warn!(%id, %error, "cache read failed, falling back to persistence");
            }
        }

        debug!(%id, "loading post from persistence");
        let post = self.persistence.get_post(id).await?;
        // Filling the cache is the only side effect of this path, so its
        // failure is propagated even though the read itself succeeded.
        self.store_post(&post).await?;
        Ok(post)
    }

    async fn user_posts(
        &self,
        author_id: &UserId,
        token: Option<&PageToken>,
        limit: PageLimit,
    ) -> Result<PostPage> {
        self.persistence.user_posts(author_id, token, limit).await
    }

    async fn update_post(&self, id: Id<PostMarker>, text: String) -> Result<Post> {
        let post = self.persistence.update_post(id, text).await?;
        self.store_post(&post).await?;
        Ok(post)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        cache::{CacheStorage, PostCache},
        memory::MemoryStorage,
        page::PageLimit,
        storage::{Result, Storage, StorageError},
    };
    use async_trait::async_trait;
    use microblog_common::{
        model::post::{NewPost, UserId},
        snowflake::WorkerId,
    };
    use std::{
        collections::HashMap,
        sync::{
            Arc, Mutex,
            atomic::{AtomicBool, Ordering},
        },
        time::Duration,
    };

    #[derive(Default)]
    struct FakeCache {
        entries: Mutex<HashMap<String, Vec<u8>>>,
        fail_reads: AtomicBool,
        fail_writes: AtomicBool,
    }

    impl FakeCache {
        fn forced_error() -> StorageError {
            StorageError::Cache(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "forced cache failure",
            )))
        }

        fn contains(&self, key: &str) -> bool {
            self.entries.lock().unwrap().contains_key(key)
        }
    }

    #[async_trait]
    impl PostCache for Arc<FakeCache> {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(FakeCache::forced_error());
            }
            Ok(self.entries.lock().unwrap().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &[u8], _ttl: Duration) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(FakeCache::forced_error());
            }
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_owned(), value.to_vec());
            Ok(())
        }
    }

    fn setup() -> (Arc<MemoryStorage>, Arc<FakeCache>, CacheStorage<Arc<FakeCache>>) {
        let persistence = Arc::new(MemoryStorage::new(WorkerId::new_unchecked(1)));
        let cache = Arc::new(FakeCache::default());
        let storage = CacheStorage::new(persistence.clone(), cache.clone());
        (persistence, cache, storage)
    }

    fn new_post(text: &str) -> NewPost {
        NewPost {
            text: text.to_owned(),
            author_id: UserId::from("u1"),
        }
    }

    #[tokio::test]
    async fn add_populates_cache_write_through() {
        let (persistence, cache, storage) = setup();

        let added = storage.add_post(new_post("hello")).await.unwrap();
        assert!(cache.contains(&format!("post:{}", added.id)));

        // Durable as well as cached.
        assert_eq!(persistence.get_post(added.id).await.unwrap(), added);
        assert_eq!(storage.get_post(added.id).await.unwrap(), added);
    }

    #[tokio::test]
    async fn hit_and_miss_paths_agree() {
        let (persistence, _cache, storage) = setup();

        // Added directly to persistence, so the first read is a miss.
        let post = persistence.add_post(new_post("hello")).await.unwrap();

        let missed = storage.get_post(post.id).await.unwrap();
        let hit = storage.get_post(post.id).await.unwrap();
        assert_eq!(missed, post);
        assert_eq!(hit, post);
    }

    #[tokio::test]
    async fn hit_skips_persistence() {
        let (persistence, _cache, storage) = setup();

        let post = storage.add_post(new_post("hello")).await.unwrap();

        // Mutating persistence behind the cache's back proves the next read
        // never reaches it: the cached copy stays visible for the TTL.
        persistence
            .update_post(post.id, "changed underneath".to_owned())
            .await
            .unwrap();

        assert_eq!(storage.get_post(post.id).await.unwrap(), post);
    }

    #[tokio::test]
    async fn update_refreshes_cache() {
        let (_persistence, _cache, storage) = setup();

        let added = storage.add_post(new_post("hello")).await.unwrap();
        let updated = storage
            .update_post(added.id, "hello again".to_owned())
            .await
            .unwrap();

        // Cache hit must serve the refreshed copy.
        assert_eq!(storage.get_post(added.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn cache_read_error_falls_back_to_persistence() {
        let (persistence, cache, storage) = setup();
        let post = persistence.add_post(new_post("hello")).await.unwrap();

        cache.fail_reads.store(true, Ordering::SeqCst);
        assert_eq!(storage.get_post(post.id).await.unwrap(), post);
    }

    #[tokio::test]
    async fn cache_fill_failure_on_read_is_reported() {
        let (persistence, cache, storage) = setup();
        let post = persistence.add_post(new_post("hello")).await.unwrap();

        cache.fail_writes.store(true, Ordering::SeqCst);
        let error = storage.get_post(post.id).await.unwrap_err();
        assert!(matches!(error, StorageError::Cache(_)));
    }

    #[tokio::test]
    async fn cache_fill_failure_on_write_leaves_post_durable() {
        let (persistence, cache, storage) = setup();

        cache.fail_writes.store(true, Ordering::SeqCst);
        let error = storage.add_post(new_post("hello")).await.unwrap_err();
        assert!(matches!(error, StorageError::Cache(_)));

        // The persist happened before the failed fill.
        let page = persistence
            .user_posts(&UserId::from("u1"), None, PageLimit::default())
            .await
            .unwrap();
        assert_eq!(page.posts.len(), 1);
        assert_eq!(page.posts[0].text, "hello");
    }

    #[tokio::test]
    async fn missing_post_is_not_found_through_the_cache() {
        let (_persistence, _cache, storage) = setup();
        let error = storage.get_post(17.into()).await.unwrap_err();
        assert!(matches!(error, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn feeds_delegate_and_are_never_cached() {
        let (persistence, cache, storage) = setup();
        let author = UserId::from("u1");

        persistence.add_post(new_post("hello")).await.unwrap();
        let page = storage
            .user_posts(&author, None, PageLimit::default())
            .await
            .unwrap();

        assert_eq!(page.posts.len(), 1);
        assert!(cache.entries.lock().unwrap().is_empty());
    }
}
