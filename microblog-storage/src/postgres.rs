//! Durable backend over a Postgres `posts` table.
//!
//! The table acts as a keyed document store: the snowflake primary key
//! yields both id lookups and the duplicate-key signal, and the compound
//! `(author_id, post_id DESC)` index serves the feed range query.

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
use sqlx::{FromRow, PgPool};
use std::sync::{Mutex, PoisonError};
use time::OffsetDateTime;

const CREATE_POSTS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS posts (
        post_id BIGINT PRIMARY KEY,
        author_id TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        last_modified_at TIMESTAMPTZ NOT NULL
    )
";

const CREATE_FEED_INDEX: &str = "
    CREATE INDEX IF NOT EXISTS posts_author_feed
    ON posts (author_id, post_id DESC)
";

#[derive(Clone, Eq, PartialEq, Debug, FromRow)]
struct PostRecord {
    post_id: i64,
    author_id: String,
    content: String,
    created_at: OffsetDateTime,
    last_modified_at: OffsetDateTime,
}

impl From<PostRecord> for Post {
    fn from(value: PostRecord) -> Self {
        Self {
            id: value.post_id.cast_unsigned().into(),
            text: value.content,
            author_id: UserId::new(value.author_id),
            created_at: value.created_at,
            last_modified_at: value.last_modified_at,
        }
    }
}

pub struct PostgresStorage {
    pool: PgPool,
    generator: Mutex<MicroblogSnowflakeGenerator>,
}

impl PostgresStorage {
    #[must_use]
    pub fn new(pool: PgPool, worker_id: WorkerId) -> Self {
        Self {
            pool,
            generator: Mutex::new(MicroblogSnowflakeGenerator::new(worker_id)),
        }
    }

    pub async fn connect(url: &str, worker_id: WorkerId) -> Result<Self> {
        let pool = PgPool::connect(url).await?;
        let storage = Self::new(pool, worker_id);
        storage.ensure_schema().await?;
        Ok(storage)
    }

    /// Idempotent startup step; steady-state operation assumes the schema
    /// and the feed index exist.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(CREATE_POSTS_TABLE).execute(&self.pool).await?;
        sqlx::query(CREATE_FEED_INDEX).execute(&self.pool).await?;
        Ok(())
    }

    fn generate_id(&self) -> Id<PostMarker> {
        self.generator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate()
            .into()
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn add_post(&self, new_post: NewPost) -> Result<Post> {
        let id = self.generate_id();
        let now = OffsetDateTime::now_utc();

        let record = sqlx::query_as::<_, PostRecord>(
            "
            INSERT INTO posts (post_id, author_id, content, created_at, last_modified_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING post_id, author_id, content, created_at, last_modified_at
            ",
        )
        .bind(u64::from(id).cast_signed())
        .bind(new_post.author_id.get())
        .bind(&new_post.text)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            if err
                .as_database_error()
                .is_some_and(|db_err| db_err.is_unique_violation())
            {
                StorageError::Collision(id)
            } else {
                StorageError::Database(err)
            }
        })?;

        Ok(record.into())
    }

    async fn get_post(&self, id: Id<PostMarker>) -> Result<Post> {
        let record = sqlx::query_as::<_, PostRecord>(
            "
            SELECT post_id, author_id, content, created_at, last_modified_at
            FROM posts
            WHERE post_id = $1
            ",
        )
        .bind(u64::from(id).cast_signed())
        .fetch_optional(&self.pool)
        .await?;

        record.map(Post::from).ok_or(StorageError::NotFound(id))
    }

    async fn user_posts(
        &self,
        author_id: &UserId,
        token: Option<&PageToken>,
        limit: PageLimit,
    ) -> Result<PostPage> {
        let cursor: Option<i64> = token
            .map(PageToken::cursor)
            .transpose()?
            .map(|id| u64::from(id).cast_signed());

        #[allow(clippy::cast_possible_wrap)]
        let fetch_count = limit.fetch_count() as i64;

        let records = sqlx::query_as::<_, PostRecord>(
            "
            SELECT post_id, author_id, content, created_at, last_modified_at
            FROM posts
            WHERE author_id = $1 AND ($2::BIGINT IS NULL OR post_id < $2)
            ORDER BY post_id DESC
            LIMIT $3
            ",
        )
        .bind(author_id.get())
        .bind(cursor)
        .bind(fetch_count)
        .fetch_all(&self.pool)
        .await?;

        let fetched = records.into_iter().map(Post::from).collect();
        Ok(PostPage::from_fetched(fetched, limit))
    }

    async fn update_post(&self, id: Id<PostMarker>, text: String) -> Result<Post> {
        let record = sqlx::query_as::<_, PostRecord>(
            "
            UPDATE posts
            SET content = $2, last_modified_at = $3
            WHERE post_id = $1
            RETURNING post_id, author_id, content, created_at, last_modified_at
            ",
        )
        .bind(u64::from(id).cast_signed())
        .bind(&text)
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(&self.pool)
        .await?;

        // Zero matched rows means the post does not exist; surfacing that
        // instead of succeeding silently is part of the contract.
        record.map(Post::from).ok_or(StorageError::NotFound(id))
    }
}
