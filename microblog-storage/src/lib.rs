pub mod cache;
pub mod memory;
pub mod page;
pub mod postgres;
pub mod storage;

pub use cache::{CacheStorage, PostCache, RedisCache};
pub use memory::MemoryStorage;
pub use page::{PageLimit, PageToken, PostPage};
pub use postgres::PostgresStorage;
pub use storage::{Storage, StorageError};
