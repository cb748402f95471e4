pub mod memory;
pub mod postgres;
pub mod redis;
pub mod repository;

pub use self::memory::MemoryRepository;
pub use self::postgres::{create_pool, run_migrations, PgRepository};
pub use self::redis::{create_redis_client, Cache, CacheKey, CacheWriterHandle};
pub use self::repository::Repository;

#[cfg(test)]
pub use self::repository::MockRepository;
