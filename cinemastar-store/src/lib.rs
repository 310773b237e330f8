pub mod app_config;
pub mod database;
pub mod catalog_repo;
pub mod redis_repo;

pub use app_config::Config;
pub use database::DbClient;
pub use catalog_repo::PgCatalogStore;
pub use redis_repo::RedisConversationStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error(transparent)]
    Catalog(#[from] cinemastar_catalog::CatalogError),
}

pub type StoreResult<T> = Result<T, StoreError>;
