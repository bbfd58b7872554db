use microblog_common::snowflake::WorkerId;
use microblog_storage::{CacheStorage, MemoryStorage, PostgresStorage, RedisCache, Storage};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod server;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("DATABASE_URL is required for storage mode {0:?}")]
    MissingDatabaseUrl(StorageMode),
    #[error("REDIS_URL is required for storage mode {0:?}")]
    MissingRedisUrl(StorageMode),
    #[error("Error setting up storage: {0}")]
    Storage(#[from] microblog_storage::StorageError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
enum StorageMode {
    #[default]
    InMemory,
    Postgres,
    Cached,
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct Env {
    server_address: IpAddr,
    server_port: u16,
    #[serde(default)]
    storage_mode: StorageMode,
    #[serde(default)]
    worker_id: WorkerId,
    database_url: Option<String>,
    redis_url: Option<String>,
    cache_ttl_seconds: Option<u64>,
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "microblog_api=debug,microblog_storage=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

async fn connect_postgres(env: &Env) -> Result<PostgresStorage, InitError> {
    let url = env
        .database_url
        .as_deref()
        .ok_or(InitError::MissingDatabaseUrl(env.storage_mode))?;
    Ok(PostgresStorage::connect(url, env.worker_id).await?)
}

async fn build_storage(env: &Env) -> Result<Arc<dyn Storage>, InitError> {
    match env.storage_mode {
        StorageMode::InMemory => Ok(Arc::new(MemoryStorage::new(env.worker_id))),
        StorageMode::Postgres => Ok(Arc::new(connect_postgres(env).await?)),
        StorageMode::Cached => {
            let persistence: Arc<dyn Storage> = Arc::new(connect_postgres(env).await?);
            let url = env
                .redis_url
                .as_deref()
                .ok_or(InitError::MissingRedisUrl(env.storage_mode))?;
            let cache = RedisCache::connect(url).await?;
            let storage = match env.cache_ttl_seconds {
                Some(seconds) => {
                    CacheStorage::with_ttl(persistence, cache, Duration::from_secs(seconds))
                }
                None => CacheStorage::new(persistence, cache),
            };
            Ok(Arc::new(storage))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;

    let storage = build_storage(&env).await?;
    info!(storage_mode = ?env.storage_mode, "Storage initialized");

    let state = server::ServerState { storage };
    let app = server::routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Start serving");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}
