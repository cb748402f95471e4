use std::sync::Arc;
use std::time::Duration;

use reelbandit::{
    api::{create_router, AppState},
    config::Config,
    db::{
        create_pool, create_redis_client, run_migrations, Cache, MemoryRepository, PgRepository,
        Repository,
    },
    services::{restore_bandit, spawn_checkpointer, RedisSnapshotStore, SnapshotStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let repository: Arc<dyn Repository> = match &config.database_url {
        Some(url) => {
            let pool = create_pool(url).await?;
            run_migrations(&pool).await?;
            tracing::info!("Using PostgreSQL repository");
            Arc::new(PgRepository::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory repository");
            Arc::new(MemoryRepository::new())
        }
    };

    let (cache, cache_writer) = if config.enable_redis {
        let (cache, writer) = Cache::new(create_redis_client(&config.redis_url)?);
        (Some(cache), Some(writer))
    } else {
        (None, None)
    };

    let checkpoint_interval = Duration::from_secs(config.bandit.bandit_checkpoint_secs);
    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::build(config, repository, cache.clone())?;

    let checkpointer = match (state.bandit(), cache) {
        (Some(bandit), Some(cache)) => {
            let store: Arc<dyn SnapshotStore> = Arc::new(RedisSnapshotStore::new(cache));
            restore_bandit(bandit, store.as_ref()).await;
            Some(spawn_checkpointer(bandit.clone(), store, checkpoint_interval))
        }
        (Some(_), None) => {
            tracing::warn!("Redis disabled, bandit state will not survive restarts");
            None
        }
        _ => None,
    };

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down");
    if let Some(checkpointer) = checkpointer {
        checkpointer.shutdown().await;
    }
    if let Some(writer) = cache_writer {
        writer.shutdown().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
