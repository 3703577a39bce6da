use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use game_service::{
    cache::{LeaderboardCache, MatchmakingCache, RedisHandle, SessionCache},
    coordinator::Coordinator,
    http,
    repository::{GamesRepository, LeaderboardRepository},
    storage::{LocalStore, TierChain},
    websocket::{AppState, ConnectionHub},
};
use shared::{DatabaseConfig, ExpiryConfig, RedisConfig, ServiceConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let config = ServiceConfig::from_env(4000)?;
    let expiry = ExpiryConfig::from_env()?;

    shared::init_tracing("game-service")?;

    shared::init_metrics(config.metrics_port)?;

    tracing::info!("Game Service starting...");

    tracing::info!(
        port = config.port,
        metrics_port = config.metrics_port,
        finished_session_ttl_secs = expiry.finished_session_ttl_secs,
        invite_code_ttl_secs = expiry.invite_code_ttl_secs,
        queue_marker_ttl_secs = expiry.queue_marker_ttl_secs,
        local_sweep_interval_secs = expiry.local_sweep_interval_secs,
        "Configuration loaded"
    );

    let db_pool = connect_postgres(config.run_migrations).await;
    let redis = connect_redis();

    let local = Arc::new(LocalStore::new());
    let mut chain = TierChain::default();

    if let Some(redis) = &redis {
        chain.sessions.push(Arc::new(SessionCache::new(redis.clone())));
        chain.queue.push(Arc::new(MatchmakingCache::new(
            redis.clone(),
            Duration::from_secs(expiry.queue_marker_ttl_secs),
        )));
    }
    if let Some(pool) = &db_pool {
        chain.leaderboard.push(Arc::new(LeaderboardRepository::new(pool.clone())));
        chain.history.push(Arc::new(GamesRepository::new(pool.clone())));
    }
    if let Some(redis) = &redis {
        chain.leaderboard.push(Arc::new(LeaderboardCache::new(redis.clone())));
    }
    let chain = chain.with_local(local.clone());

    tracing::info!(
        durable = db_pool.is_some(),
        cache = redis.is_some(),
        "Storage tiers assembled"
    );

    let sweep_interval = Duration::from_secs(expiry.local_sweep_interval_secs.max(1));
    let sweep_store = local.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        loop {
            interval.tick().await;
            match sweep_store.sweep_expired() {
                Ok(0) => {}
                Ok(removed) => {
                    tracing::info!(removed = removed, "Swept expired local records");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to sweep local records");
                }
            }
        }
    });

    tracing::info!("Started local expiry background task");

    let hub = Arc::new(ConnectionHub::new());
    let coordinator = Arc::new(Coordinator::from_tiers(&chain, &expiry, hub.clone()));

    let app = http::router(AppState { coordinator, hub }).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(addr = %addr, "Starting WebSocket server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shut down gracefully");

    Ok(())
}

/// Pools connect lazily so the service starts degraded when Postgres is down.
async fn connect_postgres(run_migrations: bool) -> Option<PgPool> {
    let db_config = match DatabaseConfig::from_env() {
        Ok(db_config) => db_config,
        Err(_) => {
            tracing::warn!("DATABASE_URL not set, durable tier disabled");
            return None;
        }
    };

    let pool = match PgPoolOptions::new()
        .max_connections(db_config.max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(300))
        .max_lifetime(Duration::from_secs(1800))
        .connect_lazy(&db_config.url)
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "Invalid DATABASE_URL, durable tier disabled");
            return None;
        }
    };

    if run_migrations {
        tracing::info!("Running database migrations...");
        match sqlx::migrate!("../migrations").run(&pool).await {
            Ok(()) => tracing::info!("Migrations completed"),
            Err(e) => tracing::error!(error = %e, "Migrations failed, continuing without them"),
        }
    } else {
        tracing::info!("Skipping migrations (RUN_MIGRATIONS=false)");
    }

    Some(pool)
}

fn connect_redis() -> Option<RedisHandle> {
    let redis_config = match RedisConfig::from_env() {
        Ok(redis_config) => redis_config,
        Err(_) => {
            tracing::warn!("REDIS_URL not set, cache tier disabled");
            return None;
        }
    };

    match RedisHandle::open(&redis_config.url) {
        Ok(handle) => Some(handle.with_key_prefix(&redis_config.key_prefix)),
        Err(e) => {
            tracing::error!(error = %e, "Invalid REDIS_URL, cache tier disabled");
            None
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
