use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

mod api;
mod auth;
mod broadcast;
mod cache;
mod command;
mod config;
mod connection;
mod database;
mod error;
mod events;
mod health;
mod models;
mod physics;
mod protocol;
mod race;
mod recovery;
mod snapshot;
mod ws;

use auth::{JwtResolver, TokenResolver};
use broadcast::BroadcastDispatcher;
use cache::{Cache, NullCache, RedisCache};
use config::Config;
use connection::ConnectionRegistry;
use health::HealthMonitor;
use models::{CarCatalog, TrackCatalog};
use race::RaceRegistry;
use recovery::RecoveryCoordinator;
use snapshot::SnapshotStore;

/// Shared, read-only handles to every collaborator C5/C6/C9/C10/C11 need.
/// Constructed once in `main` and wired into the axum router as state; no
/// component looks up another by a global name (§9's composition-root note).
pub struct AppState {
    pub cars: Arc<CarCatalog>,
    pub tracks: Arc<TrackCatalog>,
    pub config: Arc<Config>,
    pub db: Option<Arc<sqlx::PgPool>>,
    pub cache: Arc<dyn Cache>,
    pub connections: Arc<ConnectionRegistry>,
    pub broadcast: Arc<BroadcastDispatcher>,
    pub races: Arc<RaceRegistry>,
    pub recovery: Arc<RecoveryCoordinator>,
    pub health: Arc<HealthMonitor>,
    pub auth: Arc<dyn TokenResolver>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = Arc::new(Config::from_env());

    let db: Option<Arc<sqlx::PgPool>> = match database::Database::new(&config.database_url).await {
        Ok(database) => {
            if let Err(err) = database.migrate().await {
                tracing::warn!(%err, "database migration failed");
            } else {
                tracing::info!("database migrations applied");
            }
            Some(Arc::new(database.pool().clone()))
        }
        Err(err) => {
            tracing::warn!(%err, "failed to connect to database; durable-store fallback recovery will report Failed");
            None
        }
    };

    let cache: Arc<dyn Cache> = match RedisCache::connect(&config.redis_url).await {
        Ok(redis) => {
            tracing::info!("connected to redis cache");
            Arc::new(redis)
        }
        Err(err) => {
            tracing::warn!(%err, "no redis cache reachable; falling back to NullCache");
            Arc::new(NullCache)
        }
    };

    let cars = Arc::new(
        CarCatalog::load_from_fixture("fixtures/cars.json").unwrap_or_else(|err| {
            tracing::warn!(%err, "failed to load car fixture; starting with an empty catalog");
            CarCatalog::default()
        }),
    );
    let tracks = Arc::new(
        TrackCatalog::load_from_fixture("fixtures/tracks.json").unwrap_or_else(|err| {
            tracing::warn!(%err, "failed to load track fixture; starting with an empty catalog");
            TrackCatalog::default()
        }),
    );

    let connections = Arc::new(ConnectionRegistry::new());
    let broadcast = Arc::new(BroadcastDispatcher::new(connections.clone()));
    let snapshots = Arc::new(SnapshotStore::new(config.max_snapshots_per_race, config.snapshot_period, cache.clone()));
    let recovery = Arc::new(RecoveryCoordinator::new(snapshots.clone(), db.clone()));
    let races = RaceRegistry::new(cars.clone(), tracks.clone(), config.clone(), broadcast.clone(), snapshots.clone(), recovery.clone(), db.clone());
    let health = Arc::new(HealthMonitor::new(db.clone(), cache.clone(), connections.clone(), races.clone(), config.clone()));
    let auth: Arc<dyn TokenResolver> = Arc::new(JwtResolver::new(config.jwt_secret.clone()));

    health.clone().spawn();
    spawn_stale_connection_sweep(connections.clone(), config.clone());

    let state = Arc::new(AppState {
        cars,
        tracks,
        config: config.clone(),
        db,
        cache,
        connections,
        broadcast,
        races,
        recovery,
        health,
        auth,
    });

    let app = Router::new()
        .route("/ws", get(ws::upgrade))
        .merge(api::create_api_router(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = TcpListener::bind(&config.bind_addr).await.expect("failed to bind listen address");
    tracing::info!(addr = %config.bind_addr, "text racer server listening");
    axum::serve(listener, app).await.expect("server error");
}

/// Disconnects sockets whose keepalive predates `staleConnection` (§4.8),
/// on a loop matching the reference server's `spawn_watchdog` cadence
/// pattern of "spawn a task, tick on an interval, act".
fn spawn_stale_connection_sweep(connections: Arc<ConnectionRegistry>, config: Arc<Config>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(config.stale_connection / 2);
        loop {
            interval.tick().await;
            let removed = connections.cleanup_stale(config.stale_connection, std::time::Instant::now());
            if !removed.is_empty() {
                tracing::debug!(count = removed.len(), "stale connections swept");
            }
        }
    });
}
