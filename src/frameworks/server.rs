// Framework bootstrap for the realm server runtime.

use crate::domain::PlayerStore;
use crate::domain::tilemap::TileCollisionIndex;
use crate::domain::tuning::GameTuning;
use crate::frameworks::{config, db};
use crate::interface_adapters::http::health;
use crate::interface_adapters::net::{world_update_serializer, ws_handler};
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::stores::{InMemoryPlayerStore, PostgresPlayerStore};
use crate::use_cases::{
    EnemyDirector, GameEvent, PlayerPersistence, World, WorldUpdate, tick_interval, world_task,
};

use axum::{Router, extract::ws::Utf8Bytes, routing::get};
use rand::{SeedableRng, rngs::StdRng};
use std::io::{Error, Result};
use std::sync::Arc;
use tokio::sync::{Notify, broadcast, mpsc, watch};
use tokio::task::JoinHandle;

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

// Handles to the long-lived tasks behind the router.
struct Runtime {
    state: Arc<AppState>,
    world: JoinHandle<()>,
    shutdown: Arc<Notify>,
}

pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    let address = listener.local_addr()?;
    let runtime = build_state().await?;

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .with_state(runtime.state);

    tracing::info!(%address, "listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .inspect_err(|e| {
            tracing::error!(error = %e, "server error");
        });

    // Let the world task flush connected players before the process exits.
    runtime.shutdown.notify_one();
    if let Err(e) = runtime.world.await {
        tracing::error!(error = %e, "world task failed");
    }
    served
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = format!("{}:{}", config::host(), config::http_port());

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

async fn build_store() -> Result<Arc<dyn PlayerStore>> {
    let Some(database_url) = config::database_url() else {
        tracing::info!("DATABASE_URL not set; player records are kept in memory");
        return Ok(Arc::new(InMemoryPlayerStore::new()));
    };

    let pool = db::connect_pool(&database_url)
        .await
        .map_err(|e| Error::other(format!("failed to connect to database: {e}")))?;
    db::run_migrations(&pool)
        .await
        .map_err(|e| Error::other(format!("failed to run migrations: {e}")))?;
    tracing::info!("player records stored in postgres");
    Ok(Arc::new(PostgresPlayerStore::new(pool)))
}

async fn build_state() -> Result<Runtime> {
    let map_path = config::map_path();
    // Without collision data the simulation cannot run.
    let collision = TileCollisionIndex::load(&map_path).map_err(|e| {
        tracing::error!(path = %map_path.display(), error = %e, "failed to load map");
        Error::other(e.to_string())
    })?;
    let (tile_width, tile_height) = collision.tile_size();
    tracing::info!(
        path = %map_path.display(),
        layers = collision.layer_names().count(),
        tile_width,
        tile_height,
        "map loaded"
    );

    let tuning = GameTuning::default();
    let tick_rate = config::tick_rate();
    let persistence = PlayerPersistence::new(build_store().await?, tuning.player);

    // input_tx/rx: every session event goes to the single world task.
    let (input_tx, input_rx) = mpsc::channel::<GameEvent>(config::INPUT_CHANNEL_CAPACITY);

    // world_tx/rx: world updates are broadcast to all clients.
    let (world_tx, _world_rx) =
        broadcast::channel::<WorldUpdate>(config::WORLD_BROADCAST_CAPACITY);

    // world_bytes_tx/rx: serialized world updates shared across all clients.
    let (world_bytes_tx, _world_bytes_rx) =
        broadcast::channel::<Utf8Bytes>(config::WORLD_BROADCAST_CAPACITY);
    let (world_latest_tx, _world_latest_rx) = watch::channel::<Utf8Bytes>(Utf8Bytes::from(""));

    let director = EnemyDirector::new(
        config::max_enemies(),
        tuning.enemy,
        tuning.world.bounds(),
        1.0 / tick_rate as f32,
        StdRng::from_entropy(),
    );
    let world = World::new(Arc::new(collision), tuning, tick_rate, director);

    // Subscribe before the world task starts so the first tick is not lost.
    tokio::spawn(world_update_serializer(
        world_tx.subscribe(),
        world_bytes_tx.clone(),
        world_latest_tx.clone(),
    ));

    let shutdown = Arc::new(Notify::new());
    let world = tokio::spawn(world_task(
        world,
        input_rx,
        input_tx.clone(),
        world_tx,
        persistence,
        tick_interval(tick_rate),
        Arc::clone(&shutdown),
    ));
    tracing::info!(tick_rate, max_enemies = config::max_enemies(), "world task started");

    Ok(Runtime {
        state: Arc::new(AppState {
            input_tx,
            world_bytes_tx,
            world_latest_tx,
            session_outbox_capacity: config::SESSION_OUTBOX_CAPACITY,
        }),
        world,
        shutdown,
    })
}
