use std::path::Path;

use anyhow::Context;
use axum::extract::State;
use axum::http::Method;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::cache::RedisRestCache;
use crate::database::Database;
use crate::opts::ServeOpts;
use crate::stops::StopSet;
use crate::{persistence, sweeper};

pub mod error;
pub mod location;
pub mod realtime;
pub mod state;

pub use self::state::AppState;

/// Builds the full application: REST routes, the realtime channel and,
/// optionally, static files for every other path.
///
/// Must be called within a Tokio runtime: the realtime relay is spawned here.
pub fn create_app(state: AppState, public_dir: Option<&Path>) -> Router {
    let (socket_layer, io) = realtime::layer(&state);
    realtime::spawn_relay(io, &state.hub);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    let mut router = Router::new()
        .route("/api/health", get(health))
        .route("/api/stops", get(stops))
        .route("/api/location/update", post(location::update))
        .route("/api/location/{jeep_id}", get(location::get))
        .route("/api/locations", get(location::list))
        .route("/positions", get(location::positions));
    if let Some(public_dir) = public_dir {
        router = router.fallback_service(ServeDir::new(public_dir));
    }
    router
        .layer(socket_layer)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(error::panic_response))
        .with_state(state)
}

pub async fn run(opts: ServeOpts) -> crate::Result {
    let stops = match &opts.stops {
        Some(path) => StopSet::from_csv(path)?,
        None => StopSet::default(),
    };
    info!(n_lines = stops.lines().len(), n_stops = stops.iter().count(), "stops loaded");

    let database = opts.database_url.as_deref().map(Database::connect_lazy).transpose()?;
    if let Some(database) = database.clone() {
        tokio::spawn(async move {
            if let Err(error) = database.initialize_schema().await {
                error!("{:#}", error);
            }
        });
    }
    let cache = match opts.cache_credentials() {
        Some((url, token)) => Some(RedisRestCache::new(url, token)?),
        None => None,
    };

    let state = AppState::new(stops)
        .with_cache(cache.clone())
        .with_database(database.is_some());
    persistence::spawn(&state.hub, database, cache);
    if let Some(stale_after) = opts.stale_after {
        sweeper::spawn(state.store.clone(), state.hub.clone(), stale_after);
    }

    let app = create_app(state, opts.public_dir.as_deref());
    let listener = TcpListener::bind((opts.host.as_str(), opts.port))
        .await
        .with_context(|| format!("failed to bind {}:{}", opts.host, opts.port))?;
    info!("server is running on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("the server has crashed")?;
    info!("the server has stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received the shutdown signal"),
        Err(error) => error!("unable to listen for the shutdown signal: {}", error),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Health {
    status: &'static str,
    connected_clients: usize,
    db: bool,
    redis: bool,
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        connected_clients: state.viewers.get(),
        db: state.database_enabled,
        redis: state.cache.is_some(),
    })
}

async fn stops(State(state): State<AppState>) -> Json<StopSet> {
    Json(StopSet::clone(&state.stops))
}
