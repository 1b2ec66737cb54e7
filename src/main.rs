//! Trivia Back binary entrypoint wiring the command surface, gateway, SSE, and storage layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "mongo-store")]
use trivia_back::dao::trivia_store::mongodb::{MongoConfig, MongoTriviaStore};
use trivia_back::{
    config::AppConfig,
    dao::{
        storage::StorageError,
        trivia_store::{InMemoryTriviaStore, TriviaStore},
    },
    routes,
    services::storage_supervisor,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let app_state = AppState::new(AppConfig::load());
    spawn_storage(app_state.clone())?;

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Start the storage supervisor for the backend selected by `STORAGE_BACKEND`.
fn spawn_storage(state: SharedState) -> anyhow::Result<()> {
    let default_backend = if cfg!(feature = "mongo-store") {
        "mongo"
    } else {
        "memory"
    };
    let backend = env::var("STORAGE_BACKEND").unwrap_or_else(|_| default_backend.into());

    match backend.as_str() {
        "memory" => {
            warn!("using in-memory storage; results are lost on restart");
            tokio::spawn(storage_supervisor::run(state, || async {
                let store: Arc<dyn TriviaStore> = Arc::new(InMemoryTriviaStore::new());
                Ok::<_, StorageError>(store)
            }));
        }
        #[cfg(feature = "mongo-store")]
        "mongo" => {
            let uri =
                env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into());
            let db_name = env::var("MONGO_DB").ok();
            info!(backend = "mongo", "storage backend selected");
            tokio::spawn(storage_supervisor::run(state, move || {
                let uri = uri.clone();
                let db_name = db_name.clone();
                async move {
                    let config = MongoConfig::from_uri(&uri, db_name.as_deref())
                        .await
                        .map_err(StorageError::from)?;
                    let store: Arc<dyn TriviaStore> = Arc::new(
                        MongoTriviaStore::connect(config)
                            .await
                            .map_err(StorageError::from)?,
                    );
                    Ok::<_, StorageError>(store)
                }
            }));
        }
        other => anyhow::bail!("unsupported STORAGE_BACKEND `{other}`"),
    }

    Ok(())
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
