//! Summit Quiz Back binary entrypoint wiring REST, SSE, the reconciler and the storage backend.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::{Context, bail};
use axum::Router;
use futures::future::BoxFuture;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use summit_quiz_back::{
    config::AppConfig,
    dao::{
        event_store::{EventStore, MemoryEventStore},
        storage::StorageError,
    },
    routes,
    services::{content_loader, reconciler, sse_events, storage_supervisor},
    state::{AppState, SharedState},
};

type ConnectFuture = BoxFuture<'static, Result<Arc<dyn EventStore>, StorageError>>;
type Connector = Box<dyn FnMut() -> ConnectFuture + Send>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let content = content_loader::load();
    let connector = select_backend()?;

    let app_state = AppState::new(config);

    tokio::spawn(storage_supervisor::run(app_state.clone(), content, connector));
    tokio::spawn(reconciler::run(app_state.clone()));
    tokio::spawn(sse_events::relay_degraded_changes(app_state.clone()));

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

/// Pick the storage backend named by `STORE_BACKEND` (`memory`, `mongo` or `couch`).
fn select_backend() -> anyhow::Result<Connector> {
    let backend = env::var("STORE_BACKEND").unwrap_or_else(|_| "memory".into());
    info!(%backend, "selected storage backend");

    match backend.as_str() {
        "memory" => {
            let store = MemoryEventStore::new();
            Ok(Box::new(move || -> ConnectFuture {
                let store: Arc<dyn EventStore> = Arc::new(store.clone());
                Box::pin(async move { Ok::<_, StorageError>(store) })
            }))
        }
        #[cfg(feature = "mongo-store")]
        "mongo" => {
            use summit_quiz_back::dao::event_store::mongodb::{MongoConfig, MongoEventStore};
            Ok(Box::new(|| -> ConnectFuture {
                Box::pin(async {
                    let config = MongoConfig::from_env().await?;
                    let store = MongoEventStore::connect(config).await?;
                    Ok::<_, StorageError>(Arc::new(store) as Arc<dyn EventStore>)
                })
            }))
        }
        #[cfg(feature = "couch-store")]
        "couch" => {
            use summit_quiz_back::dao::event_store::couchdb::{CouchConfig, CouchEventStore};
            Ok(Box::new(|| -> ConnectFuture {
                Box::pin(async {
                    let config = CouchConfig::from_env()?;
                    let store = CouchEventStore::connect(config).await?;
                    Ok::<_, StorageError>(Arc::new(store) as Arc<dyn EventStore>)
                })
            }))
        }
        other => bail!("unsupported STORE_BACKEND `{other}`"),
    }
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
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
