//! Catalog API server.
//!
//! Run from repo root: `cargo run -p catalog-server`
//! Settings come from the environment (`.env` supported); see `AppSettings`.

use catalog_api::{
    app_router, builtin_config, load_from_path, resolve, AppSettings, AppState, DocumentStore, MemoryStore,
    PgDocumentStore, RustImageProcessor, SmtpMailer, StoreBackend,
};
use std::sync::Arc;
use tokio::net::TcpListener;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("catalog_api=info,catalog_server=info")),
        )
        .init();

    let settings = AppSettings::load()?;
    let config = match &settings.resources_path {
        Some(path) => load_from_path(path).await?,
        None => builtin_config()?,
    };
    let registry = resolve(&config)?;

    let store: Arc<dyn DocumentStore> = match settings.store_backend {
        StoreBackend::Postgres => Arc::new(
            PgDocumentStore::connect(
                &settings.database_url,
                settings.max_connections,
                &settings.schema,
                &registry,
            )
            .await?,
        ),
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store; data is lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    tokio::fs::create_dir_all(&settings.upload_dir).await?;
    let images = Arc::new(RustImageProcessor::new(settings.upload_dir.clone()));
    let mailer = match &settings.smtp {
        Some(smtp) => Some(Arc::new(SmtpMailer::new(smtp)?)),
        None => None,
    };

    let bind_addr = settings.bind_addr();
    let mut state = AppState::new(store, registry, images, settings);
    if let Some(mailer) = mailer {
        state = state.with_mailer(mailer);
    }

    let app = app_router(state);
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("catalog API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
