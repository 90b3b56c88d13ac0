//! Server setup and lifecycle management

use crate::api::create_router;
use crate::api::rest::state::AppState;
use crate::config::{DaemonConfig, DirectoryConfig, StorageConfig};
use crate::error::{DaemonError, DaemonResult};
use crate::seed::load_seed;
use safeline_core::{
    AggregationView, Deadline, Directory, InMemoryDirectory, InMemoryIncidentStore,
    IncidentStore, LifecycleEngine, PostgresDirectory, PostgresIncidentStore,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Safeline daemon server
pub struct Server {
    config: DaemonConfig,
    state: AppState,
}

impl Server {
    /// Create a new server, connecting the configured backends
    pub async fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let directory = build_directory(&config.directory).await?;
        let store = build_store(&config.storage).await?;

        let deadline = Deadline::from_millis(config.engine.store_timeout_ms);
        let engine = Arc::new(LifecycleEngine::new(directory, store.clone(), deadline));
        let stats = Arc::new(AggregationView::new(
            store,
            deadline,
            Duration::from_secs(config.engine.stats_cache_ttl_secs),
        ));

        Ok(Self {
            state: AppState::new(engine, stats),
            config,
        })
    }

    /// Run the server
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;

        // Create router
        let app = create_router(self.state, &self.config.server);

        // Create listener
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Safeline daemon listening on {}", addr);

        // Run server with graceful shutdown
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        tracing::info!("Safeline daemon shutting down");

        Ok(())
    }
}

async fn build_directory(config: &DirectoryConfig) -> DaemonResult<Arc<dyn Directory>> {
    match config {
        DirectoryConfig::Memory { seed_path: None } => {
            tracing::warn!("Using an empty in-memory directory; no site will resolve");
            Ok(Arc::new(InMemoryDirectory::new()))
        }
        DirectoryConfig::Memory {
            seed_path: Some(path),
        } => {
            let seed = load_seed(path).map_err(|e| DaemonError::Config(format!("{:#}", e)))?;
            Ok(Arc::new(InMemoryDirectory::from_seed(seed).await))
        }
        DirectoryConfig::Postgres {
            url,
            max_connections,
            connect_timeout_secs,
        } => {
            let directory =
                PostgresDirectory::new(url, *max_connections, *connect_timeout_secs).await?;
            tracing::info!("Connected to directory database");
            Ok(Arc::new(directory))
        }
    }
}

async fn build_store(config: &StorageConfig) -> DaemonResult<Arc<dyn IncidentStore>> {
    match config {
        StorageConfig::Memory => {
            tracing::info!("Using in-memory incident store");
            Ok(Arc::new(InMemoryIncidentStore::new()))
        }
        StorageConfig::Postgres {
            url,
            max_connections,
            connect_timeout_secs,
        } => {
            let store =
                PostgresIncidentStore::new(url, *max_connections, *connect_timeout_secs).await?;
            tracing::info!("Connected to incident database");
            Ok(Arc::new(store))
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
