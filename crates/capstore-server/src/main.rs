//! `capstore` binary
//!
//! Stores opaque objects over HTTP and hands out capability tokens for them.

use anyhow::{Context, Result};
use capstore_authorization::ActionScheme;
use capstore_core::{ObjectStorage, RootKeyStorage};
use capstore_server::{router, AppState, ServiceConfig};
use capstore_store::{FilesystemStore, MemoryObjectStorage, MemoryRootKeyStorage};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "capstore")]
#[command(about = "Capstore - capability-protected opaque object storage", long_about = None)]
struct Cli {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path prefix the routes are mounted under
    #[arg(long)]
    prefix: Option<String>,

    /// Listen address
    #[arg(long)]
    http_addr: Option<String>,

    /// Directory for persistent storage (in-memory when unset)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Location label stamped on minted tokens
    #[arg(long)]
    location: Option<String>,

    /// Caveat kind restricting the allowed action: operation or method
    #[arg(long)]
    action_scheme: Option<ActionScheme>,

    /// Largest accepted object, in bytes
    #[arg(long)]
    max_object_size: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Defaults, then the config file, then the environment, then flags
    fn service_config(&self) -> Result<ServiceConfig> {
        let mut config = match &self.config {
            Some(path) => ServiceConfig::load_from_file(path)?,
            None => ServiceConfig::default(),
        };
        config.merge_with_env()?;

        if let Some(prefix) = &self.prefix {
            config.prefix.clone_from(prefix);
        }
        if let Some(addr) = &self.http_addr {
            config.http_addr.clone_from(addr);
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = Some(dir.clone());
        }
        if let Some(location) = &self.location {
            config.location.clone_from(location);
        }
        if let Some(scheme) = self.action_scheme {
            config.action_scheme = scheme;
        }
        if let Some(size) = self.max_object_size {
            config.max_object_size = size;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .init();

    let config = cli.service_config()?;
    let (objects, root_keys) = open_storage(&config)?;

    let addr = config.socket_addr()?;
    let state = AppState::from_config(&config, objects, root_keys);
    let app = router(state, config.max_object_size);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(
        %addr,
        prefix = %config.normalized_prefix(),
        action_scheme = ?config.action_scheme,
        "Capstore listening"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Capstore stopped");
    Ok(())
}

fn open_storage(
    config: &ServiceConfig,
) -> Result<(Arc<dyn ObjectStorage>, Arc<dyn RootKeyStorage>)> {
    match &config.data_dir {
        Some(dir) => {
            let store = FilesystemStore::open(dir)
                .with_context(|| format!("failed to open storage at {}", dir.display()))?;
            Ok((Arc::new(store.objects()), Arc::new(store.root_keys())))
        }
        None => {
            warn!("No data_dir configured, objects are kept in memory and lost on exit");
            Ok((
                Arc::new(MemoryObjectStorage::new()),
                Arc::new(MemoryRootKeyStorage::new()),
            ))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
