use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use axum_server::Handle;
use content_store::{ContentStore, PinataClient};
use ledger::{EthLedger, HashLedger};
use tokio::{self, signal, sync::watch};
use tracing::info;

use crate::{
    config::ServerConfig,
    pipeline::UploadPipeline,
    routes::{create_routes, RouteState},
};

/// Clients are constructed once here and shared across all requests; the
/// pipeline holds them behind `Arc`.
#[derive(Clone)]
#[allow(dead_code)]
pub struct Service {
    pub config: ServerConfig,
    pub shutdown_tx: watch::Sender<()>,
    pub shutdown_rx: watch::Receiver<()>,
    pub pipeline: Arc<UploadPipeline>,
}

impl Service {
    pub fn new(config: ServerConfig) -> Result<Self> {
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let content_store: Arc<dyn ContentStore> = Arc::new(
            PinataClient::new(config.content_store.clone())
                .context("error initializing pinning client")?,
        );
        let hash_ledger: Arc<dyn HashLedger> = Arc::new(
            EthLedger::new(config.ledger.clone()).context("error initializing ledger client")?,
        );
        let pipeline = Arc::new(UploadPipeline::new(content_store, hash_ledger));

        Ok(Self {
            config,
            shutdown_tx,
            shutdown_rx,
            pipeline,
        })
    }

    pub async fn start(&self) -> Result<()> {
        let route_state = RouteState {
            pipeline: self.pipeline.clone(),
            upload_dir: PathBuf::from(&self.config.upload_dir),
        };

        let handle = Handle::new();
        let handle_sh = handle.clone();
        let shutdown_tx = self.shutdown_tx.clone();
        tokio::spawn(async move {
            shutdown_signal(handle_sh, shutdown_tx).await;
            info!("graceful shutdown signal received, shutting down server gracefully");
        });

        let addr: SocketAddr = self.config.listen_addr.parse()?;
        info!("server api listening on {}", self.config.listen_addr);
        let routes = create_routes(route_state);
        axum_server::bind(addr)
            .handle(handle)
            .serve(routes.into_make_service())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal(handle: Handle, shutdown_tx: watch::Sender<()>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
        },
        _ = terminate => {
        },
    }
    handle.shutdown();
    shutdown_tx.send(()).unwrap();
    info!("signal received, shutting down server gracefully");
}
