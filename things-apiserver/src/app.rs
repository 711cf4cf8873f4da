use std::sync::Arc;

use anyhow::{Context, Result};
use futures::stream::StreamExt;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::{BroadcastStream, SignalStream};
use tokio_stream::StreamMap;

use crate::config::Config;
use crate::get_metrics_recorder;
use crate::server::{spawn_prom_server, ApiServer};
use things_core::rest::{GadgetRest, WidgetRest};

/// The application object for when the API server is running.
pub struct App {
    /// The application's runtime config.
    _config: Arc<Config>,

    /// A channel used for triggering graceful shutdown.
    shutdown_tx: broadcast::Sender<()>,
    /// A channel used for triggering graceful shutdown.
    shutdown_rx: BroadcastStream<()>,

    /// The join handle of the API server.
    api_server: JoinHandle<Result<()>>,
    /// The join handle of the metrics server.
    metrics_server: JoinHandle<Result<()>>,
}

impl App {
    /// Create a new instance.
    pub async fn new(config: Arc<Config>) -> Result<Self> {
        let (shutdown_tx, _) = broadcast::channel(10);

        // Each resource is backed by its own in-memory table.
        let (widgets, gadgets) = (WidgetRest::new(), GadgetRest::new());
        let api_server = ApiServer::new(config.clone(), widgets, gadgets, shutdown_tx.clone()).spawn();
        let metrics_server = spawn_prom_server(config.metrics_port, get_metrics_recorder(&config).handle(), shutdown_tx.subscribe());

        Ok(Self {
            _config: config,
            shutdown_rx: BroadcastStream::new(shutdown_tx.subscribe()),
            shutdown_tx,
            api_server,
            metrics_server,
        })
    }

    pub fn spawn(self) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) -> Result<()> {
        let mut signals = StreamMap::new();
        signals.insert("sigterm", SignalStream::new(signal(SignalKind::terminate()).context("error building signal stream")?));
        signals.insert("sigint", SignalStream::new(signal(SignalKind::interrupt()).context("error building signal stream")?));

        loop {
            tokio::select! {
                Some((_, sig)) = signals.next() => {
                    tracing::debug!(signal = ?sig, "signal received, beginning graceful shutdown");
                    let _ = self.shutdown_tx.send(());
                    break;
                }
                _ = self.shutdown_rx.next() => break,
            }
        }

        // Begin shutdown routine.
        tracing::debug!("API server is shutting down");
        if let Err(err) = self.api_server.await.context("error joining API server handle").and_then(|res| res) {
            tracing::error!(error = ?err, "error shutting down API server");
        }
        if let Err(err) = self.metrics_server.await.context("error joining metrics server handle").and_then(|res| res) {
            tracing::error!(error = ?err, "error shutting down metrics server");
        }

        tracing::debug!("API server shutdown complete");
        Ok(())
    }
}
