//! Controller server

use crate::common::{ControllerConfig, Result};
use crate::controller::dispatcher::Dispatcher;
use crate::controller::http::{create_router, ControllerState};
use crate::controller::registry::StaticRegistry;
use crate::controller::service::Controller;
use crate::controller::transport::HttpTransport;
use std::sync::Arc;
use tokio::sync::watch;

pub struct ControllerServer {
    config: ControllerConfig,
}

impl ControllerServer {
    pub fn new(config: ControllerConfig) -> Self {
        Self { config }
    }

    /// Wire registry, transport, dispatcher and controller from the config
    pub fn build_controller(config: &ControllerConfig) -> Result<Controller> {
        config.validate()?;

        let registry = Arc::new(StaticRegistry::new(config.nodes.clone())?);
        let transport = Arc::new(HttpTransport::new(config.connect_timeout())?);
        let dispatcher = Dispatcher::new(transport, config.request_timeout(), config.max_in_flight);

        Controller::new(registry, dispatcher)
    }

    pub async fn serve(self) -> Result<()> {
        let controller = Arc::new(Self::build_controller(&self.config)?);

        tracing::info!("Starting controller");
        tracing::info!("  HTTP API: {}", self.config.bind_addr);
        tracing::info!("  Nodes: {}", self.config.nodes.len());
        tracing::info!("  Node timeout: {}ms", self.config.request_timeout_ms);
        tracing::info!("  Max in flight: {}", self.config.max_in_flight);
        for node in &self.config.nodes {
            tracing::debug!("  {} ({}) at {}", node.id, node.role, node.address);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let router = create_router(
            ControllerState::new(controller, shutdown_rx),
            self.config.max_body_bytes,
        );

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!("✓ Controller ready");

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for shutdown signal: {}", e);
                    std::future::pending::<()>().await;
                }
                tracing::info!("Shutting down, cancelling outstanding node calls");
                let _ = shutdown_tx.send(true);
            })
            .await?;

        Ok(())
    }
}
