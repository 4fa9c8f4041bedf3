//! Origin server

use std::net::SocketAddr;
use std::sync::Arc;

use crate::common::auth_middleware::AuthState;
use crate::common::{shutdown_signal, JwtVerifier, OriginConfig, Result};
use crate::origin::http::{create_router, OriginState};

pub struct OriginServer {
    config: OriginConfig,
    node_id: String,
}

impl OriginServer {
    pub fn new(config: OriginConfig, node_id: String) -> Self {
        Self { config, node_id }
    }

    pub async fn serve(self) -> Result<()> {
        tracing::info!("Starting origin: {}", self.node_id);
        tracing::info!("  HTTP API: {}", self.config.bind_addr);
        tracing::info!(
            "  Director test timeout: {:?}",
            self.config.director_test_timeout()
        );

        let state = OriginState::new(self.config.director_test_timeout());
        let auth = AuthState::new(Arc::new(JwtVerifier::from_config(&self.config.auth)));
        let monitor = state.monitor.clone();
        let router = create_router(state, auth);

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        monitor.start();
        tracing::info!("✓ Origin ready");

        let result = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await;

        tracing::info!("Gracefully stopping the director test timeout loop");
        monitor.stop().await;

        if let Err(e) = &result {
            tracing::error!("HTTP server error: {}", e);
        }
        result?;
        tracing::info!("Origin stopped");
        Ok(())
    }
}
