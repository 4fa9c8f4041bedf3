//! Director server

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::common::auth_middleware::AuthState;
use crate::common::{shutdown_signal, DirectorConfig, HealthRegistry, JwtVerifier, Result};
use crate::director::advertisement::AdvertisementCache;
use crate::director::http::{create_router, DirectorState};
use crate::director::stat::HttpStatProbe;

/// How often expired advertisements are dropped from the cache
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

pub struct Director {
    config: DirectorConfig,
    node_id: String,
}

impl Director {
    pub fn new(config: DirectorConfig, node_id: String) -> Self {
        Self { config, node_id }
    }

    /// Advertisement cache seeded from the configured entries
    pub fn seed_advertisements(config: &DirectorConfig) -> AdvertisementCache {
        let cache = AdvertisementCache::new(config.advertisement_ttl());
        for ad in &config.advertisements {
            cache.upsert(ad.clone());
        }
        cache
    }

    pub fn auth_state(config: &DirectorConfig) -> Option<AuthState> {
        match &config.auth {
            Some(token) => Some(AuthState::new(Arc::new(JwtVerifier::from_config(token)))),
            None => {
                tracing::warn!("director.auth is not configured; toggle and stat routes are open");
                None
            }
        }
    }

    pub async fn serve(self) -> Result<()> {
        tracing::info!("Starting director: {}", self.node_id);
        tracing::info!("  HTTP API: {}", self.config.bind_addr);
        tracing::info!("  Filtered servers: {}", self.config.filtered_servers.len());
        tracing::info!(
            "  Stat probe timeout: {:?}, query deadline: {:?}",
            self.config.stat.probe_timeout(),
            self.config.stat.query_deadline()
        );

        let cache = Arc::new(Self::seed_advertisements(&self.config));
        tracing::info!("  Seeded advertisements: {}", cache.len());

        let purge = {
            let cache = cache.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(PURGE_INTERVAL);
                loop {
                    ticker.tick().await;
                    let removed = cache.purge_expired();
                    if removed > 0 {
                        tracing::debug!(removed, "purged expired advertisements");
                    }
                }
            })
        };

        let state = DirectorState::new(
            &self.config,
            cache,
            Arc::new(HealthRegistry::new()),
            Arc::new(HttpStatProbe::new()?),
        );
        let router = create_router(state, Self::auth_state(&self.config));

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!("✓ Director ready");

        let result = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await;

        purge.abort();
        if let Err(e) = &result {
            tracing::error!("HTTP server error: {}", e);
        }
        result?;
        tracing::info!("Director stopped");
        Ok(())
    }
}
