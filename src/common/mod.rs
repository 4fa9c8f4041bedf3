//! Common utilities and types shared across fedplane

pub mod auth;
pub mod auth_middleware;
pub mod config;
pub mod error;
pub mod health;
pub mod metrics;
pub mod tracing_middleware;
pub mod utils;

pub use auth::{JwtVerifier, TokenVerifier};
pub use config::{Config, DirectorConfig, NodeRole, OriginConfig, StatConfig, TokenConfig};
pub use error::{Error, Result};
pub use health::{HealthRegistry, HealthReport, HealthStatus};
pub use metrics::Metrics;
pub use utils::{clean_path, normalize_object_path, object_url, prefix_covers, shutdown_signal};
