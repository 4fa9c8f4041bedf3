//! Quorum object availability queries
//!
//! A query asks every enabled server whose longest matching namespace prefix
//! covers the object path whether it has the object, and decides whether
//! enough of them answered:
//!
//! - at least `min_responses` successes: satisfied, up to `max_responses` results
//! - some, but fewer than `min_responses`: soft failure carrying partial results
//! - none: not found
//!
//! Probes run concurrently in the calling task. Collection stops as soon as
//! `max_responses` successes arrive or the query deadline passes; dropping
//! the pending set cancels every outstanding probe.

use futures_util::future::BoxFuture;
use futures_util::stream::{FuturesUnordered, StreamExt};
use reqwest::header::{CONTENT_LENGTH, LAST_MODIFIED};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::common::{object_url, prefix_covers, Error, Metrics, Result, StatConfig};
use crate::director::advertisement::{Advertisement, AdvertisementSource, ServerType};
use crate::director::overrides::ServerOverrideRegistry;

/// What one server reported about an object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    pub server_name: String,
    pub server_url: String,
    /// Full URL of the object on that server
    pub url: String,
    pub content_length: Option<u64>,
    pub checksum: Option<String>,
    pub last_modified: Option<String>,
}

/// Asks a single server about a single object.
pub trait StatProbe: Send + Sync {
    fn stat<'a>(
        &'a self,
        server: &'a Advertisement,
        path: &'a str,
    ) -> BoxFuture<'a, Result<ObjectMetadata>>;
}

/// `HEAD {server.url}{path}`; 200 is a hit, 404 is `NotFound`.
pub struct HttpStatProbe {
    client: reqwest::Client,
}

impl HttpStatProbe {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("fedplane-director/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

fn header_string(headers: &reqwest::header::HeaderMap, name: impl reqwest::header::AsHeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

impl StatProbe for HttpStatProbe {
    fn stat<'a>(
        &'a self,
        server: &'a Advertisement,
        path: &'a str,
    ) -> BoxFuture<'a, Result<ObjectMetadata>> {
        Box::pin(async move {
            let url = object_url(&server.url, path);
            let resp = self.client.head(&url).send().await?;
            match resp.status() {
                StatusCode::OK => {
                    let headers = resp.headers();
                    Ok(ObjectMetadata {
                        server_name: server.name.clone(),
                        server_url: server.url.clone(),
                        content_length: header_string(headers, CONTENT_LENGTH)
                            .and_then(|s| s.parse().ok()),
                        checksum: header_string(headers, "Digest"),
                        last_modified: header_string(headers, LAST_MODIFIED),
                        url,
                    })
                }
                StatusCode::NOT_FOUND => Err(Error::NotFound(url)),
                status => Err(Error::Http(format!("{} returned {}", url, status))),
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Satisfied,
    /// Partial evidence: callers must not cache this as a negative result
    Insufficient { needed: usize, got: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub metadata: Vec<ObjectMetadata>,
    pub status: QueryStatus,
    pub message: String,
}

impl QueryOutcome {
    pub fn satisfied(&self) -> bool {
        self.status == QueryStatus::Satisfied
    }
}

/// Servers whose longest matching namespace prefix is the longest overall.
/// Every server tied on that prefix length is a candidate.
pub fn select_candidates(ads: Vec<Advertisement>, path: &str) -> Vec<Advertisement> {
    let scored: Vec<(usize, Advertisement)> = ads
        .into_iter()
        .filter_map(|ad| {
            let best = ad
                .namespaces
                .iter()
                .filter(|prefix| prefix_covers(prefix, path))
                .map(|prefix| prefix.trim_end_matches('/').len())
                .max()?;
            Some((best, ad))
        })
        .collect();

    let longest = match scored.iter().map(|(len, _)| *len).max() {
        Some(len) => len,
        None => return Vec::new(),
    };

    scored
        .into_iter()
        .filter(|(len, _)| *len == longest)
        .map(|(_, ad)| ad)
        .collect()
}

pub struct ObjectAvailabilityQuery {
    advertisements: Arc<dyn AdvertisementSource>,
    overrides: Arc<ServerOverrideRegistry>,
    probe: Arc<dyn StatProbe>,
    server_types: Vec<ServerType>,
    probe_timeout: Duration,
    query_deadline: Duration,
    metrics: Arc<Metrics>,
}

impl ObjectAvailabilityQuery {
    pub fn new(
        advertisements: Arc<dyn AdvertisementSource>,
        overrides: Arc<ServerOverrideRegistry>,
        probe: Arc<dyn StatProbe>,
        config: StatConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            advertisements,
            overrides,
            probe,
            server_types: vec![ServerType::Origin],
            probe_timeout: config.probe_timeout(),
            query_deadline: config.query_deadline(),
            metrics,
        }
    }

    /// Restrict or widen which server roles are asked (origins by default)
    pub fn with_server_types(mut self, types: Vec<ServerType>) -> Self {
        self.server_types = types;
        self
    }

    /// Query with the configured aggregate deadline
    pub async fn query(
        &self,
        path: &str,
        min_responses: usize,
        max_responses: usize,
    ) -> Result<QueryOutcome> {
        let deadline = Instant::now() + self.query_deadline;
        self.query_until(path, min_responses, max_responses, deadline)
            .await
    }

    /// Query bounded by the caller's own deadline
    pub async fn query_until(
        &self,
        path: &str,
        min_responses: usize,
        max_responses: usize,
        deadline: Instant,
    ) -> Result<QueryOutcome> {
        if let Err(e) = validate_request(path, min_responses, max_responses) {
            self.metrics.queries.invalid.inc();
            return Err(e);
        }

        let ads = self.advertisements.list_advertisements(&self.server_types);
        let candidates = select_candidates(ads, path);
        if candidates.is_empty() {
            self.metrics.queries.no_prefix.inc();
            return Err(Error::NoPrefixMatch(path.to_string()));
        }

        let enabled: Vec<Advertisement> = {
            let overrides = self.overrides.read();
            candidates
                .into_iter()
                .filter(|ad| {
                    let disabled = overrides.is_disabled(&ad.url);
                    if disabled {
                        debug!(server = %ad.url, path = %path, "skipping disabled server");
                    }
                    !disabled
                })
                .collect()
        };

        let dispatched = enabled.len();
        let metadata = self
            .gather(&enabled, path, max_responses, deadline)
            .await;
        let got = metadata.len();

        if got == 0 {
            self.metrics.queries.not_found.inc();
            return Err(Error::NotFound(format!(
                "Number of success response: 0 is less than MinStatResponse ({}) required, {} servers queried.",
                min_responses, dispatched
            )));
        }

        if got < min_responses {
            self.metrics.queries.insufficient.inc();
            return Ok(QueryOutcome {
                metadata,
                status: QueryStatus::Insufficient {
                    needed: min_responses,
                    got,
                },
                message: format!(
                    "Number of success response: {} is less than MinStatResponse ({}) required.",
                    got, min_responses
                ),
            });
        }

        self.metrics.queries.satisfied.inc();
        Ok(QueryOutcome {
            metadata,
            status: QueryStatus::Satisfied,
            message: format!("{} of {} queried servers have the object", got, dispatched),
        })
    }

    async fn gather(
        &self,
        servers: &[Advertisement],
        path: &str,
        max_responses: usize,
        deadline: Instant,
    ) -> Vec<ObjectMetadata> {
        let mut pending: FuturesUnordered<_> = servers
            .iter()
            .map(|server| async move {
                let result = tokio::time::timeout(self.probe_timeout, self.probe.stat(server, path)).await;
                (server, result)
            })
            .collect();

        let mut results = Vec::new();
        loop {
            let next = match tokio::time::timeout_at(deadline, pending.next()).await {
                Ok(next) => next,
                Err(_) => {
                    debug!(path = %path, outstanding = pending.len(), "stat query deadline reached");
                    break;
                }
            };
            let (server, result) = match next {
                Some(item) => item,
                None => break,
            };
            match result {
                Ok(Ok(meta)) => {
                    self.metrics.probes.ok.inc();
                    results.push(meta);
                    if results.len() >= max_responses {
                        break;
                    }
                }
                Ok(Err(Error::NotFound(_))) => {
                    self.metrics.probes.not_found.inc();
                    debug!(server = %server.url, path = %path, "object not found on server");
                }
                Ok(Err(e)) => {
                    self.metrics.probes.error.inc();
                    debug!(server = %server.url, path = %path, error = %e, "stat probe failed");
                }
                Err(_) => {
                    self.metrics.probes.timeout.inc();
                    debug!(server = %server.url, path = %path, "stat probe timed out");
                }
            }
        }
        // Dropping `pending` abandons the probes still in flight.
        results
    }
}

fn validate_request(path: &str, min_responses: usize, max_responses: usize) -> Result<()> {
    if path.is_empty() || path.ends_with('/') {
        return Err(Error::Validation(
            "Path should not be empty or ended with slash '/'".into(),
        ));
    }
    if min_responses < 1 {
        return Err(Error::InvalidParameter(
            "min_responses must be at least 1".into(),
        ));
    }
    if max_responses < min_responses {
        return Err(Error::InvalidParameter(format!(
            "max_responses ({}) must not be less than min_responses ({})",
            max_responses, min_responses
        )));
    }
    Ok(())
}
