//! Server advertisements
//!
//! Advertisements are produced and expired by an external feed; the director
//! only reads them through [`AdvertisementSource`]. [`AdvertisementCache`] is
//! the in-memory, TTL-bounded store that feed writes into.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServerType {
    #[serde(rename = "Origin", alias = "origin")]
    Origin,
    #[serde(rename = "Cache", alias = "cache")]
    Cache,
}

impl fmt::Display for ServerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerType::Origin => write!(f, "Origin"),
            ServerType::Cache => write!(f, "Cache"),
        }
    }
}

/// A server's self-reported metadata and namespace coverage.
///
/// `url` identifies the server everywhere in the director: overrides, the
/// static filter and the health map are all keyed by it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advertisement {
    pub name: String,
    #[serde(rename = "type")]
    pub server_type: ServerType,
    /// Transfer endpoint
    pub url: String,
    #[serde(default)]
    pub auth_url: Option<String>,
    #[serde(default)]
    pub broker_url: Option<String>,
    /// Web interface and API
    #[serde(default)]
    pub web_url: Option<String>,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default)]
    pub writes: bool,
    #[serde(default)]
    pub direct_reads: bool,
    #[serde(default)]
    pub listings: bool,
    /// Namespace prefixes served, in advertised order
    #[serde(default)]
    pub namespaces: Vec<String>,
}

impl Advertisement {
    pub fn new(name: &str, server_type: ServerType, url: &str) -> Self {
        Self {
            name: name.to_string(),
            server_type,
            url: url.to_string(),
            auth_url: None,
            broker_url: None,
            web_url: None,
            latitude: 0.0,
            longitude: 0.0,
            writes: false,
            direct_reads: false,
            listings: false,
            namespaces: Vec::new(),
        }
    }

    pub fn with_namespace(mut self, prefix: &str) -> Self {
        self.namespaces.push(prefix.to_string());
        self
    }
}

/// The live server list, pulled on every listing or query.
pub trait AdvertisementSource: Send + Sync {
    fn list_advertisements(&self, types: &[ServerType]) -> Vec<Advertisement>;
}

#[derive(Debug)]
struct CachedAdvertisement {
    ad: Advertisement,
    expires_at: Instant,
}

/// In-memory advertisement store with per-entry expiry.
#[derive(Debug)]
pub struct AdvertisementCache {
    entries: RwLock<HashMap<String, CachedAdvertisement>>,
    ttl: Duration,
}

impl AdvertisementCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Insert or refresh an advertisement, restarting its TTL
    pub fn upsert(&self, ad: Advertisement) {
        let expires_at = Instant::now() + self.ttl;
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        tracing::debug!(server = %ad.url, name = %ad.name, "advertisement refreshed");
        entries.insert(ad.url.clone(), CachedAdvertisement { ad, expires_at });
    }

    pub fn remove(&self, url: &str) -> Option<Advertisement> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(url)
            .map(|c| c.ad)
    }

    /// Drop expired entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, c| c.expires_at > now);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AdvertisementSource for AdvertisementCache {
    fn list_advertisements(&self, types: &[ServerType]) -> Vec<Advertisement> {
        let now = Instant::now();
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut ads: Vec<Advertisement> = entries
            .values()
            .filter(|c| c.expires_at > now && types.contains(&c.ad.server_type))
            .map(|c| c.ad.clone())
            .collect();
        ads.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.url.cmp(&b.url)));
        ads
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_filters_by_type() {
        let cache = AdvertisementCache::new(Duration::from_secs(60));
        cache.upsert(Advertisement::new("origin-1", ServerType::Origin, "https://o1"));
        cache.upsert(Advertisement::new("cache-1", ServerType::Cache, "https://c1"));

        let origins = cache.list_advertisements(&[ServerType::Origin]);
        assert_eq!(origins.len(), 1);
        assert_eq!(origins[0].name, "origin-1");

        let all = cache.list_advertisements(&[ServerType::Origin, ServerType::Cache]);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "cache-1");
    }

    #[test]
    fn test_upsert_replaces_by_url() {
        let cache = AdvertisementCache::new(Duration::from_secs(60));
        cache.upsert(Advertisement::new("origin-1", ServerType::Origin, "https://o1"));
        cache.upsert(
            Advertisement::new("origin-1", ServerType::Origin, "https://o1").with_namespace("/data"),
        );

        let ads = cache.list_advertisements(&[ServerType::Origin]);
        assert_eq!(ads.len(), 1);
        assert_eq!(ads[0].namespaces, vec!["/data"]);
    }

    #[test]
    fn test_expired_entries_hidden_and_purged() {
        let cache = AdvertisementCache::new(Duration::ZERO);
        cache.upsert(Advertisement::new("origin-1", ServerType::Origin, "https://o1"));

        assert!(cache.list_advertisements(&[ServerType::Origin]).is_empty());
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_server_type_serde() {
        let t: ServerType = serde_json::from_str("\"cache\"").unwrap();
        assert_eq!(t, ServerType::Cache);
        assert_eq!(serde_json::to_string(&ServerType::Origin).unwrap(), "\"Origin\"");
    }
}
