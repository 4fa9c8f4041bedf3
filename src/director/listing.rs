//! Read-only server listing: advertisement + override + health per server.

use serde::Serialize;
use std::sync::Arc;

use crate::common::{Error, HealthRegistry, HealthStatus, Result};
use crate::director::advertisement::{Advertisement, AdvertisementSource, ServerType};
use crate::director::overrides::{DisabledReason, ServerOverrideRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerTypeFilter {
    All,
    OriginOnly,
    CacheOnly,
}

impl ServerTypeFilter {
    /// Parse the `server_type` query parameter; absent or empty means all.
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        match raw {
            None => Ok(ServerTypeFilter::All),
            Some(s) if s.is_empty() => Ok(ServerTypeFilter::All),
            Some(s) if s.eq_ignore_ascii_case("origin") => Ok(ServerTypeFilter::OriginOnly),
            Some(s) if s.eq_ignore_ascii_case("cache") => Ok(ServerTypeFilter::CacheOnly),
            Some(_) => Err(Error::Validation("Invalid server type".to_string())),
        }
    }

    pub fn types(&self) -> &'static [ServerType] {
        match self {
            ServerTypeFilter::All => &[ServerType::Origin, ServerType::Cache],
            ServerTypeFilter::OriginOnly => &[ServerType::Origin],
            ServerTypeFilter::CacheOnly => &[ServerType::Cache],
        }
    }
}

/// One row of the server listing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerView {
    pub name: String,
    pub auth_url: String,
    pub broker_url: String,
    /// Transfer endpoint
    pub url: String,
    /// Web interface and API
    pub web_url: String,
    #[serde(rename = "type")]
    pub server_type: ServerType,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "enableWrite")]
    pub writes: bool,
    #[serde(rename = "enableFallbackRead")]
    pub direct_reads: bool,
    #[serde(rename = "enableListing")]
    pub listings: bool,
    pub filtered: bool,
    pub filtered_type: DisabledReason,
    pub status: HealthStatus,
    pub namespace_prefixes: Vec<String>,
}

impl ServerView {
    fn from_parts(
        ad: Advertisement,
        filtered: bool,
        filtered_type: DisabledReason,
        status: HealthStatus,
    ) -> Self {
        let auth_url = ad.auth_url.unwrap_or_else(|| ad.url.clone());
        Self {
            name: ad.name,
            auth_url,
            broker_url: ad.broker_url.unwrap_or_default(),
            url: ad.url,
            web_url: ad.web_url.unwrap_or_default(),
            server_type: ad.server_type,
            latitude: ad.latitude,
            longitude: ad.longitude,
            writes: ad.writes,
            direct_reads: ad.direct_reads,
            listings: ad.listings,
            filtered,
            filtered_type,
            status,
            namespace_prefixes: ad.namespaces,
        }
    }
}

pub struct FederationListingAssembler {
    advertisements: Arc<dyn AdvertisementSource>,
    overrides: Arc<ServerOverrideRegistry>,
    health: Arc<HealthRegistry>,
}

impl FederationListingAssembler {
    pub fn new(
        advertisements: Arc<dyn AdvertisementSource>,
        overrides: Arc<ServerOverrideRegistry>,
        health: Arc<HealthRegistry>,
    ) -> Self {
        Self {
            advertisements,
            overrides,
            health,
        }
    }

    pub fn list(&self, filter: ServerTypeFilter) -> Vec<ServerView> {
        let ads = self.advertisements.list_advertisements(filter.types());

        // Lock order: override registry, then health map.
        let overrides = self.overrides.read();
        let health = self.health.read();

        ads.into_iter()
            .map(|ad| {
                let availability = overrides.effective_availability(&ad.url);
                let status = health.status_of(&ad.url);
                ServerView::from_parts(ad, availability.disabled, availability.reason, status)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::director::advertisement::AdvertisementCache;
    use std::time::Duration;

    fn assembler() -> (FederationListingAssembler, Arc<ServerOverrideRegistry>, Arc<HealthRegistry>) {
        let cache = AdvertisementCache::new(Duration::from_secs(60));
        let mut origin = Advertisement::new("origin-1", ServerType::Origin, "https://o1")
            .with_namespace("/data")
            .with_namespace("/public");
        origin.writes = true;
        cache.upsert(origin);
        let mut cached = Advertisement::new("cache-1", ServerType::Cache, "https://c1");
        cached.auth_url = Some("https://c1-auth".to_string());
        cache.upsert(cached);

        let overrides = Arc::new(ServerOverrideRegistry::new(vec!["https://c1".to_string()]));
        let health = Arc::new(HealthRegistry::new());
        let assembler =
            FederationListingAssembler::new(Arc::new(cache), overrides.clone(), health.clone());
        (assembler, overrides, health)
    }

    #[test]
    fn test_filter_parse() {
        assert_eq!(ServerTypeFilter::parse(None).unwrap(), ServerTypeFilter::All);
        assert_eq!(ServerTypeFilter::parse(Some("")).unwrap(), ServerTypeFilter::All);
        assert_eq!(
            ServerTypeFilter::parse(Some("Origin")).unwrap(),
            ServerTypeFilter::OriginOnly
        );
        assert_eq!(
            ServerTypeFilter::parse(Some("CACHE")).unwrap(),
            ServerTypeFilter::CacheOnly
        );
        assert!(matches!(
            ServerTypeFilter::parse(Some("director")),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_list_joins_state() {
        let (assembler, overrides, health) = assembler();
        health.set("https://o1", HealthStatus::Ok, "director test passed");
        overrides.toggle("https://o1", true).unwrap();

        let views = assembler.list(ServerTypeFilter::All);
        assert_eq!(views.len(), 2);

        let cache = &views[0];
        assert_eq!(cache.name, "cache-1");
        assert_eq!(cache.auth_url, "https://c1-auth");
        assert!(cache.filtered);
        assert_eq!(cache.filtered_type, DisabledReason::Static);
        assert_eq!(cache.status, HealthStatus::Unknown);

        let origin = &views[1];
        assert_eq!(origin.auth_url, "https://o1");
        assert!(origin.filtered);
        assert_eq!(origin.filtered_type, DisabledReason::TempDisabled);
        assert_eq!(origin.status, HealthStatus::Ok);
        assert_eq!(origin.namespace_prefixes, vec!["/data", "/public"]);
    }

    #[test]
    fn test_list_filtered_by_type() {
        let (assembler, _, _) = assembler();
        let views = assembler.list(ServerTypeFilter::OriginOnly);
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].server_type, ServerType::Origin);
    }

    #[test]
    fn test_view_json_shape() {
        let (assembler, _, _) = assembler();
        let views = assembler.list(ServerTypeFilter::OriginOnly);
        let json = serde_json::to_value(&views[0]).unwrap();
        assert_eq!(json["type"], "Origin");
        assert_eq!(json["enableWrite"], true);
        assert_eq!(json["filteredType"], "none");
        assert_eq!(json["status"], "unknown");
        assert_eq!(json["namespacePrefixes"][1], "/public");
    }
}
