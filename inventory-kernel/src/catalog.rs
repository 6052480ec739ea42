/**
 * CATALOG CLIENT - Read-only access to the Consul catalog HTTP API
 *
 * ROLE:
 * Thin wrapper over the three catalog endpoints the inventory needs:
 * datacenters, services filtered on the marker tag, and instances of one
 * service filtered on the same tag.
 *
 * ERRORS:
 * Failures are typed internally (url, transport, status, decode) then logged
 * and collapsed to `None` at the public boundary. A refresh cycle never sees
 * an error, only "no data". Instances are returned as raw JSON so one
 * malformed entry cannot void the whole list.
 */

use crate::config::CatalogConfig;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, error};

/// Tag selecting reverse-proxied websites in the catalog.
pub const MARKER_TAG: &str = "ssl-proxy-backend";
const TOKEN_HEADER: &str = "X-Consul-Token";

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("invalid catalog URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered {status}")]
    Status { url: String, status: StatusCode },
    #[error("invalid body from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl CatalogClient {
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let base_url = Url::parse(&config.base_url()).map_err(|e| CatalogError::InvalidUrl {
            url: config.base_url(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(CatalogError::InvalidUrl {
                url: config.base_url(),
                reason: "not a base URL".into(),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("infra-inventory/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| CatalogError::Transport {
                url: config.base_url(),
                source,
            })?;

        Ok(Self {
            http,
            base_url,
            token: config.token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// `GET /v1/catalog/datacenters`
    pub async fn list_datacenters(&self) -> Option<Vec<String>> {
        self.get_json(&["catalog", "datacenters"], &[])
            .await
            .map_err(|e| error!("Error fetching datacenters from Consul: {e}"))
            .ok()
    }

    /// `GET /v1/catalog/services`, restricted server-side to services carrying the marker tag.
    pub async fn list_tagged_services(&self, datacenter: &str) -> Option<Map<String, Value>> {
        let filter = format!("ServiceTags contains \"{MARKER_TAG}\"");
        self.get_json(&["catalog", "services"], &[("dc", datacenter), ("filter", filter.as_str())])
            .await
            .map_err(|e| error!("Error fetching services of datacenter {datacenter} from Consul: {e}"))
            .ok()
    }

    /// `GET /v1/catalog/service/<name>` for the instances carrying the marker tag.
    /// Entries are left undecoded; see [`crate::models::CatalogInstance`].
    pub async fn list_service_instances(
        &self,
        service_name: &str,
        datacenter: &str,
    ) -> Option<Vec<Value>> {
        self.get_json(&["catalog", "service", service_name], &[("dc", datacenter), ("tag", MARKER_TAG)])
            .await
            .map_err(|e| error!("Error fetching instances for service {service_name} from Consul: {e}"))
            .ok()
    }

    /// Base URL extended with percent-encoded path segments.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, CatalogError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CatalogError::InvalidUrl {
                url: self.base_url.to_string(),
                reason: "not a base URL".into(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T, CatalogError> {
        let endpoint = self.endpoint(segments)?;
        let url = endpoint.as_str();
        let mut request = self.http.get(endpoint.clone()).query(query);
        if let Some(token) = &self.token {
            request = request.header(TOKEN_HEADER, token);
        }

        let response = request.send().await.map_err(|source| CatalogError::Transport {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status {
                url: url.to_string(),
                status,
            });
        }
        debug!("GET {url} -> {status}");

        response.json::<T>().await.map_err(|source| CatalogError::Decode {
            url: url.to_string(),
            source,
        })
    }
}
