//! Inventory synchronization: walks the catalog datacenter by datacenter,
//! service by service, and turns every tagged instance into an
//! [`InventoryRecord`].
//!
//! One cycle never fails. Unreachable datacenters, services without
//! instances and malformed instances are counted in the [`SyncReport`] and
//! skipped; the caller decides from the report whether the result is worth
//! publishing.

use crate::catalog::{CatalogClient, MARKER_TAG};
use crate::models::{CatalogInstance, InventoryRecord, Snapshot};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, error, info, warn};

/// Catalog's own registration, never a website.
pub const BOOTSTRAP_SERVICE: &str = "consul";
/// Reverse-proxy management service; its instances are named after the domain they proxy.
pub const PROXY_MANAGER_SERVICE: &str = "caddy-git";
pub const PROXY_FQDN_KEY: &str = "proxy_fqdn";
/// Stored when an instance lacks `env` or `stage` node metadata.
pub const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// `false` when the datacenter list itself could not be fetched.
    pub catalog_reachable: bool,
    pub datacenters: usize,
    pub datacenters_failed: usize,
    pub services: usize,
    pub services_failed: usize,
    pub instances: usize,
    pub instances_skipped: usize,
}

impl SyncReport {
    /// A cycle is worth publishing once the catalog answered and at least one
    /// datacenter listed its services.
    pub fn is_usable(&self) -> bool {
        self.catalog_reachable && self.datacenters > self.datacenters_failed
    }
}

#[derive(Clone)]
pub struct Synchronizer {
    client: CatalogClient,
    datacenter: Option<String>,
    concurrency: usize,
}

enum ServiceOutcome {
    Records(Vec<InventoryRecord>, usize),
    Empty,
}

impl Synchronizer {
    pub fn new(client: CatalogClient, datacenter: Option<String>, concurrency: usize) -> Self {
        Self {
            client,
            datacenter,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn synchronize(&self) -> (Snapshot, SyncReport) {
        let mut report = SyncReport::default();
        let mut records = Snapshot::new();

        let datacenters = match self.client.list_datacenters().await {
            Some(dcs) if !dcs.is_empty() => dcs,
            _ => {
                error!("No datacenter returned, verify Consul connection");
                return (records, report);
            }
        };
        report.catalog_reachable = true;

        let datacenters = match &self.datacenter {
            Some(only) => {
                if !datacenters.iter().any(|dc| dc == only) {
                    warn!("Configured datacenter {only} not listed by the catalog, polling it anyway");
                }
                vec![only.clone()]
            }
            None => datacenters,
        };
        report.datacenters = datacenters.len();

        for dc in &datacenters {
            let Some(services) = self.client.list_tagged_services(dc).await else {
                report.datacenters_failed += 1;
                continue;
            };
            info!("{} services found in data center {}", services.len(), dc);

            let mut names: Vec<String> = services
                .into_iter()
                .map(|(name, _)| name)
                .filter(|name| name != BOOTSTRAP_SERVICE)
                .collect();
            names.sort();
            report.services += names.len();

            // buffered() keeps service order whatever the completion order
            let outcomes: Vec<ServiceOutcome> = stream::iter(names)
                .map(|name: String| async move { self.collect_service(&name, dc).await })
                .buffered(self.concurrency)
                .collect()
                .await;

            for outcome in outcomes {
                match outcome {
                    ServiceOutcome::Records(mut found, skipped) => {
                        report.instances += found.len();
                        report.instances_skipped += skipped;
                        records.append(&mut found);
                    }
                    ServiceOutcome::Empty => report.services_failed += 1,
                }
            }
        }

        info!(
            "Catalog sync done: {} records from {} datacenter(s), {} skipped instance(s)",
            records.len(),
            report.datacenters - report.datacenters_failed,
            report.instances_skipped
        );
        (records, report)
    }

    async fn collect_service(&self, service_name: &str, dc: &str) -> ServiceOutcome {
        debug!("Service: {service_name} ({dc})");
        let instances = match self.client.list_service_instances(service_name, dc).await {
            Some(list) if !list.is_empty() => list,
            _ => return ServiceOutcome::Empty,
        };

        let mut records = Vec::with_capacity(instances.len());
        let mut skipped = 0;
        for raw in instances {
            let instance: CatalogInstance = match serde_json::from_value(raw) {
                Ok(instance) => instance,
                Err(e) => {
                    warn!("Skipping malformed instance of {service_name} in {dc}: {e}");
                    skipped += 1;
                    continue;
                }
            };
            match extract_record(service_name, &instance) {
                Some(record) => {
                    debug!(?record, "extracted");
                    records.push(record);
                }
                None => skipped += 1,
            }
        }
        ServiceOutcome::Records(records, skipped)
    }
}

/// Shapes one catalog instance into a record.
///
/// Returns `None` when the instance has no usable `proxy_fqdn`: without it
/// there is neither a URL nor, for the proxy manager, a name.
pub fn extract_record(service_name: &str, instance: &CatalogInstance) -> Option<InventoryRecord> {
    let node = instance.node.as_deref().unwrap_or("?");
    let Some(fqdn) = instance
        .service_meta(PROXY_FQDN_KEY)
        .map(str::trim)
        .filter(|fqdn| !fqdn.is_empty())
    else {
        warn!("Skipping instance of {service_name} on node {node}: no {PROXY_FQDN_KEY} in service metadata");
        return None;
    };

    let name = if service_name == PROXY_MANAGER_SERVICE {
        fqdn.to_string()
    } else {
        instance
            .service_name
            .clone()
            .unwrap_or_else(|| service_name.to_string())
    };

    let environment = node_meta_or_unknown(instance, "env", service_name, node);
    let stage = node_meta_or_unknown(instance, "stage", service_name, node);

    let description = instance
        .description
        .clone()
        .or_else(|| instance.service_meta("description").map(str::to_string))
        .unwrap_or_default();

    let tags = instance
        .service_tags
        .iter()
        .flatten()
        .filter(|tag| tag.as_str() != MARKER_TAG)
        .cloned()
        .collect();

    Some(InventoryRecord {
        name,
        environment,
        stage,
        url: format!("https://{fqdn}"),
        description,
        tags,
    })
}

fn node_meta_or_unknown(instance: &CatalogInstance, key: &str, service_name: &str, node: &str) -> String {
    match instance.node_meta(key).filter(|v| !v.is_empty()) {
        Some(value) => value.to_string(),
        None => {
            warn!("Instance of {service_name} on node {node} has no '{key}' node metadata, using '{UNKNOWN}'");
            UNKNOWN.to_string()
        }
    }
}
