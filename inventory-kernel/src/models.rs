use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One website discovered in the catalog, as served by the dashboard
/// and mirrored in the snapshot file.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct InventoryRecord {
    pub name: String,
    pub environment: String,
    pub stage: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

pub type Snapshot = Vec<InventoryRecord>;

/// Instance entry returned by `GET /v1/catalog/service/<name>`.
/// Only the fields the inventory reads are kept; everything is optional
/// because the catalog does not guarantee them per instance.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct CatalogInstance {
    #[serde(rename = "ServiceName", default)]
    pub service_name: Option<String>,
    #[serde(rename = "Node", default)]
    pub node: Option<String>,
    #[serde(rename = "NodeMeta", default)]
    pub node_meta: Option<HashMap<String, String>>,
    #[serde(rename = "ServiceMeta", default)]
    pub service_meta: Option<HashMap<String, String>>,
    #[serde(rename = "ServiceTags", default)]
    pub service_tags: Option<Vec<String>>,
    #[serde(default)]
    pub description: Option<String>,
}

impl CatalogInstance {
    pub fn node_meta(&self, key: &str) -> Option<&str> {
        self.node_meta.as_ref()?.get(key).map(String::as_str)
    }

    pub fn service_meta(&self, key: &str) -> Option<&str> {
        self.service_meta.as_ref()?.get(key).map(String::as_str)
    }
}
