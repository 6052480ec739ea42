/*!
Catalog payload builders

Produces instance objects with the keys Consul returns from
`/v1/catalog/service/<name>`. Only the keys a test sets are present, so
missing metadata can be exercised by simply not calling the setter.
*/

use serde_json::{json, Map, Value};

#[derive(Debug, Clone)]
pub struct InstanceBuilder {
    service: String,
    node: String,
    node_meta: Map<String, Value>,
    service_meta: Map<String, Value>,
    tags: Option<Vec<String>>,
    description: Option<String>,
}

impl InstanceBuilder {
    pub fn new<S: Into<String>>(service: S) -> Self {
        Self {
            service: service.into(),
            node: "node-1".to_string(),
            node_meta: Map::new(),
            service_meta: Map::new(),
            tags: None,
            description: None,
        }
    }

    pub fn node<S: Into<String>>(mut self, node: S) -> Self {
        self.node = node.into();
        self
    }

    /// Sets `NodeMeta.env`
    pub fn env(self, env: &str) -> Self {
        self.node_meta("env", env)
    }

    /// Sets `NodeMeta.stage`
    pub fn stage(self, stage: &str) -> Self {
        self.node_meta("stage", stage)
    }

    /// Sets `ServiceMeta.proxy_fqdn`
    pub fn proxy_fqdn(self, fqdn: &str) -> Self {
        self.service_meta("proxy_fqdn", fqdn)
    }

    pub fn node_meta(mut self, key: &str, value: &str) -> Self {
        self.node_meta.insert(key.to_string(), Value::String(value.to_string()));
        self
    }

    pub fn service_meta(mut self, key: &str, value: &str) -> Self {
        self.service_meta.insert(key.to_string(), Value::String(value.to_string()));
        self
    }

    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.tags = Some(tags.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn build(self) -> Value {
        let mut instance = json!({
            "ID": format!("{}-{}", self.node, self.service),
            "Node": self.node,
            "Address": "10.0.0.10",
            "Datacenter": "dc1",
            "ServiceID": self.service,
            "ServiceName": self.service,
            "ServicePort": 443,
            "NodeMeta": Value::Object(self.node_meta),
            "ServiceMeta": Value::Object(self.service_meta),
            "ServiceTags": self.tags,
        });
        if let Some(description) = self.description {
            instance["description"] = Value::String(description);
        }
        instance
    }
}
