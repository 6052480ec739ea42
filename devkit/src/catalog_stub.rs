/*!
Stub Consul catalog for tests without an agent

Serves the three catalog endpoints the kernel reads, over real HTTP, with
the same query parameters the kernel sends. Requests that match nothing
get wiremock's default 404, which the kernel treats as "no data".
*/

use serde_json::{Map, Value};
use std::net::SocketAddr;
use std::sync::Mutex;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockBuilder, MockServer, ResponseTemplate};

pub const MARKER_TAG: &str = "ssl-proxy-backend";
pub const TOKEN_HEADER: &str = "X-Consul-Token";

pub struct MockCatalog {
    server: MockServer,
    token: Mutex<Option<String>>,
}

impl MockCatalog {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
            token: Mutex::new(None),
        }
    }

    pub fn address(&self) -> SocketAddr {
        *self.server.address()
    }

    pub fn host(&self) -> String {
        self.address().ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.address().port()
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Endpoints mounted after this call only answer requests carrying the token.
    pub async fn require_token(&self, token: &str) {
        *self.token.lock().unwrap() = Some(token.to_string());
    }

    /// `GET /v1/catalog/datacenters`
    pub async fn with_datacenters(&self, datacenters: &[&str]) {
        self.get("/v1/catalog/datacenters")
            .respond_with(ResponseTemplate::new(200).set_body_json(datacenters))
            .mount(&self.server)
            .await;
    }

    pub async fn fail_datacenters(&self, status: u16) {
        self.get("/v1/catalog/datacenters")
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// `GET /v1/catalog/services?dc=<dc>&filter=...`, every service carrying the marker tag.
    pub async fn with_services(&self, dc: &str, services: &[&str]) {
        let body: Map<String, Value> = services
            .iter()
            .map(|name| (name.to_string(), serde_json::json!([MARKER_TAG])))
            .collect();
        self.services_route(dc)
            .respond_with(ResponseTemplate::new(200).set_body_json(Value::Object(body)))
            .mount(&self.server)
            .await;
    }

    pub async fn fail_services(&self, dc: &str, status: u16) {
        self.services_route(dc)
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// `GET /v1/catalog/service/<name>?dc=<dc>&tag=<marker>`
    pub async fn with_instances(&self, dc: &str, service: &str, instances: Vec<Value>) {
        self.get(&format!("/v1/catalog/service/{service}"))
            .and(query_param("dc", dc))
            .and(query_param("tag", MARKER_TAG))
            .respond_with(ResponseTemplate::new(200).set_body_json(Value::Array(instances)))
            .mount(&self.server)
            .await;
    }

    /// Fails the test (when the stub is dropped) if the instances of this
    /// service are ever requested.
    pub async fn forbid_instances(&self, dc: &str, service: &str) {
        self.get(&format!("/v1/catalog/service/{service}"))
            .and(query_param("dc", dc))
            .respond_with(ResponseTemplate::new(200).set_body_json(Value::Array(vec![])))
            .expect(0)
            .mount(&self.server)
            .await;
    }

    fn services_route(&self, dc: &str) -> MockBuilder {
        self.get("/v1/catalog/services")
            .and(query_param("dc", dc))
            .and(query_param("filter", format!("ServiceTags contains \"{MARKER_TAG}\"")))
    }

    fn get(&self, route: &str) -> MockBuilder {
        let builder = Mock::given(method("GET")).and(path(route));
        let token = self.token.lock().unwrap().clone();
        match token {
            Some(token) => builder.and(header(TOKEN_HEADER, token.as_str())),
            None => builder,
        }
    }
}
