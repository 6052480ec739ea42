/**
 * HTTP API - Dashboard page and JSON query endpoints
 *
 * ROUTES:
 * - GET /              : inventory page (records + facets)
 * - GET /filter        : filtered records as JSON
 * - GET /get_stages    : stages of one environment (or "all")
 * - GET /get_tags      : tags of one environment (or "all")
 * - GET /system/health : refresh statistics
 * - GET /health        : liveness probe, never gated
 *
 * Every route except /health goes through the access gate. Handlers only
 * read the current snapshot: when the catalog is down they answer with
 * whatever was last published, possibly nothing, never an error.
 */

use crate::auth::{require_session, SharedGate};
use crate::facets::{FacetIndex, ALL};
use crate::filter::{self, FilterQuery};
use crate::health::{HealthTracker, RefreshHealth};
use crate::models::InventoryRecord;
use crate::render::render_index;
use crate::state::SharedSnapshotStore;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{middleware, Json, Router};
use serde::Deserialize;
use tracing::{debug, error};

#[derive(Clone)]
pub struct AppState {
    pub store: SharedSnapshotStore,
    pub health: HealthTracker,
    pub gate: SharedGate,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct FilterParams {
    search: String,
    environment: String,
    stage: String,
    tag: String,
}

#[derive(Debug, Deserialize)]
struct EnvironmentParams {
    #[serde(default = "all_environments")]
    environment: String,
}

fn all_environments() -> String {
    ALL.to_string()
}

pub fn build_router(app_state: AppState) -> Router {
    let protected = Router::new()
        .route("/", get(index))
        .route("/filter", get(filter_websites))
        .route("/get_stages", get(get_stages))
        .route("/get_tags", get(get_tags))
        .route("/system/health", get(get_system_health))
        .route_layer(middleware::from_fn_with_state(
            app_state.gate.clone(),
            require_session,
        ));

    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({ "status": "ok" })) }))
        .merge(protected)
        .with_state(app_state)
}

// GET / (page)
async fn index(State(app): State<AppState>) -> Response {
    let websites = app.store.current().await;
    let facets = FacetIndex::build(&websites);
    match render_index(&websites, &facets) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("Failed to render inventory page: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// GET /filter?search=&environment=&stage=&tag=
async fn filter_websites(
    State(app): State<AppState>,
    Query(params): Query<FilterParams>,
) -> Json<Vec<InventoryRecord>> {
    let query = FilterQuery::from_params(&params.search, &params.environment, &params.stage, &params.tag);
    let websites = app.store.current().await;
    let matched = filter::query(&websites, &query);
    debug!("filter {:?} -> {}/{} websites", query, matched.len(), websites.len());
    Json(matched)
}

// GET /get_stages?environment=
async fn get_stages(
    State(app): State<AppState>,
    Query(params): Query<EnvironmentParams>,
) -> Json<Vec<String>> {
    let websites = app.store.current().await;
    Json(FacetIndex::build(&websites).stages_for(&params.environment).to_vec())
}

// GET /get_tags?environment=
async fn get_tags(
    State(app): State<AppState>,
    Query(params): Query<EnvironmentParams>,
) -> Json<Vec<String>> {
    let websites = app.store.current().await;
    Json(FacetIndex::build(&websites).tags_for(&params.environment).to_vec())
}

// GET /system/health
async fn get_system_health(State(app): State<AppState>) -> Json<RefreshHealth> {
    let websites = app.store.current().await;
    Json(app.health.get_health(websites.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{SessionGate, SessionStore, SESSION_COOKIE};
    use crate::state::SnapshotStore;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    const KEY: &str = "test-key";

    fn record(name: &str, env: &str, stage: &str, tags: &[&str]) -> InventoryRecord {
        InventoryRecord {
            name: name.into(),
            environment: env.into(),
            stage: stage.into(),
            url: format!("https://{name}.example.com"),
            description: String::new(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    struct Fixture {
        app: Router,
        sessions: SessionStore,
        _dir: tempfile::TempDir,
    }

    async fn fixture(records: Vec<InventoryRecord>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SnapshotStore::new(dir.path().join("websites.json")));
        store.replace(records).await;
        let sessions = SessionStore::new(1);
        let gate: SharedGate = Arc::new(SessionGate::new(sessions.clone(), Some(KEY.into())));
        let app = build_router(AppState {
            store,
            health: HealthTracker::new(),
            gate,
        });
        Fixture {
            app,
            sessions,
            _dir: dir,
        }
    }

    async fn get(app: &Router, uri: &str, key: Option<&str>) -> (StatusCode, Vec<u8>) {
        let mut request = Request::builder().uri(uri);
        if let Some(key) = key {
            request = request.header("x-api-key", key);
        }
        let response = app
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(app: &Router, uri: &str) -> T {
        let (status, body) = get(app, uri, Some(KEY)).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        serde_json::from_slice(&body).unwrap()
    }

    fn sample() -> Vec<InventoryRecord> {
        vec![
            record("web", "prod", "live", &["a"]),
            record("docs", "staging", "preview", &["b"]),
        ]
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let fx = fixture(vec![]).await;
        let (status, body) = get(&fx.app, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(serde_json::from_slice::<serde_json::Value>(&body).unwrap()["status"], "ok");
    }

    #[tokio::test]
    async fn test_protected_routes_require_credentials() {
        let fx = fixture(sample()).await;
        for uri in ["/", "/filter", "/get_stages", "/get_tags", "/system/health"] {
            assert_eq!(get(&fx.app, uri, None).await.0, StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(get(&fx.app, uri, Some("wrong")).await.0, StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_session_cookie_opens_the_page() {
        let fx = fixture(sample()).await;
        let token = fx.sessions.open("alice");
        let request = Request::builder()
            .uri("/")
            .header("cookie", format!("{SESSION_COOKIE}={token}"))
            .body(Body::empty())
            .unwrap();
        let response = fx.app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("https://docs.example.com"));
    }

    #[tokio::test]
    async fn test_filter_endpoint() {
        let fx = fixture(sample()).await;
        let all: Vec<InventoryRecord> = get_json(&fx.app, "/filter").await;
        assert_eq!(all, sample());

        let prod: Vec<InventoryRecord> = get_json(&fx.app, "/filter?environment=prod&stage=&tag=").await;
        assert_eq!(prod, vec![sample()[0].clone()]);

        let none: Vec<InventoryRecord> = get_json(&fx.app, "/filter?search=site").await;
        assert!(none.is_empty());

        let both: Vec<InventoryRecord> = get_json(&fx.app, "/filter?tag=a%2Cb").await;
        assert_eq!(both.len(), 2);
    }

    #[tokio::test]
    async fn test_facet_endpoints() {
        let fx = fixture(sample()).await;
        let stages: Vec<String> = get_json(&fx.app, "/get_stages").await;
        assert_eq!(stages, vec!["live", "preview"]);
        let stages: Vec<String> = get_json(&fx.app, "/get_stages?environment=staging").await;
        assert_eq!(stages, vec!["preview"]);
        let tags: Vec<String> = get_json(&fx.app, "/get_tags?environment=all").await;
        assert_eq!(tags, vec!["a", "b"]);
        let tags: Vec<String> = get_json(&fx.app, "/get_tags?environment=nowhere").await;
        assert!(tags.is_empty());
    }

    #[tokio::test]
    async fn test_empty_inventory_still_answers_json() {
        let fx = fixture(vec![]).await;
        let all: Vec<InventoryRecord> = get_json(&fx.app, "/filter?search=x").await;
        assert!(all.is_empty());
        let health: serde_json::Value = get_json(&fx.app, "/system/health").await;
        assert_eq!(health["websites"], 0);
        assert_eq!(health["refreshes"], 0);
    }
}
