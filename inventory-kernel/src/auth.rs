/**
 * ACCESS GATE - Authentication check in front of every read endpoint
 *
 * ROLE:
 * The login flow (OAuth/OIDC, external) hands out session tokens through
 * `SessionStore::open`. The gate accepts a request carrying a live session
 * cookie, or an `x-api-key` header matching INVENTORY_API_KEY for scripts.
 * Anything else is rejected before the handler runs.
 */

use crate::state::{new_state, Shared};
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "inventory_session";
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Granted { subject: String },
    Denied,
}

pub trait AccessGate: Send + Sync {
    fn check(&self, headers: &HeaderMap) -> Access;
}

pub type SharedGate = Arc<dyn AccessGate>;

#[derive(Debug, Clone)]
struct Session {
    subject: String,
    expires_at: OffsetDateTime,
}

/// In-memory sessions keyed by random token.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Shared<HashMap<String, Session>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl_hours: i64) -> Self {
        Self {
            sessions: new_state(HashMap::new()),
            ttl: Duration::hours(ttl_hours.max(1)),
        }
    }

    /// Opens a session for an authenticated subject and returns its token.
    /// Expired sessions are pruned on the way.
    pub fn open(&self, subject: &str) -> String {
        let now = OffsetDateTime::now_utc();
        let token = Uuid::new_v4().to_string();
        let session = Session {
            subject: subject.to_string(),
            expires_at: now + self.ttl,
        };
        let mut sessions = self.sessions.lock();
        sessions.retain(|_, s| s.expires_at > now);
        sessions.insert(token.clone(), session);
        token
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn close(&self, token: &str) {
        self.sessions.lock().remove(token);
    }

    /// Subject of a live session; expired sessions are dropped on lookup.
    pub fn subject(&self, token: &str) -> Option<String> {
        let mut sessions = self.sessions.lock();
        let session = sessions.get(token)?;
        if session.expires_at <= OffsetDateTime::now_utc() {
            sessions.remove(token);
            return None;
        }
        Some(session.subject.clone())
    }
}

pub struct SessionGate {
    sessions: SessionStore,
    api_key: Option<String>,
}

impl SessionGate {
    pub fn new(sessions: SessionStore, api_key: Option<String>) -> Self {
        if api_key.is_none() {
            warn!("INVENTORY_API_KEY not set, only login sessions can read the inventory");
        }
        Self { sessions, api_key }
    }
}

impl AccessGate for SessionGate {
    fn check(&self, headers: &HeaderMap) -> Access {
        if let Some(token) = cookie_value(headers, SESSION_COOKIE) {
            if let Some(subject) = self.sessions.subject(token) {
                return Access::Granted { subject };
            }
        }

        let presented = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
        match (&self.api_key, presented) {
            (Some(expected), Some(key)) if keys_match(key, expected) => Access::Granted {
                subject: "api-key".into(),
            },
            _ => Access::Denied,
        }
    }
}

/// Compares digests so the time taken does not depend on where the keys differ.
fn keys_match(presented: &str, expected: &str) -> bool {
    let presented = Sha256::digest(presented.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    presented
        .iter()
        .zip(expected.iter())
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

pub async fn require_session(
    State(gate): State<SharedGate>,
    req: Request,
    next: Next,
) -> Response {
    match gate.check(req.headers()) {
        Access::Granted { subject } => {
            debug!("{} {} by {}", req.method(), req.uri().path(), subject);
            next.run(req).await
        }
        Access::Denied => {
            warn!("Unauthenticated access to {} denied", req.uri().path());
            (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": "authentication required" })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_session_cookie_is_accepted() {
        let sessions = SessionStore::new(1);
        let token = sessions.open("alice");
        let gate = SessionGate::new(sessions, None);

        let cookie = format!("theme=dark; {SESSION_COOKIE}={token}");
        assert_eq!(
            gate.check(&headers(&[("cookie", cookie.as_str())])),
            Access::Granted { subject: "alice".into() }
        );
        assert_eq!(gate.check(&headers(&[("cookie", "inventory_session=forged")])), Access::Denied);
        assert_eq!(gate.check(&HeaderMap::new()), Access::Denied);
    }

    #[test]
    fn test_closed_session_is_rejected() {
        let sessions = SessionStore::new(1);
        let token = sessions.open("alice");
        sessions.close(&token);
        assert!(sessions.subject(&token).is_none());
    }

    #[test]
    fn test_open_prunes_expired_sessions() {
        let sessions = SessionStore {
            sessions: new_state(HashMap::new()),
            ttl: Duration::seconds(-1),
        };
        let first = sessions.open("alice");
        sessions.open("bob");
        let last = sessions.open("carol");
        assert_eq!(sessions.len(), 1);
        assert!(sessions.subject(&first).is_none());
        assert!(sessions.subject(&last).is_none());
        assert!(sessions.is_empty());
    }

    #[test]
    fn test_keys_match() {
        assert!(keys_match("k3y", "k3y"));
        assert!(!keys_match("k3y", "k3y-longer"));
        assert!(!keys_match("", "k3y"));
    }

    #[test]
    fn test_api_key() {
        let gate = SessionGate::new(SessionStore::new(1), Some("k3y".into()));
        assert!(matches!(gate.check(&headers(&[("x-api-key", "k3y")])), Access::Granted { .. }));
        assert_eq!(gate.check(&headers(&[("x-api-key", "nope")])), Access::Denied);

        let keyless = SessionGate::new(SessionStore::new(1), None);
        assert_eq!(keyless.check(&headers(&[("x-api-key", "")])), Access::Denied);
    }
}
