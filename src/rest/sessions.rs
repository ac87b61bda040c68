//! Cookie-keyed in-memory session store.
//!
//! Each request loads a snapshot of its session attributes and writes the
//! whole snapshot back when it finishes. Concurrent requests for the same
//! session are not serialised: the last one to finish wins.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{header, HeaderMap, HeaderValue};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::session::MemorySession;

#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Map<String, Value>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore the session for `id`, empty when unknown
    pub async fn load(&self, id: &str) -> MemorySession {
        let sessions = self.sessions.read().await;
        sessions
            .get(id)
            .cloned()
            .map(MemorySession::from_attributes)
            .unwrap_or_default()
    }

    pub async fn store(&self, id: &str, attributes: Map<String, Value>) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(id.to_string(), attributes);
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Session id carried by the request's `Cookie` header
pub fn session_id(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, id)| *name == cookie_name && !id.is_empty())
        .map(|(_, id)| id.to_string())
}

/// Existing session id, or a fresh one
pub fn session_id_or_new(headers: &HeaderMap, cookie_name: &str) -> String {
    session_id(headers, cookie_name).unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// `Set-Cookie` value binding the client to `id`
pub fn session_cookie(cookie_name: &str, id: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!("{cookie_name}={id}; Path=/; HttpOnly; SameSite=Lax")).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use serde_json::json;

    #[tokio::test]
    async fn test_store_round_trip() {
        let store = SessionStore::new();
        let mut session = store.load("abc").await;
        assert!(session.all().is_empty());

        session.put("form.form_step", json!(2));
        store.store("abc", session.into_attributes()).await;

        let restored = store.load("abc").await;
        assert_eq!(restored.get("form.form_step"), Some(json!(2)));
        assert_eq!(store.len().await, 1);
    }

    #[test]
    fn test_session_id_from_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; multistep_session=abc-123"),
        );
        assert_eq!(
            session_id(&headers, "multistep_session").as_deref(),
            Some("abc-123")
        );
        assert_eq!(session_id(&headers, "other"), None);
    }

    #[test]
    fn test_new_id_when_cookie_missing() {
        let headers = HeaderMap::new();
        let id = session_id_or_new(&headers, "multistep_session");
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_cookie_value() {
        let cookie = session_cookie("multistep_session", "abc").unwrap();
        assert_eq!(
            cookie.to_str().unwrap(),
            "multistep_session=abc; Path=/; HttpOnly; SameSite=Lax"
        );
    }
}
