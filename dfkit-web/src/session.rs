//! Session storage
//!
//! Session data is organised in namespaces, each a JSON object. A [`Session`]
//! handle is created per request by the session middleware and shared with
//! the controller; the middleware persists it through a [`SessionStore`]
//! once the handler has run.

use crate::{WebError, WebResult};
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use dfkit_core::{FlashLevel, FlashMessage, FlashQueue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Namespace holding the pending flash messages
pub const FLASH_NAMESPACE: &str = "flash";

pub type Namespace = Map<String, Value>;

/// Everything stored for one session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    namespaces: HashMap<String, Namespace>,
}

impl SessionData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace(&self, name: &str) -> Option<&Namespace> {
        self.namespaces.get(name)
    }

    pub fn get(&self, namespace: &str, key: &str) -> Option<&Value> {
        self.namespaces.get(namespace).and_then(|ns| ns.get(key))
    }

    pub fn set(&mut self, namespace: &str, key: &str, value: Value) {
        self.namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    /// Remove a key; a namespace left empty is dropped as well.
    pub fn remove(&mut self, namespace: &str, key: &str) -> Option<Value> {
        let ns = self.namespaces.get_mut(namespace)?;
        let removed = ns.remove(key);
        if ns.is_empty() {
            self.namespaces.remove(namespace);
        }
        removed
    }

    pub fn replace_namespace(&mut self, name: &str, namespace: Namespace) {
        if namespace.is_empty() {
            self.namespaces.remove(name);
        } else {
            self.namespaces.insert(name.to_string(), namespace);
        }
    }

    pub fn take_namespace(&mut self, name: &str) -> Option<Namespace> {
        self.namespaces.remove(name)
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }
}

#[derive(Debug)]
struct SessionInner {
    id: String,
    data: SessionData,
    /// Stored id replaced by `regenerate`
    previous_id: Option<String>,
    is_new: bool,
    modified: bool,
    invalidated: bool,
}

/// Per-request session handle.
///
/// Cloning is cheap; all clones see the same data.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<Mutex<SessionInner>>,
}

impl Session {
    /// A session that has not been stored yet
    pub fn fresh() -> Self {
        Self::build(uuid::Uuid::new_v4().to_string(), SessionData::new(), true)
    }

    /// A session loaded from the store
    pub fn existing(id: impl Into<String>, data: SessionData) -> Self {
        Self::build(id.into(), data, false)
    }

    fn build(id: String, data: SessionData, is_new: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner {
                id,
                data,
                previous_id: None,
                is_new,
                modified: false,
                invalidated: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> String {
        self.lock().id.clone()
    }

    pub fn is_new(&self) -> bool {
        self.lock().is_new
    }

    pub fn is_modified(&self) -> bool {
        self.lock().modified
    }

    pub fn is_invalidated(&self) -> bool {
        self.lock().invalidated
    }

    /// Id the session was stored under before `regenerate`
    pub fn previous_id(&self) -> Option<String> {
        self.lock().previous_id.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().data.is_empty()
    }

    pub fn get(&self, namespace: &str, key: &str) -> Option<Value> {
        self.lock().data.get(namespace, key).cloned()
    }

    /// String value of a key; non-string values read as absent.
    pub fn get_str(&self, namespace: &str, key: &str) -> Option<String> {
        match self.lock().data.get(namespace, key) {
            Some(Value::String(value)) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn set(&self, namespace: &str, key: &str, value: impl Into<Value>) {
        let mut inner = self.lock();
        inner.data.set(namespace, key, value.into());
        inner.modified = true;
    }

    pub fn remove(&self, namespace: &str, key: &str) -> Option<Value> {
        let mut inner = self.lock();
        let removed = inner.data.remove(namespace, key);
        if removed.is_some() {
            inner.modified = true;
        }
        removed
    }

    /// Drop all data; the middleware destroys the stored session and
    /// expires the cookie.
    pub fn invalidate(&self) {
        let mut inner = self.lock();
        inner.data = SessionData::new();
        inner.invalidated = true;
        inner.modified = true;
    }

    /// Move the data to a new id. The middleware destroys the stored
    /// session under the old id and issues a cookie for the new one.
    pub fn regenerate(&self) {
        let mut inner = self.lock();
        let old = std::mem::replace(&mut inner.id, uuid::Uuid::new_v4().to_string());
        if !inner.is_new && inner.previous_id.is_none() {
            inner.previous_id = Some(old);
        }
        inner.modified = true;
        debug!("Session id regenerated");
    }

    pub fn snapshot(&self) -> SessionData {
        self.lock().data.clone()
    }

    /// Append a message to the flash queue
    pub fn push_flash(&self, message: impl Into<String>, level: FlashLevel) {
        let mut inner = self.lock();
        let mut queue = read_flash_queue(inner.data.namespace(FLASH_NAMESPACE));
        queue.push(message, level);

        match serde_json::to_value(&queue) {
            Ok(Value::Object(namespace)) => {
                inner.data.replace_namespace(FLASH_NAMESPACE, namespace);
                inner.modified = true;
            }
            Ok(_) => warn!("Flash queue did not serialize to an object"),
            Err(e) => warn!(error = %e, "Failed to serialize flash queue"),
        }
    }

    /// Remove and return all pending flash messages
    pub fn take_flash(&self) -> Vec<FlashMessage> {
        let mut inner = self.lock();
        match inner.data.take_namespace(FLASH_NAMESPACE) {
            Some(namespace) => {
                inner.modified = true;
                read_flash_queue(Some(&namespace)).drain()
            }
            None => Vec::new(),
        }
    }

    pub fn pending_flash(&self) -> Vec<FlashMessage> {
        read_flash_queue(self.lock().data.namespace(FLASH_NAMESPACE))
            .messages()
            .to_vec()
    }
}

fn read_flash_queue(namespace: Option<&Namespace>) -> FlashQueue {
    let Some(namespace) = namespace else {
        return FlashQueue::new();
    };

    serde_json::from_value(Value::Object(namespace.clone())).unwrap_or_else(|e| {
        warn!(error = %e, "Discarding unreadable flash queue");
        FlashQueue::new()
    })
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(missing_session)
    }
}

/// Rejection for handlers mounted without the session middleware
pub(crate) fn missing_session() -> WebError {
    WebError::Core(dfkit_core::session_error!(
        "session middleware is not installed",
        "session"
    ))
}

/// Backend persisting session data between requests
#[async_trait]
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    /// Load a live session; expired or unknown ids yield `None`.
    async fn load(&self, id: &str) -> WebResult<Option<SessionData>>;

    async fn save(&self, id: &str, data: SessionData) -> WebResult<()>;

    async fn destroy(&self, id: &str) -> WebResult<()>;

    /// Purge expired sessions, returning how many were removed
    async fn cleanup(&self) -> usize;
}

#[derive(Debug, Clone)]
struct StoredSession {
    data: SessionData,
    last_accessed: Instant,
}

impl StoredSession {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.last_accessed.elapsed() > ttl
    }
}

/// In-memory session store with idle expiry
#[derive(Debug, Clone)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, StoredSession>>>,
    ttl: Duration,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(24 * 60 * 60))
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &str) -> WebResult<Option<SessionData>> {
        let mut sessions = self.sessions.write().await;

        match sessions.get_mut(id) {
            Some(stored) if stored.is_expired(self.ttl) => {
                debug!(session_id = id, "Session expired");
                sessions.remove(id);
                Ok(None)
            }
            Some(stored) => {
                stored.last_accessed = Instant::now();
                Ok(Some(stored.data.clone()))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, id: &str, data: SessionData) -> WebResult<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(
            id.to_string(),
            StoredSession {
                data,
                last_accessed: Instant::now(),
            },
        );
        Ok(())
    }

    async fn destroy(&self, id: &str) -> WebResult<()> {
        self.sessions.write().await.remove(id);
        Ok(())
    }

    async fn cleanup(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, stored| !stored.is_expired(self.ttl));
        let removed = before - sessions.len();
        if removed > 0 {
            debug!(removed, "Purged expired sessions");
        }
        removed
    }
}
