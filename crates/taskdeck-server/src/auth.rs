//! Session cookies and password hashing.
//!
//! A session is a random 32-byte identifier kept in a server-side map. The
//! cookie carries `<id>.<sig>` where `sig` is a BLAKE3 keyed hash of the id
//! under a key derived from `SESSION_SECRET`, so forged or truncated cookies
//! are rejected before the map is consulted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::{header, HeaderMap};
use rand::RngCore;
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;

use taskdeck_shared::constants::{KDF_CONTEXT_SESSION_KEY, SESSION_COOKIE, SESSION_ID_SIZE};

use crate::error::ApiError;

/// Key used to sign and verify session cookies.
pub struct SessionKey([u8; 32]);

impl SessionKey {
    pub fn derive(secret: &str) -> Self {
        Self(blake3::derive_key(KDF_CONTEXT_SESSION_KEY, secret.as_bytes()))
    }

    fn signature(&self, id: &str) -> String {
        hex::encode(blake3::keyed_hash(&self.0, id.as_bytes()).as_bytes())
    }

    pub fn sign(&self, id: &str) -> String {
        format!("{id}.{}", self.signature(id))
    }

    /// Return the session id if the signature matches.
    pub fn verify<'a>(&self, cookie: &'a str) -> Option<&'a str> {
        let (id, sig) = cookie.split_once('.')?;
        let expected = self.signature(id);
        if sig.len() != expected.len() || sig.as_bytes().ct_eq(expected.as_bytes()).unwrap_u8() != 1 {
            return None;
        }
        Some(id)
    }
}

#[derive(Debug, Clone)]
struct Session {
    user_id: String,
    expires_at: Instant,
}

/// Server-side session registry.
#[derive(Clone)]
pub struct Sessions {
    entries: Arc<RwLock<HashMap<String, Session>>>,
    key: Arc<SessionKey>,
    ttl: Duration,
}

impl Sessions {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            key: Arc::new(SessionKey::derive(secret)),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Start a session and return the signed cookie value.
    pub async fn create(&self, user_id: &str) -> String {
        let mut raw = [0u8; SESSION_ID_SIZE];
        rand::thread_rng().fill_bytes(&mut raw);
        let id = hex::encode(raw);

        self.entries.write().await.insert(
            id.clone(),
            Session {
                user_id: user_id.to_string(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        self.key.sign(&id)
    }

    /// Resolve a cookie value to its user id. Expired sessions are dropped.
    pub async fn resolve(&self, cookie: &str) -> Option<String> {
        let id = self.key.verify(cookie)?;
        {
            let entries = self.entries.read().await;
            let session = entries.get(id)?;
            if session.expires_at > Instant::now() {
                return Some(session.user_id.clone());
            }
        }
        self.entries.write().await.remove(id);
        None
    }

    pub async fn revoke(&self, cookie: &str) {
        if let Some(id) = self.key.verify(cookie) {
            self.entries.write().await.remove(id);
        }
    }

    pub async fn purge_expired(&self) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, session| session.expires_at > now);
        let purged = before - entries.len();
        if purged > 0 {
            tracing::debug!(purged, "expired sessions removed");
        }
    }
}

/// Read the session cookie from the request headers.
pub fn read_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == SESSION_COOKIE).then_some(value)
        })
}

pub fn session_cookie(value: &str, ttl: Duration, secure: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={value}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}",
        ttl.as_secs()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_cookie(secure: bool) -> String {
    session_cookie("", Duration::ZERO, secure)
}

/// bcrypt hashing on the blocking pool.
#[derive(Clone)]
pub struct PasswordHasher {
    cost: u32,
    /// Verified against when the email is unknown, so both paths cost the same.
    dummy_hash: Arc<str>,
}

impl PasswordHasher {
    pub async fn new(cost: u32) -> Result<Self, ApiError> {
        let dummy = blocking(move || bcrypt::hash("taskdeck-timing-guard", cost)).await?;
        Ok(Self {
            cost,
            dummy_hash: dummy.into(),
        })
    }

    pub async fn hash(&self, password: String) -> Result<String, ApiError> {
        let cost = self.cost;
        blocking(move || bcrypt::hash(password, cost)).await
    }

    /// Verify against `hash`, or against the dummy hash when `hash` is `None`.
    /// Returns `false` in the latter case.
    pub async fn verify(&self, password: String, hash: Option<String>) -> Result<bool, ApiError> {
        let known = hash.is_some();
        let hash = hash.unwrap_or_else(|| self.dummy_hash.to_string());
        let matches = blocking(move || bcrypt::verify(password, &hash)).await?;
        Ok(known && matches)
    }
}

async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, bcrypt::BcryptError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("password task failed: {e}")))?
        .map_err(|e| ApiError::Internal(format!("bcrypt: {e}")))
}
