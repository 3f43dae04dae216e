use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::time::{Duration, Instant};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::Key;
use tokio::sync::Mutex;

use super::cookies;
use super::error::AppError;
use super::state::AppState;
use crate::session::Session;
use crate::types::SessionId;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Server-side session persistence.
///
/// Sessions are identified by the opaque id carried in the session cookie.
/// The store owns expiry policy and per-session isolation.
///
/// # Example
///
/// ```rust,ignore
/// impl SessionStore for RedisSessions {
///     async fn load(&self, id: &SessionId) -> Result<Option<Session>, BoxError> {
///         self.get_json(id.as_str()).await
///     }
///
///     async fn save(&self, id: &SessionId, session: Session) -> Result<(), BoxError> {
///         self.set_json_ex(id.as_str(), &session, self.ttl).await
///     }
///
///     async fn delete(&self, id: &SessionId) -> Result<(), BoxError> {
///         self.del(id.as_str()).await
///     }
/// }
/// ```
pub trait SessionStore: Send + Sync + 'static {
    /// Look up a live session.
    fn load(
        &self,
        id: &SessionId,
    ) -> impl Future<Output = Result<Option<Session>, BoxError>> + Send;

    /// Insert or replace a session.
    fn save(
        &self,
        id: &SessionId,
        session: Session,
    ) -> impl Future<Output = Result<(), BoxError>> + Send;

    /// Delete a session (logout).
    fn delete(&self, id: &SessionId) -> impl Future<Output = Result<(), BoxError>> + Send;
}

struct Entry {
    session: Session,
    expires_at: Instant,
}

/// In-process session store with an idle timeout.
///
/// Every load or save pushes the session's expiry `ttl` into the future;
/// expired sessions are purged lazily.
pub struct MemorySessionStore {
    ttl: Duration,
    entries: Mutex<HashMap<SessionId, Entry>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, e| e.expires_at > now);
        entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &SessionId) -> Result<Option<Session>, BoxError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, e| e.expires_at > now);

        Ok(entries.get_mut(id).map(|entry| {
            entry.expires_at = now + self.ttl;
            entry.session.clone()
        }))
    }

    async fn save(&self, id: &SessionId, mut session: Session) -> Result<(), BoxError> {
        session.mark_saved();
        let entry = Entry {
            session,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.lock().await.insert(id.clone(), entry);
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<(), BoxError> {
        self.entries.lock().await.remove(id);
        Ok(())
    }
}

/// The current request's session.
///
/// Extracted from the private session cookie; a request without a live
/// session gets a fresh, unsaved one. Handlers hand it back through
/// [`AppState::commit`] to persist changes and set the cookie.
pub struct SessionContext {
    pub(super) id: SessionId,
    pub(super) session: Session,
    pub(super) is_new: bool,
    pub(super) jar: PrivateCookieJar,
}

impl SessionContext {
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }
}

impl<S: SessionStore> FromRequestParts<AppState<S>> for SessionContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        let jar: PrivateCookieJar<Key> = PrivateCookieJar::from_request_parts(parts, state)
            .await
            .map_err(|never: Infallible| -> AppError { match never {} })?;

        if let Some(id) = cookies::get_session_id(&jar, &state.settings.session_cookie_name) {
            let stored = state
                .sessions
                .load(&id)
                .await
                .map_err(|e| AppError::Store(e.to_string()))?;
            if let Some(session) = stored {
                return Ok(Self {
                    id,
                    session,
                    is_new: false,
                    jar,
                });
            }
        }

        Ok(Self {
            id: SessionId::generate(),
            session: Session::default(),
            is_new: true,
            jar,
        })
    }
}
