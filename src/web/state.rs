use std::sync::Arc;

use axum::extract::FromRef;
use axum::http::HeaderMap;
use axum::http::header::HOST;
use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::Key;
use url::Url;

use super::config::{AppConfig, WebSettings};
use super::cookies;
use super::error::AppError;
use super::session::{SessionContext, SessionStore};
use crate::chat_api::ChatApi;
use crate::oauth::ClientSettings;
use crate::resolver;
use crate::token_cache::AccessToken;

/// Shared state for route handlers.
pub(super) struct AppState<S> {
    pub(super) client: Arc<ClientSettings>,
    pub(super) http: reqwest::Client,
    pub(super) chat_api: ChatApi,
    pub(super) sessions: Arc<S>,
    pub(super) settings: Arc<WebSettings>,
}

// Manual Clone: avoid derive adding an `S: Clone` bound.
impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            http: self.http.clone(),
            chat_api: self.chat_api.clone(),
            sessions: self.sessions.clone(),
            settings: self.settings.clone(),
        }
    }
}

// PrivateCookieJar requires Key to be extractable from state
impl<S: SessionStore> FromRef<AppState<S>> for Key {
    fn from_ref(state: &AppState<S>) -> Self {
        state.settings.cookie_key.clone()
    }
}

impl<S: SessionStore> AppState<S> {
    pub(super) fn new(config: AppConfig, sessions: S) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(config.settings.http_timeout)
            .build()
            .map_err(|e| AppError::Config(format!("HTTP client: {e}")))?;
        let chat_api = ChatApi::new(http.clone(), config.settings.api_endpoint.clone());

        Ok(Self {
            client: Arc::new(config.client),
            http,
            chat_api,
            sessions: Arc::new(sessions),
            settings: Arc::new(config.settings),
        })
    }

    /// Persists the session if it changed and returns the cookie jar to send.
    ///
    /// A new session gets its cookie only once something was stored in it.
    pub(super) async fn commit(&self, ctx: SessionContext) -> Result<PrivateCookieJar, AppError> {
        let SessionContext {
            id,
            mut session,
            is_new,
            jar,
        } = ctx;

        if !session.is_modified() {
            return Ok(jar);
        }
        session.mark_saved();
        self.sessions
            .save(&id, session)
            .await
            .map_err(|e| AppError::Store(e.to_string()))?;

        if !is_new {
            return Ok(jar);
        }
        Ok(jar.add(cookies::session_cookie(
            &self.settings.session_cookie_name,
            &id,
            self.settings.session_ttl,
            self.settings.secure_cookies,
        )))
    }

    /// Resolves an access token for the configured scopes from the session's cache.
    pub(super) async fn access_token(
        &self,
        ctx: &mut SessionContext,
    ) -> Result<Option<AccessToken>, AppError> {
        resolver::resolve_token(&self.client, &self.http, ctx.session_mut(), &self.settings.scopes)
            .await
            .map_err(Into::into)
    }

    /// Absolute URL of `path` as seen by the browser.
    ///
    /// Uses the configured public URL, otherwise `X-Forwarded-Proto` /
    /// `X-Forwarded-Host` / `Host`.
    pub(super) fn external_url(&self, headers: &HeaderMap, path: &str) -> Result<Url, AppError> {
        let origin = match &self.settings.public_url {
            Some(url) => url.clone(),
            None => request_origin(headers)?,
        };
        origin
            .join(path)
            .map_err(|e| AppError::BadRequest(format!("invalid path {path}: {e}")))
    }
}

fn request_origin(headers: &HeaderMap) -> Result<Url, AppError> {
    let first = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };

    let proto = first("x-forwarded-proto").unwrap_or_else(|| "http".to_string());
    let host = first("x-forwarded-host")
        .or_else(|| first(HOST.as_str()))
        .ok_or_else(|| AppError::BadRequest("missing Host header".into()))?;

    format!("{proto}://{host}/")
        .parse()
        .map_err(|_| AppError::BadRequest(format!("invalid host {host}")))
}
