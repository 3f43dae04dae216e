use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use axum_extra::extract::cookie::Key;
use url::Url;

use super::error::AppError;
use crate::oauth::ClientSettings;

/// Shared web settings used by both config and runtime state.
#[derive(Clone)]
pub(crate) struct WebSettings {
    pub(crate) cookie_key: Key,
    pub(crate) session_cookie_name: String,
    pub(crate) session_ttl: Duration,
    pub(crate) secure_cookies: bool,
    pub(crate) scopes: Vec<String>,
    pub(crate) redirect_path: String,
    pub(crate) api_endpoint: Url,
    pub(crate) public_url: Option<Url>,
    pub(crate) http_timeout: Duration,
    pub(crate) download_dir: PathBuf,
}

impl WebSettings {
    fn defaults() -> Self {
        Self {
            cookie_key: Key::generate(),
            session_cookie_name: "__chatvault_session".into(),
            session_ttl: Duration::from_secs(8 * 60 * 60),
            secure_cookies: true,
            scopes: vec!["User.Read".into(), "Chat.Read".into()],
            redirect_path: "/getAToken".into(),
            api_endpoint: Url::parse(DEFAULT_API_ENDPOINT).expect("valid default URL"),
            public_url: None,
            http_timeout: Duration::from_secs(30),
            download_dir: PathBuf::from("."),
        }
    }
}

pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com/common";
pub const DEFAULT_API_ENDPOINT: &str = "https://graph.microsoft.com/v1.0";

/// Application configuration.
///
/// Required values (`client_id`, `client_secret`) are constructor parameters.
/// Use [`from_env()`](AppConfig::from_env) for convention-based setup, or
/// [`new()`](AppConfig::new) with `with_*` methods for full control.
pub struct AppConfig {
    pub(crate) client: ClientSettings,
    pub(crate) settings: WebSettings,
    pub(crate) bind_addr: SocketAddr,
}

impl AppConfig {
    #[must_use]
    pub fn new(client: ClientSettings) -> Self {
        Self {
            client,
            settings: WebSettings::defaults(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `CLIENT_ID`: OAuth2 client ID
    /// - `CLIENT_SECRET`: OAuth2 client secret
    ///
    /// # Optional env vars
    /// - `AUTHORITY`: identity-provider authority URL
    /// - `SCOPES`: comma-separated scopes for the downstream API
    /// - `REDIRECT_PATH`: callback path registered with the provider
    /// - `API_ENDPOINT`: downstream chat API base URL
    /// - `COOKIE_KEY`: cookie encryption key bytes (at least 64)
    /// - `PUBLIC_URL`: externally visible origin of this app
    /// - `HTTP_TIMEOUT_SECS`: timeout for every outbound request
    /// - `SESSION_TTL_MINUTES`: idle lifetime of a session
    /// - `DEV_AUTH`: `"1"` or `"true"` disables secure cookies
    /// - `SECURE_COOKIES`: explicit override of the `Secure` cookie attribute
    /// - `DOWNLOAD_DIR`: directory for saved chat dumps
    /// - `BIND_ADDR`: listen address
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if required values are missing or invalid.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env()`](AppConfig::from_env), reading values from `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if required values are missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| AppError::Config(format!("{name} is required")))
        };
        let client_id = required("CLIENT_ID")?;
        let client_secret = required("CLIENT_SECRET")?;

        let authority = match lookup("AUTHORITY") {
            Some(value) => parse_http_url("AUTHORITY", &value)?,
            None => parse_http_url("AUTHORITY", DEFAULT_AUTHORITY)?,
        };

        let mut config = Self::new(ClientSettings::new(client_id, client_secret, authority));

        if let Some(scopes) = lookup("SCOPES") {
            config = config.with_scopes(
                scopes
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            );
        }
        if let Some(path) = lookup("REDIRECT_PATH") {
            if !path.starts_with('/') {
                return Err(AppError::Config("REDIRECT_PATH must start with '/'".into()));
            }
            config = config.with_redirect_path(path);
        }
        if let Some(value) = lookup("API_ENDPOINT") {
            config = config.with_api_endpoint(parse_http_url("API_ENDPOINT", &value)?);
        }
        if let Some(value) = lookup("PUBLIC_URL") {
            config = config.with_public_url(parse_http_url("PUBLIC_URL", &value)?);
        }
        if let Some(value) = lookup("HTTP_TIMEOUT_SECS") {
            let secs: u64 = value
                .parse()
                .map_err(|e| AppError::Config(format!("HTTP_TIMEOUT_SECS: {e}")))?;
            config = config.with_http_timeout(Duration::from_secs(secs));
        }
        if let Some(value) = lookup("SESSION_TTL_MINUTES") {
            let minutes: u64 = value
                .parse()
                .map_err(|e| AppError::Config(format!("SESSION_TTL_MINUTES: {e}")))?;
            config = config.with_session_ttl(Duration::from_secs(minutes * 60));
        }
        if let Some(dir) = lookup("DOWNLOAD_DIR") {
            config = config.with_download_dir(dir);
        }
        if let Some(value) = lookup("BIND_ADDR") {
            let addr: SocketAddr = value
                .parse()
                .map_err(|e| AppError::Config(format!("BIND_ADDR: {e}")))?;
            config = config.with_bind_addr(addr);
        }

        let dev_auth = matches!(lookup("DEV_AUTH").as_deref(), Some("1") | Some("true"));
        let secure_cookies = match lookup("SECURE_COOKIES").as_deref() {
            Some("1") | Some("true") => true,
            Some("0") | Some("false") => false,
            Some(other) => {
                return Err(AppError::Config(format!("SECURE_COOKIES: invalid value '{other}'")));
            }
            None => !dev_auth,
        };

        let cookie_key = match lookup("COOKIE_KEY") {
            Some(k) => Key::try_from(k.as_bytes()).map_err(|_| {
                AppError::Config(
                    "COOKIE_KEY is set but invalid (must be at least 64 bytes). \
                     Remove the env var to use an ephemeral key, or provide a valid key."
                        .into(),
                )
            })?,
            None => Key::generate(),
        };

        Ok(config
            .with_cookie_key(cookie_key)
            .with_secure_cookies(secure_cookies))
    }

    #[must_use]
    pub fn client(&self) -> &ClientSettings {
        &self.client
    }

    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    /// Idle lifetime of a session; also the session cookie's max-age.
    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        self.settings.session_ttl
    }

    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.settings.scopes
    }

    #[must_use]
    pub fn redirect_path(&self) -> &str {
        &self.settings.redirect_path
    }

    #[must_use]
    pub fn with_cookie_key(mut self, key: Key) -> Self {
        self.settings.cookie_key = key;
        self
    }

    #[must_use]
    pub fn with_session_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.settings.session_cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.settings.session_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.settings.secure_cookies = secure;
        self
    }

    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.settings.scopes = scopes;
        self
    }

    #[must_use]
    pub fn with_redirect_path(mut self, path: impl Into<String>) -> Self {
        self.settings.redirect_path = path.into();
        self
    }

    #[must_use]
    pub fn with_api_endpoint(mut self, url: Url) -> Self {
        self.settings.api_endpoint = url;
        self
    }

    #[must_use]
    pub fn with_public_url(mut self, url: Url) -> Self {
        self.settings.public_url = Some(url);
        self
    }

    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.settings.http_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.settings.download_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }
}

fn parse_http_url(name: &str, value: &str) -> Result<Url, AppError> {
    let url: Url = value
        .parse()
        .map_err(|e| AppError::Config(format!("{name}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(AppError::Config(format!("{name}: expected an http(s) URL")));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn missing_client_secret_fails_fast() {
        let err = AppConfig::from_lookup(lookup(&[("CLIENT_ID", "id")])).err().unwrap();
        assert!(err.to_string().contains("CLIENT_SECRET"));
    }

    #[test]
    fn defaults_apply() {
        let config =
            AppConfig::from_lookup(lookup(&[("CLIENT_ID", "id"), ("CLIENT_SECRET", "s")])).unwrap();

        assert_eq!(config.client().client_id(), "id");
        assert_eq!(config.client().authority().as_str(), DEFAULT_AUTHORITY);
        assert_eq!(config.scopes(), &["User.Read", "Chat.Read"]);
        assert_eq!(config.redirect_path(), "/getAToken");
        assert!(config.settings.secure_cookies);
        assert_eq!(config.bind_addr().port(), 5000);
    }

    #[test]
    fn overrides_apply() {
        let config = AppConfig::from_lookup(lookup(&[
            ("CLIENT_ID", "id"),
            ("CLIENT_SECRET", "s"),
            ("AUTHORITY", "https://login.example.com/tenant"),
            ("SCOPES", "Chat.Read, ,ChatMessage.Read"),
            ("REDIRECT_PATH", "/auth/callback"),
            ("HTTP_TIMEOUT_SECS", "5"),
            ("DEV_AUTH", "1"),
        ]))
        .unwrap();

        assert_eq!(config.client().authority().as_str(), "https://login.example.com/tenant");
        assert_eq!(config.scopes(), &["Chat.Read", "ChatMessage.Read"]);
        assert_eq!(config.redirect_path(), "/auth/callback");
        assert_eq!(config.settings.http_timeout, Duration::from_secs(5));
        assert!(!config.settings.secure_cookies);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let base = [("CLIENT_ID", "id"), ("CLIENT_SECRET", "s")];

        let mut vars = base.to_vec();
        vars.push(("AUTHORITY", "not a url"));
        assert!(AppConfig::from_lookup(lookup(&vars)).is_err());

        let mut vars = base.to_vec();
        vars.push(("REDIRECT_PATH", "getAToken"));
        assert!(AppConfig::from_lookup(lookup(&vars)).is_err());

        let mut vars = base.to_vec();
        vars.push(("COOKIE_KEY", "too-short"));
        assert!(AppConfig::from_lookup(lookup(&vars)).is_err());
    }
}
