//! Shared harness: the full router with a mocked identity provider and chat API.

#![allow(dead_code)]

use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::header::{COOKIE, LOCATION, SET_COOKIE};
use axum::http::{Request, Response, StatusCode};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chatvault::ClientSettings;
use chatvault::web::{AppConfig, MemorySessionStore, SessionStore, app_routes};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CLIENT_ID: &str = "test-client";
pub const PUBLIC_URL: &str = "http://localhost:5000";
pub const TOKEN_PATH: &str = "/common/oauth2/v2.0/token";

pub struct TestApp {
    pub router: Router,
    pub idp: MockServer,
    pub api: MockServer,
    pub download_dir: TempDir,
    cookie: Option<String>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(
            |config| config,
            MemorySessionStore::new(Duration::from_secs(600)),
        )
        .await
    }

    /// Like [`TestApp::spawn`], with config overrides and a custom session store.
    pub async fn spawn_with<S: SessionStore>(
        configure: impl FnOnce(AppConfig) -> AppConfig,
        sessions: S,
    ) -> Self {
        let idp = MockServer::start().await;
        let api = MockServer::start().await;
        let download_dir = tempfile::tempdir().unwrap();

        let authority: Url = format!("{}/common", idp.uri()).parse().unwrap();
        let config = AppConfig::new(ClientSettings::new(CLIENT_ID, "test-secret", authority))
            .with_public_url(PUBLIC_URL.parse().unwrap())
            .with_api_endpoint(format!("{}/v1.0", api.uri()).parse().unwrap())
            .with_scopes(vec!["User.Read".into(), "Chat.Read".into()])
            .with_secure_cookies(false)
            .with_download_dir(download_dir.path());

        let router = app_routes(configure(config), sessions).unwrap();

        Self {
            router,
            idp,
            api,
            download_dir,
            cookie: None,
        }
    }

    /// Sends a GET, carrying and updating the session cookie like a browser.
    pub async fn get(&mut self, uri: &str) -> Response<Body> {
        let mut request = Request::builder().uri(uri);
        if let Some(cookie) = &self.cookie {
            request = request.header(COOKIE, cookie);
        }

        let response = self
            .router
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();

        for value in response.headers().get_all(SET_COOKIE) {
            let pair = value.to_str().unwrap().split(';').next().unwrap().trim();
            match pair.split_once('=') {
                Some((_, "")) | None => self.cookie = None,
                Some(_) => self.cookie = Some(pair.to_string()),
            }
        }

        response
    }

    pub fn has_cookie(&self) -> bool {
        self.cookie.is_some()
    }

    pub fn forget_cookie(&mut self) -> Option<String> {
        self.cookie.take()
    }

    pub fn set_cookie(&mut self, cookie: String) {
        self.cookie = Some(cookie);
    }

    /// Runs `/login` and returns the provider authorization URL.
    pub async fn start_login(&mut self) -> Url {
        let response = self.get("/login").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        location(&response).parse().unwrap()
    }

    /// Completes a full sign-in with the given token lifetime.
    pub async fn sign_in(&mut self, claims: Value, expires_in: u64) {
        let auth_url = self.start_login().await;
        let state = query_param(&auth_url, "state").unwrap();
        let nonce = query_param(&auth_url, "nonce").unwrap();

        let mut claims = claims;
        claims["nonce"] = json!(nonce);
        mount_code_exchange(&self.idp, &claims, "at-1", "rt-1", expires_in).await;

        let response = self
            .get(&format!("/getAToken?code=abc123&state={state}"))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");
    }
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(LOCATION)
        .expect("redirect has a Location header")
        .to_str()
        .unwrap()
        .to_string()
}

pub fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn id_token(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}

pub async fn mount_code_exchange(
    idp: &MockServer,
    claims: &Value,
    access_token: &str,
    refresh_token: &str,
    expires_in: u64,
) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=abc123"))
        .and(body_string_contains("code_verifier="))
        .and(body_string_contains("client_secret=test-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "scope": "openid profile User.Read Chat.Read",
            "expires_in": expires_in,
            "access_token": access_token,
            "refresh_token": refresh_token,
            "id_token": id_token(claims),
        })))
        .expect(1)
        .mount(idp)
        .await;
}
