use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use url::Url;

use crate::error::Error;
use crate::id_token::IdTokenClaims;
use crate::pkce;
use crate::token_cache::{self, AccessToken, Account, RESERVED_SCOPES, TokenCache};

/// Process-wide client identity, loaded once at startup.
///
/// ```rust,ignore
/// let settings = ClientSettings::new(
///     "my-client-id",
///     "my-secret",
///     "https://login.microsoftonline.com/common".parse()?,
/// );
/// let client = settings.build(&http, None, Some(&mut cache));
/// ```
#[derive(Clone)]
#[non_exhaustive]
pub struct ClientSettings {
    pub(crate) client_id: String,
    pub(crate) client_secret: String,
    pub(crate) authority: Url,
}

impl std::fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSettings")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("authority", &self.authority.as_str())
            .finish()
    }
}

impl ClientSettings {
    #[must_use]
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>, authority: Url) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            authority,
        }
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Default identity-provider authority.
    #[must_use]
    pub fn authority(&self) -> &Url {
        &self.authority
    }

    /// Provider logout endpoint for the default authority.
    #[must_use]
    pub fn logout_url(&self) -> Url {
        endpoint(&self.authority, "logout")
    }

    /// Builds an auth client for `authority` (default: the configured one),
    /// optionally bound to a token cache. Performs no I/O.
    #[must_use]
    pub fn build<'a>(
        &'a self,
        http: &'a reqwest::Client,
        authority: Option<&Url>,
        cache: Option<&'a mut TokenCache>,
    ) -> AuthClient<'a> {
        AuthClient {
            settings: self,
            http,
            authority: authority.unwrap_or(&self.authority).clone(),
            cache,
        }
    }
}

/// `{authority}/oauth2/v2.0/{name}`
fn endpoint(authority: &Url, name: &str) -> Url {
    let mut url = authority.clone();
    url.set_query(None);
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().extend(["oauth2", "v2.0", name]);
    }
    url
}

/// Pending authorization-code flow, stored in the session between the two
/// redirect legs and consumed by [`AuthClient::complete_flow`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthCodeFlow {
    pub auth_uri: String,
    pub state: String,
    pub nonce: String,
    pub code_verifier: String,
    pub scopes: Vec<String>,
    pub redirect_uri: String,
}

/// Query parameters of the provider's redirect back to the app.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Token response from the token endpoint.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Deserialize)]
struct TokenErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Client for one identity-provider interaction sequence.
pub struct AuthClient<'a> {
    settings: &'a ClientSettings,
    http: &'a reqwest::Client,
    authority: Url,
    cache: Option<&'a mut TokenCache>,
}

impl AuthClient<'_> {
    /// Starts an authorization-code flow with PKCE.
    ///
    /// Nothing is sent to the provider; the returned flow must be stored
    /// before redirecting the browser to `auth_uri`.
    #[must_use]
    pub fn initiate_flow(&self, scopes: &[String], redirect_uri: &Url) -> AuthCodeFlow {
        let state = pkce::generate_state();
        let nonce = pkce::generate_nonce();
        let code_verifier = pkce::generate_code_verifier();
        let code_challenge = pkce::generate_code_challenge(&code_verifier);
        let scope = scope_param(scopes);

        let mut url = endpoint(&self.authority, "authorize");
        url.query_pairs_mut()
            .append_pair("client_id", &self.settings.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", redirect_uri.as_str())
            .append_pair("scope", &scope)
            .append_pair("state", &state)
            .append_pair("nonce", &nonce)
            .append_pair("code_challenge", &code_challenge)
            .append_pair("code_challenge_method", "S256")
            .append_pair("response_mode", "query");

        AuthCodeFlow {
            auth_uri: url.into(),
            state,
            nonce,
            code_verifier,
            scopes: scopes.to_vec(),
            redirect_uri: redirect_uri.to_string(),
        }
    }

    /// Exchanges the returned authorization code for tokens.
    ///
    /// On success the tokens are recorded in the bound cache and the ID token
    /// claims are returned.
    ///
    /// # Errors
    ///
    /// - [`Error::FlowState`] if `state` or `nonce` do not match the flow, or
    ///   the response carries neither a code nor an error.
    /// - [`Error::Provider`] if the provider returned an error or rejected the code.
    /// - [`Error::Http`] on network failure or timeout.
    pub async fn complete_flow(
        &mut self,
        flow: &AuthCodeFlow,
        response: &AuthResponse,
    ) -> Result<IdTokenClaims, Error> {
        if response.state.as_deref() != Some(flow.state.as_str()) {
            return Err(Error::FlowState("state mismatch".into()));
        }

        if let Some(error) = &response.error {
            return Err(Error::provider(
                error.as_str(),
                response.error_description.as_deref().unwrap_or_default(),
            ));
        }

        let code = response
            .code
            .as_deref()
            .ok_or_else(|| Error::FlowState("authorization response carried no code".into()))?;

        let scope = scope_param(&flow.scopes);
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", flow.redirect_uri.as_str()),
            ("code_verifier", flow.code_verifier.as_str()),
            ("scope", scope.as_str()),
        ];

        let tokens = self.token_request(&params, "code exchange").await?;

        let id_token = tokens.id_token.as_deref().ok_or_else(|| {
            Error::provider("invalid_response", "token response carried no ID token")
        })?;
        let claims = IdTokenClaims::from_jwt(id_token)?;

        if claims.nonce() != Some(flow.nonce.as_str()) {
            return Err(Error::FlowState("nonce mismatch".into()));
        }

        if let Some(cache) = self.cache.as_deref_mut() {
            let home_account_id = claims.home_account_id().ok_or_else(|| {
                Error::provider("invalid_response", "ID token carried no subject")
            })?;
            let account = Account {
                home_account_id,
                environment: self.authority.host_str().unwrap_or_default().to_string(),
                username: claims.preferred_username().map(str::to_string),
                name: claims.name().map(str::to_string),
            };
            cache.add(account, &tokens, &flow.scopes, OffsetDateTime::now_utc());
        }

        Ok(claims)
    }

    /// Accounts present in the bound cache.
    #[must_use]
    pub fn accounts(&self) -> Vec<Account> {
        self.cache
            .as_deref()
            .map(|cache| cache.accounts().to_vec())
            .unwrap_or_default()
    }

    /// Returns a cached access token for `account`, refreshing it with the
    /// stored refresh token when needed.
    ///
    /// `Ok(None)` means interactive sign-in is required: no cache, no refresh
    /// token, or the provider rejected the refresh.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure or timeout.
    pub async fn acquire_silent(
        &mut self,
        scopes: &[String],
        account: &Account,
    ) -> Result<Option<AccessToken>, Error> {
        let now = OffsetDateTime::now_utc();

        let Some(cache) = self.cache.as_deref() else {
            return Ok(None);
        };
        if let Some(token) = cache.find_access_token(account, scopes, now) {
            return Ok(Some(token));
        }
        let Some(refresh_token) = cache.refresh_token(account).map(str::to_string) else {
            tracing::debug!(account = %account.home_account_id, "No refresh token cached");
            return Ok(None);
        };

        let scope = scope_param(scopes);
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("scope", scope.as_str()),
        ];

        let tokens = match self.token_request(&params, "token refresh").await {
            Ok(tokens) => tokens,
            Err(Error::Provider { error, description }) => {
                tracing::warn!(error = %error, description = %description, "Silent token refresh rejected");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let token = AccessToken::new(
            tokens.access_token.clone(),
            token_cache::expires_on(now, tokens.expires_in),
        );
        if let Some(cache) = self.cache.as_deref_mut() {
            cache.add(account.clone(), &tokens, scopes, now);
        }

        Ok(Some(token))
    }

    async fn token_request(
        &self,
        params: &[(&str, &str)],
        operation: &'static str,
    ) -> Result<TokenResponse, Error> {
        let response = self
            .http
            .post(endpoint(&self.authority, "token"))
            .form(params)
            .send()
            .await?;

        if response.status().is_success() {
            return response.json::<TokenResponse>().await.map_err(Into::into);
        }

        let status = response.status().as_u16();
        let body = response.text().await?;
        tracing::debug!(operation, status, "Token endpoint returned an error");

        Err(match serde_json::from_str::<TokenErrorBody>(&body) {
            Ok(err) => Error::Provider {
                error: err.error,
                description: err.error_description.unwrap_or_default(),
            },
            Err(_) => Error::Provider {
                error: format!("http_{status}"),
                description: body,
            },
        })
    }
}

/// Requested scopes plus the reserved OpenID Connect scopes, space-separated.
fn scope_param(scopes: &[String]) -> String {
    let mut all: Vec<&str> = scopes.iter().map(String::as_str).collect();
    for reserved in RESERVED_SCOPES {
        if !all.iter().any(|s| s.eq_ignore_ascii_case(reserved)) {
            all.push(reserved);
        }
    }
    all.join(" ")
}
