//! Per-session token cache and its adapter to the session store.
//!
//! The cache is rebuilt from the session's serialized blob on every request,
//! mutated by token acquisition, and written back only when it changed.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::Error;
use crate::oauth::TokenResponse;
use crate::session::Session;
use crate::types::HomeAccountId;

/// Scopes the identity provider adds to every sign-in; never part of cache keys.
pub(crate) const RESERVED_SCOPES: [&str; 3] = ["openid", "profile", "offline_access"];

/// Access tokens expiring sooner than this are treated as expired.
const EXPIRY_SKEW_SECS: i64 = 300;

/// An account the user signed in with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub home_account_id: HomeAccountId,
    /// Host of the authority that issued the tokens.
    pub environment: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Access token handed to callers of the downstream API.
#[derive(Clone)]
pub struct AccessToken {
    secret: String,
    expires_on: i64,
}

impl AccessToken {
    pub(crate) fn new(secret: String, expires_on: i64) -> Self {
        Self { secret, expires_on }
    }

    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Expiry as a unix timestamp.
    #[must_use]
    pub fn expires_on(&self) -> i64 {
        self.expires_on
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
struct AccessTokenEntry {
    home_account_id: HomeAccountId,
    secret: String,
    scopes: BTreeSet<String>,
    expires_on: i64,
}

#[derive(Clone, Serialize, Deserialize)]
struct RefreshTokenEntry {
    home_account_id: HomeAccountId,
    secret: String,
}

/// Cached accounts, access tokens and refresh tokens.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct TokenCache {
    #[serde(default)]
    accounts: Vec<Account>,
    #[serde(default)]
    access_tokens: Vec<AccessTokenEntry>,
    #[serde(default)]
    refresh_tokens: Vec<RefreshTokenEntry>,
    #[serde(skip)]
    changed: bool,
}

impl std::fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCache")
            .field("accounts", &self.accounts)
            .field("access_tokens", &self.access_tokens.len())
            .field("refresh_tokens", &self.refresh_tokens.len())
            .field("changed", &self.changed)
            .finish()
    }
}

impl TokenCache {
    /// Rebuilds a cache from its serialized form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CacheCorrupt`] if the blob is not a serialized cache.
    pub fn from_blob(blob: &str) -> Result<Self, Error> {
        serde_json::from_str(blob).map_err(Error::CacheCorrupt)
    }

    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if encoding fails.
    pub fn to_blob(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(Error::Serialization)
    }

    /// Whether any token operation mutated the cache since it was loaded or saved.
    #[must_use]
    pub fn has_state_changed(&self) -> bool {
        self.changed
    }

    #[must_use]
    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    /// Records the result of a code exchange or refresh for `account`.
    ///
    /// Replaces the account record, any access token with the same scope set,
    /// and the account's refresh token when a new one was issued.
    pub(crate) fn add(
        &mut self,
        account: Account,
        response: &TokenResponse,
        requested_scopes: &[String],
        now: OffsetDateTime,
    ) {
        let scopes = match response.scope.as_deref() {
            Some(granted) => normalize_scopes(granted.split_whitespace()),
            None => normalize_scopes(requested_scopes.iter().map(String::as_str)),
        };
        let expires_on = expires_on(now, response.expires_in);
        let home_account_id = account.home_account_id.clone();

        self.accounts.retain(|a| a.home_account_id != home_account_id);
        self.accounts.push(account);

        self.access_tokens
            .retain(|t| !(t.home_account_id == home_account_id && t.scopes == scopes));
        self.access_tokens.push(AccessTokenEntry {
            home_account_id: home_account_id.clone(),
            secret: response.access_token.clone(),
            scopes,
            expires_on,
        });

        if let Some(refresh_token) = &response.refresh_token {
            self.refresh_tokens
                .retain(|t| t.home_account_id != home_account_id);
            self.refresh_tokens.push(RefreshTokenEntry {
                home_account_id,
                secret: refresh_token.clone(),
            });
        }

        self.changed = true;
    }

    /// Finds an unexpired access token for `account` covering `scopes`.
    #[must_use]
    pub fn find_access_token(
        &self,
        account: &Account,
        scopes: &[String],
        now: OffsetDateTime,
    ) -> Option<AccessToken> {
        let wanted = normalize_scopes(scopes.iter().map(String::as_str));
        let deadline = now.unix_timestamp() + EXPIRY_SKEW_SECS;

        self.access_tokens
            .iter()
            .filter(|t| t.home_account_id == account.home_account_id)
            .filter(|t| t.expires_on > deadline)
            .find(|t| wanted.is_subset(&t.scopes))
            .map(|t| AccessToken::new(t.secret.clone(), t.expires_on))
    }

    /// The stored refresh token for `account`.
    #[must_use]
    pub fn refresh_token(&self, account: &Account) -> Option<&str> {
        self.refresh_tokens
            .iter()
            .find(|t| t.home_account_id == account.home_account_id)
            .map(|t| t.secret.as_str())
    }
}

/// Lowercased scope set without the reserved OpenID Connect scopes.
/// Absolute expiry of a token issued at `now` with lifetime `expires_in`
/// (one hour when the provider omits it).
pub(crate) fn expires_on(now: OffsetDateTime, expires_in: Option<u64>) -> i64 {
    let lifetime = i64::try_from(expires_in.unwrap_or(3600)).unwrap_or(i64::MAX);
    now.unix_timestamp().saturating_add(lifetime)
}

pub(crate) fn normalize_scopes<'a>(scopes: impl Iterator<Item = &'a str>) -> BTreeSet<String> {
    scopes
        .map(str::to_ascii_lowercase)
        .filter(|s| !s.is_empty() && !RESERVED_SCOPES.contains(&s.as_str()))
        .collect()
}

/// Loads the session's token cache.
///
/// A session without a stored blob yields an empty cache.
///
/// # Errors
///
/// Returns [`Error::CacheCorrupt`] if a blob is stored but unreadable.
pub fn load(session: &Session) -> Result<TokenCache, Error> {
    match session.token_cache_blob() {
        Some(blob) => TokenCache::from_blob(blob),
        None => Ok(TokenCache::default()),
    }
}

/// Like [`load`], but starts fresh when the stored blob is unreadable.
#[must_use]
pub fn load_or_empty(session: &Session) -> TokenCache {
    load(session).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Discarding unreadable token cache");
        TokenCache::default()
    })
}

/// Writes the cache back into the session if it changed; otherwise does nothing.
///
/// # Errors
///
/// Returns [`Error::Serialization`] if encoding fails.
pub fn save(session: &mut Session, cache: &mut TokenCache) -> Result<(), Error> {
    if !cache.has_state_changed() {
        return Ok(());
    }
    session.replace_token_cache(cache.to_blob()?);
    cache.changed = false;
    Ok(())
}
