use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

/// Opaque server-side session identifier, carried in the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Creates a fresh random session identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(crate::pkce::generate_session_id())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Stable identifier of an account within the token cache.
///
/// `{oid}.{tid}` when the provider issues both claims, otherwise `sub`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct HomeAccountId(pub String);

/// Conversation identifier in the downstream chat API.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct ChatId(pub String);

impl ChatId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
