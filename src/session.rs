use serde::{Deserialize, Serialize};

use crate::id_token::IdTokenClaims;
use crate::oauth::AuthCodeFlow;

/// Typed contents of one server-side session.
///
/// Every mutator marks the session as modified so the store is only written
/// when something actually changed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user: Option<IdTokenClaims>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    flow: Option<AuthCodeFlow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_cache: Option<String>,
    #[serde(skip)]
    modified: bool,
}

impl Session {
    /// Claims of the signed-in user, if any.
    #[must_use]
    pub fn user(&self) -> Option<&IdTokenClaims> {
        self.user.as_ref()
    }

    pub fn set_user(&mut self, claims: IdTokenClaims) {
        self.user = Some(claims);
        self.modified = true;
    }

    /// The pending authorization flow, if any.
    #[must_use]
    pub fn flow(&self) -> Option<&AuthCodeFlow> {
        self.flow.as_ref()
    }

    /// Stores a pending flow, replacing any earlier one.
    pub fn set_flow(&mut self, flow: AuthCodeFlow) {
        self.flow = Some(flow);
        self.modified = true;
    }

    /// Removes and returns the pending flow. A flow can be taken only once.
    pub fn take_flow(&mut self) -> Option<AuthCodeFlow> {
        let flow = self.flow.take();
        if flow.is_some() {
            self.modified = true;
        }
        flow
    }

    /// The serialized token cache, if one was stored.
    #[must_use]
    pub fn token_cache_blob(&self) -> Option<&str> {
        self.token_cache.as_deref()
    }

    /// Replaces the whole serialized token cache.
    pub fn replace_token_cache(&mut self, blob: String) {
        self.token_cache = Some(blob);
        self.modified = true;
    }

    /// Drops user, flow and token cache.
    pub fn clear(&mut self) {
        self.user = None;
        self.flow = None;
        self.token_cache = None;
        self.modified = true;
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.user.is_none() && self.flow.is_none() && self.token_cache.is_none()
    }

    /// Whether any mutator ran since the session was loaded.
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Marks the current contents as persisted.
    pub fn mark_saved(&mut self) {
        self.modified = false;
    }
}
