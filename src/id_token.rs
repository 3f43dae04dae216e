use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::Error;
use crate::types::HomeAccountId;

/// Identity claims from an ID token (`sub`, `name`, `iss`, ...).
///
/// The token arrives over the back channel directly from the token endpoint,
/// so its payload is read without signature verification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdTokenClaims(Map<String, JsonValue>);

impl IdTokenClaims {
    /// Decodes the payload segment of a compact JWT.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Provider`] if the token is not a three-segment JWT or
    /// its payload is not a base64url JSON object.
    pub fn from_jwt(token: &str) -> Result<Self, Error> {
        let mut segments = token.split('.');
        let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
            (Some(_), Some(payload), Some(_), None) => payload,
            _ => return Err(Error::provider("invalid_id_token", "malformed ID token")),
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|_| Error::provider("invalid_id_token", "ID token payload is not base64url"))?;

        serde_json::from_slice::<Map<String, JsonValue>>(&bytes)
            .map(Self)
            .map_err(|_| Error::provider("invalid_id_token", "ID token payload is not a JSON object"))
    }

    /// Gets a claim value by name.
    #[must_use]
    pub fn get(&self, claim: &str) -> Option<&JsonValue> {
        self.0.get(claim)
    }

    /// Gets a string claim by name.
    #[must_use]
    pub fn get_str(&self, claim: &str) -> Option<&str> {
        self.get(claim).and_then(JsonValue::as_str)
    }

    #[must_use]
    pub fn sub(&self) -> Option<&str> {
        self.get_str("sub")
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.get_str("name")
    }

    #[must_use]
    pub fn nonce(&self) -> Option<&str> {
        self.get_str("nonce")
    }

    #[must_use]
    pub fn preferred_username(&self) -> Option<&str> {
        self.get_str("preferred_username")
    }

    /// Account key for the token cache: `{oid}.{tid}`, falling back to `sub`.
    #[must_use]
    pub fn home_account_id(&self) -> Option<HomeAccountId> {
        match (self.get_str("oid"), self.get_str("tid")) {
            (Some(oid), Some(tid)) => Some(HomeAccountId(format!("{oid}.{tid}"))),
            _ => self.sub().map(|sub| HomeAccountId(sub.to_string())),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &JsonValue)> {
        self.0.iter()
    }
}

impl From<Map<String, JsonValue>> for IdTokenClaims {
    fn from(map: Map<String, JsonValue>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
pub(crate) fn encode_unsigned_jwt(claims: &JsonValue) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.sig")
}
