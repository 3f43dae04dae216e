//! Random values for the authorization-code flow and the session cookie.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use sha2::{Digest, Sha256};

/// `N` random bytes, base64url without padding.
fn random_urlsafe<const N: usize>() -> String {
    let bytes: [u8; N] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// PKCE code verifier: 64 URL-safe characters (RFC 7636 allows 43-128).
#[must_use]
pub fn generate_code_verifier() -> String {
    random_urlsafe::<48>()
}

/// `BASE64URL(SHA256(verifier))`
#[must_use]
pub fn generate_code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// OAuth2 `state`, 22 characters.
#[must_use]
pub fn generate_state() -> String {
    random_urlsafe::<16>()
}

/// OpenID Connect `nonce`, echoed back inside the ID token.
#[must_use]
pub fn generate_nonce() -> String {
    random_urlsafe::<24>()
}

/// Opaque session identifier, 43 characters.
#[must_use]
pub fn generate_session_id() -> String {
    random_urlsafe::<32>()
}
