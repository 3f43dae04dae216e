#![doc = include_str!("../README.md")]

pub mod chat_api;
pub mod download;
pub mod error;
pub mod flow;
pub mod id_token;
pub mod oauth;
pub mod pkce;
pub mod resolver;
pub mod session;
pub mod token_cache;
pub mod types;
pub mod web;

// Re-exports for convenient access
pub use chat_api::{Chat, ChatApi, ChatMessage};
pub use error::Error;
pub use id_token::IdTokenClaims;
pub use oauth::{AuthClient, AuthCodeFlow, AuthResponse, ClientSettings, TokenResponse};
pub use resolver::resolve_token;
pub use session::Session;
pub use token_cache::{AccessToken, Account, TokenCache};
pub use types::{ChatId, HomeAccountId, SessionId};
