//! HTTP surface: sign-in routes, server-side sessions and chat pages.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use chatvault::web::{AppConfig, MemorySessionStore, app_routes};
//!
//! let config = AppConfig::from_env()?;
//! let sessions = MemorySessionStore::new(std::time::Duration::from_secs(8 * 3600));
//! let app = app_routes(config, sessions)?;
//! axum::serve(listener, app).await?;
//! ```

mod config;
mod cookies;
mod error;
mod routes;
mod session;
mod state;
mod views;

pub use config::{AppConfig, DEFAULT_API_ENDPOINT, DEFAULT_AUTHORITY};
pub use error::AppError;
pub use routes::app_routes;
pub use session::{BoxError, MemorySessionStore, SessionContext, SessionStore};

/// Re-export cookie key type for builder API.
pub use axum_extra::extract::cookie::Key as CookieKey;
