use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};

use super::views;
use crate::error::Error;

/// Errors of the web layer.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] Error),

    /// Session store operation failed.
    #[error("Session store error: {0}")]
    Store(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::Core(Error::Provider { error, description }) => {
                tracing::warn!(error = %error, description = %description, "Sign-in rejected by identity provider");
                (
                    StatusCode::BAD_REQUEST,
                    Html(views::auth_error(&error, &description).into_string()),
                )
                    .into_response()
            }
            Self::Core(Error::FlowState(reason)) => {
                tracing::warn!(reason = %reason, "No usable authorization flow, restarting");
                Redirect::to("/").into_response()
            }
            Self::Core(Error::Downstream { status, body }) => (
                StatusCode::BAD_GATEWAY,
                Html(views::downstream_error(status, &body).into_string()),
            )
                .into_response(),
            Self::Core(Error::Http(e)) => {
                tracing::error!(error = %e, "Upstream request failed");
                (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
            }
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            Self::Core(_) | Self::Store(_) | Self::Config(_) => {
                tracing::error!(error = %self, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
        }
    }
}
