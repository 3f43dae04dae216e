use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum_extra::extract::PrivateCookieJar;

use super::config::AppConfig;
use super::cookies;
use super::error::AppError;
use super::session::{SessionContext, SessionStore};
use super::state::AppState;
use super::views;
use crate::download;
use crate::flow;
use crate::oauth::AuthResponse;
use crate::types::ChatId;

/// Create the application router.
///
/// # Errors
///
/// Returns [`AppError::Config`] if the outbound HTTP client cannot be built.
pub fn app_routes<S>(config: AppConfig, session_store: S) -> Result<Router, AppError>
where
    S: SessionStore,
{
    let redirect_path = config.settings.redirect_path.clone();
    let state = AppState::new(config, session_store)?;

    let router = Router::new()
        .route("/", get(index))
        .route("/login", get(login::<S>))
        .route(&redirect_path, get(authorized::<S>))
        .route("/logout", get(logout::<S>))
        .route("/chats", get(chats::<S>))
        .route("/chats/{chat_id}", get(chat_messages::<S>))
        .route("/chats/{chat_id}/download", get(download_chat::<S>));

    Ok(router.with_state(state))
}

// ── Landing ────────────────────────────────────────────────────────

async fn index(ctx: SessionContext) -> Response {
    match ctx.session().user() {
        Some(user) => Html(views::index(user).into_string()).into_response(),
        None => Redirect::to("/login").into_response(),
    }
}

// ── Login ──────────────────────────────────────────────────────────

async fn login<S: SessionStore>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    mut ctx: SessionContext,
) -> Result<(PrivateCookieJar, Redirect), AppError> {
    let redirect_uri = state.external_url(&headers, &state.settings.redirect_path)?;
    let auth_uri = flow::initiate(
        &state.client,
        &state.http,
        ctx.session_mut(),
        &state.settings.scopes,
        &redirect_uri,
    );

    let jar = state.commit(ctx).await?;
    Ok((jar, Redirect::to(&auth_uri)))
}

// ── Callback ───────────────────────────────────────────────────────

async fn authorized<S: SessionStore>(
    State(state): State<AppState<S>>,
    Query(params): Query<AuthResponse>,
    mut ctx: SessionContext,
) -> Result<Response, AppError> {
    let outcome = flow::complete(&state.client, &state.http, ctx.session_mut(), &params).await;
    let jar = state.commit(ctx).await?;

    match outcome {
        Ok(claims) => {
            tracing::info!(sub = claims.sub().unwrap_or_default(), "Sign-in successful");
            Ok((jar, Redirect::to("/")).into_response())
        }
        Err(e) => Ok((jar, AppError::from(e)).into_response()),
    }
}

// ── Logout ─────────────────────────────────────────────────────────

async fn logout<S: SessionStore>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    mut ctx: SessionContext,
) -> Result<(PrivateCookieJar, Redirect), AppError> {
    if !ctx.is_new {
        if let Err(e) = state.sessions.delete(&ctx.id).await {
            tracing::warn!(error = %e, "Session deletion failed during logout, storing it cleared");
            ctx.session_mut().clear();
        }
    }
    // Persists the cleared session when deletion failed; a store error aborts the logout.
    let jar = state.commit(ctx).await?;

    let post_logout = state.external_url(&headers, "/")?;
    let mut logout_url = state.client.logout_url();
    logout_url
        .query_pairs_mut()
        .append_pair("post_logout_redirect_uri", post_logout.as_str());

    let clear_cookie = cookies::clear_session_cookie(&state.settings.session_cookie_name);
    tracing::info!("Signed out");
    Ok((jar.remove(clear_cookie), Redirect::to(logout_url.as_str())))
}

// ── Chat API ───────────────────────────────────────────────────────

async fn chats<S: SessionStore>(
    State(state): State<AppState<S>>,
    mut ctx: SessionContext,
) -> Result<Response, AppError> {
    let token = state.access_token(&mut ctx).await;
    let jar = state.commit(ctx).await?;
    let Some(token) = token? else {
        return Ok((jar, Redirect::to("/login")).into_response());
    };

    let chats = state.chat_api.list_chats(&token).await?;
    Ok((jar, Html(views::chats(&chats).into_string())).into_response())
}

async fn chat_messages<S: SessionStore>(
    State(state): State<AppState<S>>,
    Path(chat_id): Path<String>,
    mut ctx: SessionContext,
) -> Result<Response, AppError> {
    let chat_id = ChatId(chat_id);
    let token = state.access_token(&mut ctx).await;
    let jar = state.commit(ctx).await?;
    let Some(token) = token? else {
        return Ok((jar, Redirect::to("/login")).into_response());
    };

    let messages = state.chat_api.list_messages(&token, &chat_id).await?;
    Ok((jar, Html(views::messages(&chat_id, &messages).into_string())).into_response())
}

async fn download_chat<S: SessionStore>(
    State(state): State<AppState<S>>,
    Path(chat_id): Path<String>,
    mut ctx: SessionContext,
) -> Result<Response, AppError> {
    let chat_id = ChatId(chat_id);
    let token = state.access_token(&mut ctx).await;
    let jar = state.commit(ctx).await?;
    let Some(token) = token? else {
        return Ok((jar, Redirect::to("/login")).into_response());
    };

    let raw = state.chat_api.messages_raw(&token, &chat_id).await?;
    let path = download::save_messages(&state.settings.download_dir, &chat_id, &raw).await?;
    Ok((jar, Html(views::saved(&path).into_string())).into_response())
}
