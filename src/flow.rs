//! Authorization-code flow driven through a [`Session`].
//!
//! `initiate` moves a session from no flow to a pending flow; `complete`
//! consumes the pending flow exactly once, whatever the outcome.

use url::Url;

use crate::error::Error;
use crate::id_token::IdTokenClaims;
use crate::oauth::{AuthResponse, ClientSettings};
use crate::session::Session;
use crate::token_cache;

/// Starts a flow, stores it as the session's pending flow and returns the
/// URI to redirect the browser to.
pub fn initiate(
    settings: &ClientSettings,
    http: &reqwest::Client,
    session: &mut Session,
    scopes: &[String],
    redirect_uri: &Url,
) -> String {
    let flow = settings.build(http, None, None).initiate_flow(scopes, redirect_uri);
    let auth_uri = flow.auth_uri.clone();
    session.set_flow(flow);
    auth_uri
}

/// Completes the session's pending flow with the provider's redirect parameters.
///
/// On success the user claims are stored in the session and the updated
/// token cache is written back. On any failure the session's user and token
/// cache are left untouched. The pending flow is removed in every case.
///
/// # Errors
///
/// - [`Error::FlowState`] if no flow is pending or the response does not match it.
/// - [`Error::Provider`] if the provider reported an error or rejected the code.
/// - [`Error::Http`] on network failure or timeout.
pub async fn complete(
    settings: &ClientSettings,
    http: &reqwest::Client,
    session: &mut Session,
    response: &AuthResponse,
) -> Result<IdTokenClaims, Error> {
    let flow = session
        .take_flow()
        .ok_or_else(|| Error::FlowState("no pending authorization flow".into()))?;

    let mut cache = token_cache::load_or_empty(session);
    let claims = settings
        .build(http, None, Some(&mut cache))
        .complete_flow(&flow, response)
        .await?;

    session.set_user(claims.clone());
    token_cache::save(session, &mut cache)?;

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ClientSettings {
        ClientSettings::new(
            "test-client",
            "test-secret",
            "https://login.example.com/common".parse().unwrap(),
        )
    }

    fn redirect() -> Url {
        "http://localhost:5000/getAToken".parse().unwrap()
    }

    #[test]
    fn initiate_stores_single_pending_flow() {
        let settings = settings();
        let http = reqwest::Client::new();
        let mut session = Session::default();

        let first = initiate(&settings, &http, &mut session, &[], &redirect());
        let second = initiate(&settings, &http, &mut session, &[], &redirect());

        assert_ne!(first, second);
        assert_eq!(session.flow().map(|f| f.auth_uri.as_str()), Some(second.as_str()));
        assert!(session.is_modified());
    }

    #[tokio::test]
    async fn complete_without_pending_flow_is_flow_state_error() {
        let settings = settings();
        let http = reqwest::Client::new();
        let mut session = Session::default();

        let err = complete(&settings, &http, &mut session, &AuthResponse::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FlowState(_)));
        assert!(session.user().is_none());
    }

    #[tokio::test]
    async fn provider_error_consumes_flow_and_sets_nothing() {
        let settings = settings();
        let http = reqwest::Client::new();
        let mut session = Session::default();
        initiate(&settings, &http, &mut session, &[], &redirect());
        let state = session.flow().map(|f| f.state.clone());

        let response = AuthResponse {
            state,
            error: Some("access_denied".into()),
            error_description: Some("User declined".into()),
            ..AuthResponse::default()
        };
        let err = complete(&settings, &http, &mut session, &response)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Provider { .. }));
        assert!(session.flow().is_none());
        assert!(session.user().is_none());
        assert!(session.token_cache_blob().is_none());

        // The flow is gone, so a replay takes the missing-flow path.
        let err = complete(&settings, &http, &mut session, &response)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FlowState(_)));
    }
}
