use crate::error::Error;
use crate::oauth::ClientSettings;
use crate::session::Session;
use crate::token_cache::{self, AccessToken};

/// Resolves an access token for `scopes` from the session's cached accounts.
///
/// `Ok(None)` means the user has to sign in again: the cache holds no
/// account, or silent acquisition for the first account failed. With no
/// accounts the identity provider is not contacted. A refreshed token is
/// written back into the session before returning.
///
/// # Errors
///
/// Returns [`Error::Http`] when the provider cannot be reached or times out,
/// so callers fail the request instead of forcing a new sign-in.
pub async fn resolve_token(
    settings: &ClientSettings,
    http: &reqwest::Client,
    session: &mut Session,
    scopes: &[String],
) -> Result<Option<AccessToken>, Error> {
    let mut cache = token_cache::load_or_empty(session);

    let token = {
        let mut client = settings.build(http, None, Some(&mut cache));
        let Some(account) = client.accounts().into_iter().next() else {
            return Ok(None);
        };
        client.acquire_silent(scopes, &account).await?
    };

    token_cache::save(session, &mut cache)?;
    Ok(token)
}
