use serde::Deserialize;
use serde_json::Value as JsonValue;
use url::Url;

use crate::error::Error;
use crate::token_cache::AccessToken;
use crate::types::ChatId;

/// Client for the downstream chat API (Microsoft Graph layout).
#[derive(Debug, Clone)]
pub struct ChatApi {
    http: reqwest::Client,
    base: Url,
}

/// A conversation the signed-in user takes part in.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Chat {
    pub id: ChatId,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub chat_type: Option<String>,
    #[serde(default)]
    pub last_updated_date_time: Option<String>,
}

/// One message of a conversation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct ChatMessage {
    pub id: String,
    #[serde(default)]
    pub created_date_time: Option<String>,
    #[serde(default)]
    pub from: Option<MessageFrom>,
    #[serde(default)]
    pub body: Option<MessageBody>,
}

impl ChatMessage {
    /// Display name of the sending user, if the sender is a user.
    #[must_use]
    pub fn sender_name(&self) -> Option<&str> {
        self.from
            .as_ref()
            .and_then(|f| f.user.as_ref())
            .and_then(|u| u.display_name.as_deref())
    }

    #[must_use]
    pub fn content(&self) -> &str {
        self.body
            .as_ref()
            .and_then(|b| b.content.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageFrom {
    #[serde(default)]
    pub user: Option<Identity>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBody {
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Deserialize)]
struct Collection<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
}

impl ChatApi {
    #[must_use]
    pub fn new(http: reqwest::Client, base: Url) -> Self {
        Self { http, base }
    }

    /// Lists the signed-in user's chats (`GET {base}/me/chats`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Downstream`] on a non-2xx status, [`Error::Http`] on
    /// network failure.
    pub async fn list_chats(&self, token: &AccessToken) -> Result<Vec<Chat>, Error> {
        let url = self.url(&["me", "chats"]);
        let collection: Collection<Chat> = self.get(url, token).await?.json().await?;
        Ok(collection.value)
    }

    /// Lists the messages of one chat (`GET {base}/chats/{id}/messages`).
    ///
    /// # Errors
    ///
    /// See [`ChatApi::list_chats`].
    pub async fn list_messages(
        &self,
        token: &AccessToken,
        chat_id: &ChatId,
    ) -> Result<Vec<ChatMessage>, Error> {
        let url = self.messages_url(chat_id);
        let collection: Collection<ChatMessage> = self.get(url, token).await?.json().await?;
        Ok(collection.value)
    }

    /// The full JSON document of one chat's messages, as returned by the API.
    ///
    /// # Errors
    ///
    /// See [`ChatApi::list_chats`].
    pub async fn messages_raw(&self, token: &AccessToken, chat_id: &ChatId) -> Result<JsonValue, Error> {
        let url = self.messages_url(chat_id);
        Ok(self.get(url, token).await?.json().await?)
    }

    fn messages_url(&self, chat_id: &ChatId) -> Url {
        self.url(&["chats", chat_id.as_str(), "messages"])
    }

    /// Appends percent-encoded path segments to the base URL.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get(&self, url: Url, token: &AccessToken) -> Result<reqwest::Response, Error> {
        let response = self
            .http
            .get(url)
            .bearer_auth(token.secret())
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await?;
        tracing::warn!(status, "Downstream API call failed");
        Err(Error::Downstream { status, body })
    }
}
