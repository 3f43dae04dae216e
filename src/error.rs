#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The identity provider rejected the authorization or the code exchange.
    #[error("identity provider error: {error}: {description}")]
    Provider { error: String, description: String },
    /// The serialized token cache stored in the session could not be read.
    #[error("token cache is corrupt: {0}")]
    CacheCorrupt(#[source] serde_json::Error),
    /// No usable pending authorization flow (missing, expired or mismatched).
    #[error("authorization flow state error: {0}")]
    FlowState(String),
    /// The downstream chat API answered with a non-2xx status.
    #[error("downstream API returned {status}: {body}")]
    Downstream { status: u16, body: String },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[source] serde_json::Error),
}

impl Error {
    pub(crate) fn provider(error: impl Into<String>, description: impl Into<String>) -> Self {
        Self::Provider {
            error: error.into(),
            description: description.into(),
        }
    }
}
