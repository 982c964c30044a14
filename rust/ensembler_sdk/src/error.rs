#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    #[error("Invalid base URL {url:?}: {details}")]
    InvalidUrl { url: String, details: String },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The API answered with a non-2xx status.
    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Failed to decode response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl SdkError {
    pub fn status(&self) -> Option<u16> {
        match self {
            SdkError::Api { status, .. } => Some(*status),
            SdkError::Http(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}
