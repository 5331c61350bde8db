use thiserror::Error;

/// Errors raised by the view layer.
#[derive(Debug, Error)]
pub enum ViewError {
    #[error("element `{0}` not found")]
    MissingElement(String),

    #[error("HTTP error! status: {0}")]
    HttpStatus(u16),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("unsupported method `{0}`")]
    Method(String),

    #[error("unknown row kind `{0}`")]
    UnknownRowKind(String),

    #[error("invalid view config: {0}")]
    Config(#[from] serde_json::Error),

    #[error("browser call failed: {0}")]
    Browser(String),

    #[error("viewer `{0}` is unavailable")]
    MissingViewer(String),

    #[error("init hook `{key}` failed: {message}")]
    Hook { key: String, message: String },

    #[error("{0} canceled.")]
    Cancelled(&'static str),
}

impl ViewError {
    pub fn browser(message: impl Into<String>) -> Self {
        ViewError::Browser(message.into())
    }
}
