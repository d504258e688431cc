use thiserror::Error;

#[derive(Debug, Error)]
pub enum TriptychError {
    #[error("api error ({status}): {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("failed to parse json: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TriptychError>;

impl TriptychError {
    /// Whether the retry layer may run the failed operation again.
    ///
    /// Bad input and rejected credentials stay broken no matter how often
    /// the call is repeated; everything else is treated as transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) => false,
            Self::Api { status, body } => match status.as_u16() {
                // invalid credential / permission denied
                401 | 403 => false,
                // 429 with exhausted quota will not recover on its own;
                // a plain rate limit will
                429 => !body.to_ascii_lowercase().contains("quota"),
                _ => true,
            },
            // Parse and shape failures are retried like transport failures.
            Self::InvalidResponse(_) => true,
            Self::Http(_) | Self::Io(_) | Self::Json(_) => true,
        }
    }
}
