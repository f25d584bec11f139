use thiserror::Error;

#[derive(Error, Debug)]
pub enum RadarError {
    #[error("Database error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Payload parsing error at `{key}`: {message}")]
    Parse { key: String, message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("A refresh is already running")]
    RefreshInProgress,

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("{0}")]
    Other(String),
}

impl RadarError {
    pub fn parse(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            key: key.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for RadarError {
    fn from(e: serde_json::Error) -> Self {
        Self::parse("$", e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RadarError>;
