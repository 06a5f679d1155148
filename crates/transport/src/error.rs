use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Invalid transport configuration: {0}")]
    Configuration(String),

    #[error("Request URI does not carry a callback location")]
    MissingCallback,

    #[error("Invalid request URI: {0}")]
    InvalidUri(#[from] url::ParseError),

    #[error("Relay reported an error: {0}")]
    Relay(String),

    #[error("Transient relay fetch failure: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Relay cleanup failed: {0}")]
    Cleanup(String),

    #[error("Poll task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, TransportError>;
