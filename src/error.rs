//! Error taxonomy shared by every component
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScoutError {
    /// Network, auth or malformed-response failure talking to an external service
    #[error("{service} transport error: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },

    /// The search API answered with an error payload for one phrase
    #[error("search failed for \"{phrase}\": {detail}")]
    UpstreamQuery { phrase: String, detail: String },

    #[error("group not found: {group}")]
    GroupNotFound { group: String },

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ScoutError {
    pub fn transport(service: &'static str, message: impl Into<String>) -> Self {
        ScoutError::Transport {
            service,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        ScoutError::Config {
            message: message.into(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ScoutError::Transport { .. })
    }
}
