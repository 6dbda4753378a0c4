//! Error taxonomy shared by every fetch operation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The request produced no usable response (DNS, refused connection, TLS,
    /// timeout, or the body stream broke mid-read).
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The caller gave up on the request. Never shown to the user.
    #[error("request cancelled")]
    Cancelled,

    /// The body did not match the expected shape. `path` points at the
    /// offending field, e.g. `memory.total` or `alerts[2].timestamp`.
    #[error("unexpected response at `{path}`: {message}")]
    Decode { path: String, message: String },

    /// The restart reply could not be read. The command may still have run.
    #[error("command sent but the reply could not be read: {message}")]
    Command { message: String },

    #[error("configuration error: {message}")]
    Config { message: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn decode(err: serde_path_to_error::Error<serde_json::Error>) -> Self {
        Error::Decode {
            path: err.path().to_string(),
            message: err.into_inner().to_string(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Message to surface to the user, or `None` when the failure should stay
    /// silent (cancellation).
    pub fn user_message(&self) -> Option<String> {
        match self {
            Error::Cancelled => None,
            other => Some(other.to_string()),
        }
    }
}
