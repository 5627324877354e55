use std::io;

use crate::decode::DecodeError;
use crate::transport::TransportError;

/// Errors produced while loading photos or setting up a loader
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The photo has neither bytes, an image, nor a URL.
    #[error("photo has no content to load")]
    NoContent,

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("initial photo index {index} out of range for {len} photos")]
    InvalidInitialIndex { index: usize, len: usize },

    #[error("generic error: {0}")]
    Generic(String),
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Generic(s)
    }
}

impl Error {
    /// Whether issuing the same request again has a chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(e) => e.is_retryable(),
            Error::Io(_) => true,
            _ => false,
        }
    }
}
