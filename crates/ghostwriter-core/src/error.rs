//! Error types for remote calls and cover handling

use thiserror::Error;

/// Errors raised by the remote clients, the stream decoder and cover handling
#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} API error {status}: {body}")]
    Status {
        service: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("malformed stream event: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("image response is not a recognised image ({len} bytes)")]
    NotAnImage { len: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse failure category, used when reporting a failed round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Decode,
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Http(_) | Error::Status { .. } => ErrorKind::Transport,
            Error::Decode(_) | Error::NotAnImage { .. } => ErrorKind::Decode,
            Error::Io(_) => ErrorKind::Io,
        }
    }
}
