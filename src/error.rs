use std::time::Duration;
use thiserror::Error;

/// Status family, taken from the leading digit of the response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    ClientError,
    ServerError,
    Other,
}

impl StatusClass {
    pub fn classify(status: u16) -> Self {
        match status.to_string().chars().next() {
            Some('2') => StatusClass::Success,
            Some('4') => StatusClass::ClientError,
            Some('5') => StatusClass::ServerError,
            _ => StatusClass::Other,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatusClass::Success => "2xx",
            StatusClass::ClientError => "4xx",
            StatusClass::ServerError => "5xx",
            StatusClass::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {status} ({})", class.label())]
    HttpStatus { status: u16, class: StatusClass },

    #[error("HTTP {status} returned no results")]
    EmptyResults { status: u16 },

    #[error("response decode failed: {0}")]
    Decode(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

impl FetchError {
    pub fn status(status: u16) -> Self {
        FetchError::HttpStatus {
            status,
            class: StatusClass::classify(status),
        }
    }

    /// Status class for reporting. Transport failures and timeouts have none.
    pub fn class(&self) -> Option<StatusClass> {
        match self {
            FetchError::HttpStatus { class, .. } => Some(*class),
            FetchError::EmptyResults { status } => Some(StatusClass::classify(*status)),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("search keyword must not be empty")]
    InvalidInput,

    #[error("a page load is in flight, retry later")]
    Busy,

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

#[derive(Debug, Error)]
pub enum VoteError {
    #[error("score must be an even number between 2 and 10, got {0}")]
    InvalidScore(u8),

    #[error("vote storage failure: {0}")]
    Storage(String),

    #[error("vote serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<std::io::Error> for VoteError {
    fn from(err: std::io::Error) -> Self {
        VoteError::Storage(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("star index must be within 0..=4, got {0}")]
    InvalidStar(usize),

    #[error("invalid movie id {0}")]
    InvalidMovie(i32),

    #[error("overlay is not open")]
    NotOpen,

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Vote(#[from] VoteError),
}
