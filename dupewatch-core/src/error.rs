use thiserror::Error;

#[derive(Error, Debug)]
pub enum DupewatchError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Fingerprint error: {0}")]
    FingerprintError(String),

    #[error(
        "Fingerprint mismatch: {left_algorithm} ({left_bits} bits) vs {right_algorithm} ({right_bits} bits)"
    )]
    FingerprintMismatch {
        left_algorithm: String,
        left_bits: u32,
        right_algorithm: String,
        right_bits: u32,
    },

    #[error("Image fetch error: {0}")]
    ImageFetchError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Failure of a single page request.
///
/// Timeouts are kept apart from other failures because the session reports
/// them with their own message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("request failed: {0}")]
    Request(String),

    #[error("invalid response body: {0}")]
    Body(String),
}

#[cfg(feature = "network")]
impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Body(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, DupewatchError>;
