use std::fmt;

use thiserror::Error;

/// Failures surfaced by the remote data client.
///
/// None of these are fatal: the owning panel records the failure and
/// recovers on its next scheduled tick or manual retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("{endpoint} timed out after {timeout_ms}ms")]
    Timeout { endpoint: String, timeout_ms: u64 },

    #[error("network failure for {endpoint}: {message}")]
    Network { endpoint: String, message: String },

    #[error("{endpoint} responded with HTTP {status}")]
    ServerError { endpoint: String, status: u16 },

    #[error("failed to decode {endpoint} response: {message}")]
    Decode { endpoint: String, message: String },
}

/// Coarse failure classification used for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    Timeout,
    Network,
    ServerError,
    Decode,
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::Timeout { .. } => FetchErrorKind::Timeout,
            FetchError::Network { .. } => FetchErrorKind::Network,
            FetchError::ServerError { .. } => FetchErrorKind::ServerError,
            FetchError::Decode { .. } => FetchErrorKind::Decode,
        }
    }

    pub fn endpoint(&self) -> &str {
        match self {
            FetchError::Timeout { endpoint, .. }
            | FetchError::Network { endpoint, .. }
            | FetchError::ServerError { endpoint, .. }
            | FetchError::Decode { endpoint, .. } => endpoint,
        }
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FetchErrorKind::Timeout => "timeout",
            FetchErrorKind::Network => "network",
            FetchErrorKind::ServerError => "server_error",
            FetchErrorKind::Decode => "decode",
        };
        f.write_str(name)
    }
}

/// Rejected user selection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("symbol must not be empty")]
    EmptySymbol,

    #[error("invalid symbol: {0:?} (expected letters, digits, '.' or '-')")]
    InvalidSymbol(String),

    #[error("unsupported timeframe: {0} days (expected 7, 30, 90, 180 or 365)")]
    InvalidTimeframe(u32),
}
