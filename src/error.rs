//! Error taxonomy for startup resource loading

use std::time::Duration;
use thiserror::Error;

/// Result type for resource loading operations
pub type LoadResult<T> = Result<T, LoadError>;

/// Failures a single resource load (or the loading screen as a whole) can hit.
///
/// Per-resource errors are recorded on the resource record and counted as
/// settled; they are never surfaced as a fatal condition of a run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error("Transport error for '{url}': {reason}")]
    Transport { url: String, reason: String },

    #[error("Decode error for '{url}': {reason}")]
    Decode { url: String, reason: String },

    #[error("Loading did not finish within {ceiling:?}")]
    TimeoutExceeded { ceiling: Duration },
}

impl LoadError {
    /// Create a transport error (non-success response or network failure)
    pub fn transport(url: impl Into<String>, reason: impl Into<String>) -> Self {
        LoadError::Transport {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a decode error (malformed image or unparseable payload)
    pub fn decode(url: impl Into<String>, reason: impl Into<String>) -> Self {
        LoadError::Decode {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a watchdog timeout error
    pub fn timeout(ceiling: Duration) -> Self {
        LoadError::TimeoutExceeded { ceiling }
    }

    /// Short category name, used in logs and summaries
    pub fn category(&self) -> &'static str {
        match self {
            LoadError::Transport { .. } => "transport",
            LoadError::Decode { .. } => "decode",
            LoadError::TimeoutExceeded { .. } => "timeout",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = LoadError::transport("/_config.toml", "HTTP 404");
        assert_eq!(err.to_string(), "Transport error for '/_config.toml': HTTP 404");
        assert_eq!(err.category(), "transport");

        let err = LoadError::decode("bg.png", "invalid signature");
        assert_eq!(err.category(), "decode");

        let err = LoadError::timeout(Duration::from_secs(15));
        assert_eq!(err.to_string(), "Loading did not finish within 15s");
    }
}
