//! Error types for Arbor Core.

use thiserror::Error;

/// Result type alias for Arbor operations.
pub type Result<T> = std::result::Result<T, ArborError>;

/// Errors that can occur in Arbor operations.
///
/// Running out of search budget is not an error: candidates that are still
/// open when `max_steps` is reached are marked
/// [`FinishState::Truncated`](crate::completion::FinishState::Truncated).
#[derive(Error, Debug)]
pub enum ArborError {
    /// The generation service failed or timed out.
    #[error("generation failed: {0}")]
    Generation(String),

    /// The reward service failed or returned unusable scores.
    #[error("scoring failed: {0}")]
    Scoring(String),

    /// Invalid search configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Aggregation was requested over an empty score sequence.
    #[error("cannot aggregate an empty score sequence")]
    EmptyScores,

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ArborError {
    /// Whether this error is confined to a single problem (or DVTS slot).
    ///
    /// Service failures never abort a batch; everything else does.
    pub fn is_isolated(&self) -> bool {
        matches!(self, Self::Generation(_) | Self::Scoring(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_failures_are_isolated() {
        assert!(ArborError::Generation("timeout".into()).is_isolated());
        assert!(ArborError::Scoring("502".into()).is_isolated());
        assert!(!ArborError::Config("beam_width".into()).is_isolated());
        assert!(!ArborError::EmptyScores.is_isolated());
    }

    #[test]
    fn display_includes_context() {
        let err = ArborError::Generation("connection reset".into());
        assert_eq!(err.to_string(), "generation failed: connection reset");
    }
}
