use thiserror::Error;

/// Errors surfaced by the feed engine.
///
/// Clone-able so callers attached to a deduplicated in-flight request all
/// receive the leader's failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// Network or transport-level failure. Retried per policy.
    #[error("transport failure: {message}")]
    Transport { message: String },

    /// The queried resource does not exist. Never retried.
    #[error("not found")]
    NotFound,

    /// The feed rejected the request. Never retried.
    #[error("forbidden")]
    Forbidden,

    /// A response arrived for a session that has since been reset. Detected
    /// internally and discarded, never shown to the rendering layer.
    #[error("stale session response")]
    StaleSession,
}

impl FeedError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Whether the client retry policy applies to this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transport_errors_are_retryable() {
        assert!(FeedError::transport("timeout").is_retryable());
        assert!(!FeedError::NotFound.is_retryable());
        assert!(!FeedError::Forbidden.is_retryable());
        assert!(!FeedError::StaleSession.is_retryable());
    }
}
