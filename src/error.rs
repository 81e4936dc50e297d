//! Error types for queuewire.

use thiserror::Error;

/// Main error type for all queuewire operations.
#[derive(Debug, Error)]
pub enum QueuewireError {
    /// JSON serialization/deserialization error (message bodies, options).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error raised inside a handler. Carried unmodified so the queue
    /// consumer owning the callback can apply its redelivery policy.
    #[error("handler error: {0}")]
    Handler(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A streaming reply completed without producing a value.
    #[error("handler stream completed without a value")]
    EmptyReply,

    /// Context accessor mismatch (e.g. batch accessor on a single message).
    #[error("context error: {0}")]
    Context(String),

    /// Unknown queue lifecycle event name at registration time.
    #[error("unknown queue event: {0}")]
    UnknownEvent(String),

    /// Failure reported by the queue transport or consumer factory.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Delivery attempted on a consumer that has stopped polling.
    #[error("queue consumer stopped")]
    QueueStopped,

    /// Operation intentionally left unimplemented.
    #[error("not implemented: {0}")]
    Unsupported(&'static str),
}

impl QueuewireError {
    /// Wrap an application error raised by a handler.
    pub fn handler<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Handler(Box::new(err))
    }

    /// Wrap a handler error from a plain message.
    pub fn handler_msg(msg: impl Into<String>) -> Self {
        Self::Handler(msg.into().into())
    }

    /// Wrap a transport error.
    pub fn transport<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transport(Box::new(err))
    }
}

/// Result type alias using QueuewireError.
pub type Result<T> = std::result::Result<T, QueuewireError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_error_preserves_source() {
        let io = std::io::Error::other("boom");
        let err = QueuewireError::handler(io);

        assert!(matches!(err, QueuewireError::Handler(_)));
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_handler_msg() {
        let err = QueuewireError::handler_msg("bad payload");
        assert!(err.to_string().contains("bad payload"));
    }

    #[test]
    fn test_json_error_conversion() {
        let result: std::result::Result<serde_json::Value, _> = serde_json::from_str("not json");
        let err: QueuewireError = result.unwrap_err().into();
        assert!(matches!(err, QueuewireError::Json(_)));
    }

    #[test]
    fn test_unsupported_message() {
        let err = QueuewireError::Unsupported("raw consumer access");
        assert_eq!(err.to_string(), "not implemented: raw consumer access");
    }
}
