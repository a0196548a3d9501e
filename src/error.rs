//! Error types for the webhook delivery engine.

use thiserror::Error;

/// Webhook engine error variants.
#[derive(Debug, Error)]
pub enum WebhookError {
    // Transport errors (the request never produced a classifiable response)
    /// Network/HTTP failure before a response was obtained.
    #[error("Transport failure: {cause}")]
    Transport { cause: String },

    // Signature errors
    /// Signature header could not be parsed.
    #[error("Invalid signature format: {0}")]
    InvalidSignatureFormat(String),

    // Storage errors
    /// Persistence collaborator failed.
    #[error("Storage error: {0}")]
    Storage(String),

    // Queue errors
    /// Queue collaborator failed.
    #[error("Queue error: {0}")]
    Queue(String),

    // Event decoding errors
    /// Inbound message payload could not be decoded.
    #[error("Failed to decode event message: {0}")]
    Decode(#[from] serde_json::Error),

    /// Event type matched no recognized namespace.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    // Validation errors
    /// Endpoint URL is malformed or uses a forbidden scheme.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Subscription snapshot violates the activation invariant.
    #[error("Invalid config: {0}")]
    Validation(String),

    // Configuration errors (permanent, no retry)
    /// Required configuration variable is missing.
    #[error("Configuration missing: {var}")]
    ConfigMissing { var: String },

    /// Configuration value is invalid.
    #[error("Configuration invalid for {var}: {reason}")]
    ConfigInvalid { var: String, reason: String },

    /// Unrecoverable internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WebhookError {
    /// Returns true if this error is transient and the operation can be retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            WebhookError::Transport { .. } | WebhookError::Queue(_) | WebhookError::Storage(_)
        )
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            WebhookError::ConfigMissing { .. } | WebhookError::ConfigInvalid { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_transient() {
        let transient = WebhookError::Transport {
            cause: "connection refused".to_string(),
        };
        assert!(transient.is_transient());

        let permanent = WebhookError::Validation("empty endpoint".to_string());
        assert!(!permanent.is_transient());
    }

    #[test]
    fn test_error_is_config_error() {
        let config_err = WebhookError::ConfigMissing {
            var: "WEBHOOKS_KAFKA_BROKERS".to_string(),
        };
        assert!(config_err.is_config_error());
        assert!(!config_err.is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = WebhookError::ConfigInvalid {
            var: "WEBHOOKS_RETRY_PERIOD_SECS".to_string(),
            reason: "not a number".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Configuration invalid for WEBHOOKS_RETRY_PERIOD_SECS: not a number"
        );
    }
}
