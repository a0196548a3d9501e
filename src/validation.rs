//! Validation of subscription snapshots.
//!
//! The CRUD boundary enforces these rules on write; the engine re-checks
//! them before dispatch so a corrupted snapshot can never produce an
//! unsigned or misdirected delivery.

use crate::error::WebhookError;
use crate::models::Config;

/// Validate a webhook delivery URL.
///
/// Checks the URL is parseable, uses HTTPS (or HTTP when `allow_http` is
/// set for dev/test), and has a host.
pub fn validate_endpoint(endpoint: &str, allow_http: bool) -> Result<(), WebhookError> {
    let parsed = url::Url::parse(endpoint)
        .map_err(|e| WebhookError::InvalidUrl(format!("invalid URL format: {e}")))?;

    match parsed.scheme() {
        "https" => {}
        "http" if allow_http => {}
        "http" => {
            return Err(WebhookError::InvalidUrl(
                "webhook endpoints must use HTTPS".to_string(),
            ));
        }
        scheme => {
            return Err(WebhookError::InvalidUrl(format!(
                "unsupported URL scheme: {scheme}"
            )));
        }
    }

    if parsed.host_str().is_none() {
        return Err(WebhookError::InvalidUrl(
            "URL must have a host".to_string(),
        ));
    }

    Ok(())
}

/// Re-check the activation invariant on a subscription snapshot.
///
/// Active configs must carry a valid endpoint and at least one event type;
/// inactive configs must carry neither.
pub fn validate_config(config: &Config, allow_http: bool) -> Result<(), WebhookError> {
    if config.active {
        if config.event_types.is_empty() {
            return Err(WebhookError::Validation(
                "active config must subscribe to at least one event type".to_string(),
            ));
        }
        if config.event_types.iter().any(|t| t.trim().is_empty()) {
            return Err(WebhookError::Validation(
                "event types must be non-empty strings".to_string(),
            ));
        }
        validate_endpoint(&config.endpoint, allow_http)?;
    } else if !config.event_types.is_empty() || !config.endpoint.is_empty() {
        return Err(WebhookError::Validation(
            "inactive config must not carry an endpoint or event types".to_string(),
        ));
    }

    Ok(())
}
