//! Engine configuration.
//!
//! Every component receives an explicit configuration value at construction;
//! there are no ambient singletons. Env readers exist for process wiring and
//! surface typed errors for missing or malformed values.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::backoff::{
    BackoffPolicy, DEFAULT_ABORT_AFTER_SECS, DEFAULT_MAX_DELAY_SECS, DEFAULT_MIN_DELAY_SECS,
};
use crate::error::WebhookError;

/// Default sweep period of the retry scheduler.
pub const DEFAULT_RETRY_PERIOD_SECS: u64 = 60;

/// Default per-request HTTP timeout for deliveries.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Settings shared by the worker and the retry scheduler.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// How often the retry scheduler sweeps for due chains.
    pub retry_period: Duration,
    /// Backoff rule shared by all chains.
    pub backoff: BackoffPolicy,
    /// Bounded per-request delivery timeout.
    pub http_timeout: Duration,
    /// Accept plain-HTTP endpoints (dev/test only).
    pub allow_http: bool,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            retry_period: Duration::from_secs(DEFAULT_RETRY_PERIOD_SECS),
            backoff: BackoffPolicy::default(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            allow_http: false,
        }
    }
}

impl WorkerSettings {
    /// Read settings from the environment, falling back to defaults.
    ///
    /// Variables: `WEBHOOKS_RETRY_PERIOD_SECS`, `WEBHOOKS_MIN_BACKOFF_SECS`,
    /// `WEBHOOKS_MAX_BACKOFF_SECS`, `WEBHOOKS_ABORT_AFTER_SECS`,
    /// `WEBHOOKS_HTTP_TIMEOUT_SECS`, `WEBHOOKS_ALLOW_HTTP`.
    pub fn from_env() -> Result<Self, WebhookError> {
        let retry_period = secs_var("WEBHOOKS_RETRY_PERIOD_SECS", DEFAULT_RETRY_PERIOD_SECS)?;
        let min_delay = secs_var("WEBHOOKS_MIN_BACKOFF_SECS", DEFAULT_MIN_DELAY_SECS)?;
        let max_delay = secs_var("WEBHOOKS_MAX_BACKOFF_SECS", DEFAULT_MAX_DELAY_SECS)?;
        let abort_after = secs_var("WEBHOOKS_ABORT_AFTER_SECS", DEFAULT_ABORT_AFTER_SECS)?;
        let http_timeout = secs_var("WEBHOOKS_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?;

        if max_delay < min_delay {
            return Err(WebhookError::ConfigInvalid {
                var: "WEBHOOKS_MAX_BACKOFF_SECS".to_string(),
                reason: "max backoff must be >= min backoff".to_string(),
            });
        }

        let allow_http = matches!(
            env::var("WEBHOOKS_ALLOW_HTTP").as_deref(),
            Ok("1") | Ok("true")
        );

        Ok(Self {
            retry_period,
            backoff: BackoffPolicy::exponential(min_delay, max_delay, abort_after),
            http_timeout,
            allow_http,
        })
    }
}

fn secs_var(var: &str, default_secs: u64) -> Result<Duration, WebhookError> {
    match env::var(var) {
        Ok(raw) => {
            let secs: u64 = raw.parse().map_err(|_| WebhookError::ConfigInvalid {
                var: var.to_string(),
                reason: format!("expected a number of seconds, got {raw:?}"),
            })?;
            Ok(Duration::from_secs(secs))
        }
        Err(_) => Ok(Duration::from_secs(default_secs)),
    }
}

/// Security protocol for the Kafka connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityProtocol {
    Plaintext,
    Ssl,
    SaslPlaintext,
    SaslSsl,
}

impl FromStr for SecurityProtocol {
    type Err = WebhookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PLAINTEXT" => Ok(Self::Plaintext),
            "SSL" => Ok(Self::Ssl),
            "SASL_PLAINTEXT" => Ok(Self::SaslPlaintext),
            "SASL_SSL" => Ok(Self::SaslSsl),
            _ => Err(WebhookError::ConfigInvalid {
                var: "WEBHOOKS_KAFKA_SECURITY_PROTOCOL".to_string(),
                reason: format!("unknown protocol: {s}"),
            }),
        }
    }
}

impl SecurityProtocol {
    /// Client configuration string value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plaintext => "PLAINTEXT",
            Self::Ssl => "SSL",
            Self::SaslPlaintext => "SASL_PLAINTEXT",
            Self::SaslSsl => "SASL_SSL",
        }
    }
}

/// SASL mechanism for broker authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaslMechanism {
    Plain,
    ScramSha256,
    ScramSha512,
}

impl FromStr for SaslMechanism {
    type Err = WebhookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "PLAIN" => Ok(Self::Plain),
            "SCRAM_SHA_256" => Ok(Self::ScramSha256),
            "SCRAM_SHA_512" => Ok(Self::ScramSha512),
            _ => Err(WebhookError::ConfigInvalid {
                var: "WEBHOOKS_KAFKA_SASL_MECHANISM".to_string(),
                reason: format!("unknown mechanism: {s}"),
            }),
        }
    }
}

impl SaslMechanism {
    /// Client configuration string value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::ScramSha256 => "SCRAM-SHA-256",
            Self::ScramSha512 => "SCRAM-SHA-512",
        }
    }
}

/// SASL credentials.
#[derive(Debug, Clone)]
pub struct SaslConfig {
    pub mechanism: SaslMechanism,
    pub username: String,
    pub password: String,
}

/// Kafka connection configuration for the queue adapter.
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    pub bootstrap_servers: String,
    pub client_id: String,
    pub group_id: String,
    pub topics: Vec<String>,
    pub security_protocol: SecurityProtocol,
    pub sasl: Option<SaslConfig>,
}

impl KafkaConfig {
    /// Read the Kafka configuration from the environment.
    ///
    /// `WEBHOOKS_KAFKA_BROKERS` is required; `WEBHOOKS_KAFKA_TOPICS` is a
    /// comma-separated list defaulting to `default`; group and client ids
    /// default to `webhooks`.
    pub fn from_env() -> Result<Self, WebhookError> {
        let bootstrap_servers =
            env::var("WEBHOOKS_KAFKA_BROKERS").map_err(|_| WebhookError::ConfigMissing {
                var: "WEBHOOKS_KAFKA_BROKERS".to_string(),
            })?;

        let client_id = env::var("WEBHOOKS_KAFKA_CLIENT_ID").unwrap_or_else(|_| "webhooks".into());
        let group_id = env::var("WEBHOOKS_KAFKA_GROUP_ID").unwrap_or_else(|_| "webhooks".into());
        let topics = env::var("WEBHOOKS_KAFKA_TOPICS")
            .unwrap_or_else(|_| "default".into())
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        let security_protocol = env::var("WEBHOOKS_KAFKA_SECURITY_PROTOCOL")
            .unwrap_or_else(|_| "PLAINTEXT".into())
            .parse()?;

        let sasl = match env::var("WEBHOOKS_KAFKA_SASL_MECHANISM") {
            Ok(raw) => Some(SaslConfig {
                mechanism: raw.parse()?,
                username: env::var("WEBHOOKS_KAFKA_USERNAME").map_err(|_| {
                    WebhookError::ConfigMissing {
                        var: "WEBHOOKS_KAFKA_USERNAME".to_string(),
                    }
                })?,
                password: env::var("WEBHOOKS_KAFKA_PASSWORD").map_err(|_| {
                    WebhookError::ConfigMissing {
                        var: "WEBHOOKS_KAFKA_PASSWORD".to_string(),
                    }
                })?,
            }),
            Err(_) => None,
        };

        Ok(Self {
            bootstrap_servers,
            client_id,
            group_id,
            topics,
            security_protocol,
            sasl,
        })
    }
}
