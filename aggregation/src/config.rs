use crate::orchestrator::WaitPolicy;
use batcher::BatchSettings;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("HTTP timeout cannot be 0")]
    InvalidHttpTimeout,

    #[error("Max batch size of the {0} executor cannot be 0")]
    InvalidBatchSize(&'static str),

    #[error("Flush timeout of the {0} executor cannot be 0")]
    InvalidFlushTimeout(&'static str),

    #[error("Poll interval cannot be 0")]
    InvalidPollInterval,

    #[error("Max iterations cannot be 0")]
    InvalidMaxIterations,
}

/// Aggregation service configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Listener serving `/aggregation`
    pub listener: Listener,
    /// Admin listener for `/health` and `/ready`
    pub admin_listener: Listener,
    /// Remote lookup service shared by all categories
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub executors: ExecutorsConfig,
    #[serde(default)]
    pub wait_policy: WaitPolicyConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;
        self.upstream.validate()?;
        self.executors.validate()?;
        self.wait_policy.validate()?;
        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct UpstreamConfig {
    /// Base URL; categories are served under `{url}/pricing`, `{url}/shipments`
    /// and `{url}/track`.
    pub url: Url,
    /// Applies to the whole request including reading the body
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

impl UpstreamConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.http_timeout_secs == 0 {
            return Err(ValidationError::InvalidHttpTimeout);
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct ExecutorsConfig {
    #[serde(default)]
    pub pricing: ExecutorConfig,
    #[serde(default)]
    pub shipments: ExecutorConfig,
    #[serde(default)]
    pub tracking: ExecutorConfig,
}

impl ExecutorsConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        self.pricing.validate("pricing")?;
        self.shipments.validate("shipments")?;
        self.tracking.validate("tracking")?;
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ExecutorConfig {
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// `null` disables time based flushing, batches then only go out when full.
    #[serde(default = "default_flush_timeout_secs")]
    pub flush_timeout_secs: Option<u64>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            flush_timeout_secs: default_flush_timeout_secs(),
        }
    }
}

impl ExecutorConfig {
    fn validate(&self, executor: &'static str) -> Result<(), ValidationError> {
        if self.max_batch_size == 0 {
            return Err(ValidationError::InvalidBatchSize(executor));
        }
        if self.flush_timeout_secs == Some(0) {
            return Err(ValidationError::InvalidFlushTimeout(executor));
        }
        Ok(())
    }

    pub fn settings(&self) -> BatchSettings {
        BatchSettings {
            max_batch_size: self.max_batch_size,
            flush_timeout: self.flush_timeout_secs.map(Duration::from_secs),
        }
    }
}

/// How long an aggregation waits for its keys
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WaitPolicyConfig {
    /// Give up after `max_iterations` waits and return what was resolved
    Bounded {
        #[serde(default = "default_poll_interval_ms")]
        poll_interval_ms: u64,
        #[serde(default = "default_max_iterations")]
        max_iterations: u32,
    },
    /// Wait until every key is resolved
    Unbounded {
        #[serde(default = "default_poll_interval_ms")]
        poll_interval_ms: u64,
    },
}

impl Default for WaitPolicyConfig {
    fn default() -> Self {
        WaitPolicyConfig::Bounded {
            poll_interval_ms: default_poll_interval_ms(),
            max_iterations: default_max_iterations(),
        }
    }
}

impl WaitPolicyConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        match *self {
            WaitPolicyConfig::Bounded {
                poll_interval_ms,
                max_iterations,
            } => {
                if poll_interval_ms == 0 {
                    return Err(ValidationError::InvalidPollInterval);
                }
                if max_iterations == 0 {
                    return Err(ValidationError::InvalidMaxIterations);
                }
            }
            WaitPolicyConfig::Unbounded { poll_interval_ms } => {
                if poll_interval_ms == 0 {
                    return Err(ValidationError::InvalidPollInterval);
                }
            }
        }
        Ok(())
    }

    pub fn policy(&self) -> WaitPolicy {
        match *self {
            WaitPolicyConfig::Bounded {
                poll_interval_ms,
                max_iterations,
            } => WaitPolicy::Bounded {
                poll_interval: Duration::from_millis(poll_interval_ms),
                max_iterations,
            },
            WaitPolicyConfig::Unbounded { poll_interval_ms } => WaitPolicy::Unbounded {
                poll_interval: Duration::from_millis(poll_interval_ms),
            },
        }
    }
}

fn default_http_timeout_secs() -> u64 {
    5
}

fn default_max_batch_size() -> usize {
    5
}

fn default_flush_timeout_secs() -> Option<u64> {
    Some(5)
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_iterations() -> u32 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_config() {
        let yaml = r#"
listener:
    host: "0.0.0.0"
    port: 3000
admin_listener:
    host: "127.0.0.1"
    port: 3001
upstream:
    url: "http://localhost:8080"
    http_timeout_secs: 2
executors:
    pricing:
        max_batch_size: 10
        flush_timeout_secs: 1
    tracking:
        max_batch_size: 3
        flush_timeout_secs: null
wait_policy:
    type: unbounded
    poll_interval_ms: 250
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());

        assert_eq!(config.listener.port, 3000);
        assert_eq!(config.upstream.http_timeout(), Duration::from_secs(2));
        assert_eq!(
            config.executors.pricing.settings(),
            BatchSettings {
                max_batch_size: 10,
                flush_timeout: Some(Duration::from_secs(1)),
            }
        );
        assert_eq!(config.executors.shipments, ExecutorConfig::default());
        assert_eq!(config.executors.tracking.flush_timeout_secs, None);
        assert_eq!(
            config.wait_policy.policy(),
            WaitPolicy::Unbounded {
                poll_interval: Duration::from_millis(250)
            }
        );
    }

    #[test]
    fn test_defaults() {
        let yaml = r#"
listener: {host: "0.0.0.0", port: 3000}
admin_listener: {host: "127.0.0.1", port: 3001}
upstream: {url: "http://localhost:8080"}
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.upstream.http_timeout_secs, 5);

        let settings = config.executors.tracking.settings();
        assert_eq!(settings.max_batch_size, 5);
        assert_eq!(settings.flush_timeout, Some(Duration::from_secs(5)));

        assert_eq!(config.wait_policy.policy(), WaitPolicy::default());
    }

    #[test]
    fn test_validation_errors() {
        let base_config = Config {
            listener: Listener {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            admin_listener: Listener {
                host: "127.0.0.1".to_string(),
                port: 3001,
            },
            upstream: UpstreamConfig {
                url: Url::parse("http://localhost:8080").unwrap(),
                http_timeout_secs: 5,
            },
            executors: ExecutorsConfig::default(),
            wait_policy: WaitPolicyConfig::default(),
        };

        let mut config = base_config.clone();
        config.admin_listener.port = 0;
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::InvalidPort
        ));

        let mut config = base_config.clone();
        config.upstream.http_timeout_secs = 0;
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::InvalidHttpTimeout
        ));

        let mut config = base_config.clone();
        config.executors.shipments.max_batch_size = 0;
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::InvalidBatchSize("shipments")
        ));

        let mut config = base_config.clone();
        config.executors.tracking.flush_timeout_secs = Some(0);
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::InvalidFlushTimeout("tracking")
        ));

        let mut config = base_config.clone();
        config.wait_policy = WaitPolicyConfig::Bounded {
            poll_interval_ms: 1000,
            max_iterations: 0,
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::InvalidMaxIterations
        ));

        let mut config = base_config;
        config.wait_policy = WaitPolicyConfig::Unbounded {
            poll_interval_ms: 0,
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::InvalidPollInterval
        ));
    }

    #[test]
    fn test_deserialization_errors() {
        // Invalid URL
        assert!(
            serde_yaml::from_str::<Config>(
                r#"
listener: {host: "0.0.0.0", port: 3000}
admin_listener: {host: "127.0.0.1", port: 3001}
upstream: {url: "not-a-url"}
"#
            )
            .is_err()
        );

        // Unknown wait policy
        assert!(
            serde_yaml::from_str::<Config>(
                r#"
listener: {host: "0.0.0.0", port: 3000}
admin_listener: {host: "127.0.0.1", port: 3001}
upstream: {url: "http://localhost:8080"}
wait_policy: {type: forever}
"#
            )
            .is_err()
        );

        // Missing required field
        assert!(
            serde_yaml::from_str::<Config>(
                r#"
listener: {host: "0.0.0.0", port: 3000}
"#
            )
            .is_err()
        );
    }
}
