//! Environment-driven worker configuration
//!
//! All settings come from the process environment; configs for individual
//! routing nodes arrive per work item, never from here. `Display` redacts
//! credentials so the startup log can safely print the whole config.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} is required")]
    Required { name: &'static str },
    #[error("{name} is invalid: {message}")]
    Invalid { name: &'static str, message: String },
}

/// Worker configuration resolved from environment variables
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Consumer name within the group
    pub worker_id: String,

    pub redis_addr: String,
    pub redis_password: String,
    pub redis_db: i64,

    /// Input stream carrying work items
    pub stream_key: String,
    pub consumer_group: String,
    /// Output stream; errors go to `<result_stream>.errors`
    pub result_stream: String,
    /// Blocking window for group reads
    pub block_time: Duration,
    /// Reserved for processor-level retry
    pub max_retries: u32,

    pub llm_provider: String,
    pub llm_api_key: String,
    pub llm_model: String,
    pub llm_timeout: Duration,

    pub health_port: u16,
    pub log_level: String,
}

impl WorkerConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary lookup (used by tests)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str, default: &str| -> String {
            lookup(name).unwrap_or_else(|| default.to_string())
        };

        let config = Self {
            worker_id: get("WORKER_ID", "router-1"),
            redis_addr: get("REDIS_ADDR", "localhost:6379"),
            redis_password: get("REDIS_PASS", ""),
            redis_db: parse_int("REDIS_DB", &get("REDIS_DB", "0"))?,
            stream_key: get("STREAM_KEY", "router.work"),
            consumer_group: get("CONSUMER_GROUP", "router-workers"),
            result_stream: get("RESULT_STREAM", "router.decided"),
            block_time: parse_duration("BLOCK_TIME", &get("BLOCK_TIME", "1s"))?,
            max_retries: parse_u32("MAX_RETRIES", &get("MAX_RETRIES", "3"))?,
            llm_provider: get("LLM_PROVIDER", "anthropic"),
            llm_api_key: get("LLM_API_KEY", ""),
            llm_model: get("LLM_MODEL", "claude-sonnet-4-20250514"),
            llm_timeout: parse_duration("LLM_TIMEOUT", &get("LLM_TIMEOUT", "30s"))?,
            health_port: parse_port("HEALTH_PORT", &get("HEALTH_PORT", "8082"))?,
            log_level: get("LOG_LEVEL", "info"),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn required(name: &'static str, value: &str) -> Result<(), ConfigError> {
            if value.is_empty() {
                Err(ConfigError::Required { name })
            } else {
                Ok(())
            }
        }

        required("WORKER_ID", &self.worker_id)?;
        required("REDIS_ADDR", &self.redis_addr)?;
        required("STREAM_KEY", &self.stream_key)?;
        required("CONSUMER_GROUP", &self.consumer_group)?;
        required("RESULT_STREAM", &self.result_stream)?;
        required("LLM_PROVIDER", &self.llm_provider)?;
        // LLM_API_KEY stays optional: without it the worker runs
        // deterministic-only and llm routing is unavailable
        required("LLM_MODEL", &self.llm_model)?;

        if self.block_time.is_zero() {
            return Err(ConfigError::Invalid {
                name: "BLOCK_TIME",
                message: "must be positive".to_string(),
            });
        }
        if self.llm_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                name: "LLM_TIMEOUT",
                message: "must be positive".to_string(),
            });
        }
        if self.health_port == 0 {
            return Err(ConfigError::Invalid {
                name: "HEALTH_PORT",
                message: "must be between 1 and 65535".to_string(),
            });
        }
        if !matches!(self.log_level.as_str(), "debug" | "info" | "warn" | "error") {
            return Err(ConfigError::Invalid {
                name: "LOG_LEVEL",
                message: "must be one of: debug, info, warn, error".to_string(),
            });
        }

        Ok(())
    }

    /// Stream receiving error records
    pub fn error_stream(&self) -> String {
        format!("{}.errors", self.result_stream)
    }

    /// Connection URL for the redis client
    pub fn redis_url(&self) -> String {
        if self.redis_password.is_empty() {
            format!("redis://{}/{}", self.redis_addr, self.redis_db)
        } else {
            format!(
                "redis://:{}@{}/{}",
                self.redis_password, self.redis_addr, self.redis_db
            )
        }
    }

}

impl fmt::Display for WorkerConfig {
    /// Credentials are omitted so this is safe to log
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "WorkerConfig{{worker_id={}, redis_addr={}, redis_db={}, stream_key={}, \
             consumer_group={}, result_stream={}, block_time={:?}, llm_provider={}, \
             llm_model={}, health_port={}, log_level={}}}",
            self.worker_id,
            self.redis_addr,
            self.redis_db,
            self.stream_key,
            self.consumer_group,
            self.result_stream,
            self.block_time,
            self.llm_provider,
            self.llm_model,
            self.health_port,
            self.log_level,
        )
    }
}

fn parse_int(name: &'static str, value: &str) -> Result<i64, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        name,
        message: format!("'{value}' is not an integer"),
    })
}

fn parse_u32(name: &'static str, value: &str) -> Result<u32, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        name,
        message: format!("'{value}' is not a non-negative integer"),
    })
}

fn parse_port(name: &'static str, value: &str) -> Result<u16, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        name,
        message: format!("'{value}' is not a valid port"),
    })
}

/// Parse durations of the form `500ms`, `1s` or `2m`
fn parse_duration(name: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let invalid = |message: String| ConfigError::Invalid { name, message };

    let (digits, unit) = match value.find(|c: char| !c.is_ascii_digit()) {
        Some(split) => value.split_at(split),
        None => {
            return Err(invalid(format!(
                "'{value}' is missing a unit (expected ms, s or m)"
            )))
        }
    };

    let amount: u64 = digits
        .parse()
        .map_err(|_| invalid(format!("'{value}' is not a duration")))?;

    match unit {
        "ms" => Ok(Duration::from_millis(amount)),
        "s" => Ok(Duration::from_secs(amount)),
        "m" => Ok(Duration::from_secs(amount * 60)),
        _ => Err(invalid(format!("'{value}' has unknown unit '{unit}'"))),
    }
}
