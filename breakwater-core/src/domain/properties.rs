use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::key::CommandKey;
use crate::error::{CommandError, Result};

/// Caller-facing partial configuration for a command registration.
///
/// Every field is optional; unset fields fall back to the documented
/// defaults when resolved into [`CommandProperties`]. Field names mirror the
/// declarative registration options of the command layer, so a JSON
/// configuration document deserializes directly.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct CommandOptions {
    pub circuit_enabled: Option<bool>,
    pub circuit_breaker_force_opened: Option<bool>,
    pub circuit_breaker_force_closed: Option<bool>,
    pub circuit_breaker_request_volume_threshold: Option<u64>,
    pub circuit_breaker_error_threshold_percentage: Option<u32>,
    pub circuit_breaker_sleep_window_in_milliseconds: Option<u64>,
    pub execution_timeout_in_milliseconds: Option<u64>,
    pub execution_isolation_semaphore_max_concurrent_requests: Option<usize>,
    pub fallback_isolation_semaphore_max_concurrent_requests: Option<usize>,
    pub statistical_window_length: Option<u64>,
    pub statistical_window_number_of_buckets: Option<usize>,
    pub percentile_window_length: Option<u64>,
    pub percentile_window_number_of_buckets: Option<usize>,
    pub command_group: Option<String>,
}

impl CommandOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_circuit_enabled(mut self, enabled: bool) -> Self {
        self.circuit_enabled = Some(enabled);
        self
    }

    pub fn with_force_opened(mut self, forced: bool) -> Self {
        self.circuit_breaker_force_opened = Some(forced);
        self
    }

    pub fn with_force_closed(mut self, forced: bool) -> Self {
        self.circuit_breaker_force_closed = Some(forced);
        self
    }

    pub fn with_request_volume_threshold(mut self, threshold: u64) -> Self {
        self.circuit_breaker_request_volume_threshold = Some(threshold);
        self
    }

    pub fn with_error_threshold_percentage(mut self, percentage: u32) -> Self {
        self.circuit_breaker_error_threshold_percentage = Some(percentage);
        self
    }

    pub fn with_sleep_window_ms(mut self, millis: u64) -> Self {
        self.circuit_breaker_sleep_window_in_milliseconds = Some(millis);
        self
    }

    pub fn with_execution_timeout_ms(mut self, millis: u64) -> Self {
        self.execution_timeout_in_milliseconds = Some(millis);
        self
    }

    pub fn with_max_concurrent_executions(mut self, max: usize) -> Self {
        self.execution_isolation_semaphore_max_concurrent_requests = Some(max);
        self
    }

    pub fn with_max_concurrent_fallback_executions(mut self, max: usize) -> Self {
        self.fallback_isolation_semaphore_max_concurrent_requests = Some(max);
        self
    }

    pub fn with_statistical_window(mut self, length_ms: u64, buckets: usize) -> Self {
        self.statistical_window_length = Some(length_ms);
        self.statistical_window_number_of_buckets = Some(buckets);
        self
    }

    pub fn with_percentile_window(mut self, length_ms: u64, buckets: usize) -> Self {
        self.percentile_window_length = Some(length_ms);
        self.percentile_window_number_of_buckets = Some(buckets);
        self
    }

    pub fn with_command_group(mut self, group: impl Into<String>) -> Self {
        self.command_group = Some(group.into());
        self
    }
}

/// Immutable resolved configuration for one command key.
///
/// Built once at registration by merging [`CommandOptions`] over the
/// defaults and validating the result; shared via [`Arc`] by every component
/// that serves the key and never mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandProperties {
    pub command_key: CommandKey,
    pub command_group: String,
    pub circuit_enabled: bool,
    pub force_open: bool,
    pub force_closed: bool,
    pub request_volume_threshold: u64,
    pub error_threshold_percentage: u32,
    pub sleep_window: Duration,
    pub execution_timeout: Duration,
    pub max_concurrent_executions: usize,
    pub max_concurrent_fallback_executions: usize,
    pub statistical_window: Duration,
    pub statistical_window_buckets: usize,
    pub percentile_window: Duration,
    pub percentile_window_buckets: usize,
}

impl CommandProperties {
    pub const DEFAULT_COMMAND_GROUP: &'static str = "default";
    pub const DEFAULT_REQUEST_VOLUME_THRESHOLD: u64 = 20;
    pub const DEFAULT_ERROR_THRESHOLD_PERCENTAGE: u32 = 50;
    pub const DEFAULT_SLEEP_WINDOW_MS: u64 = 5_000;
    pub const DEFAULT_EXECUTION_TIMEOUT_MS: u64 = 1_000;
    pub const DEFAULT_MAX_CONCURRENT_EXECUTIONS: usize = 10;
    pub const DEFAULT_MAX_CONCURRENT_FALLBACK_EXECUTIONS: usize = 10;
    pub const DEFAULT_STATISTICAL_WINDOW_MS: u64 = 10_000;
    pub const DEFAULT_STATISTICAL_WINDOW_BUCKETS: usize = 10;
    pub const DEFAULT_PERCENTILE_WINDOW_MS: u64 = 10_000;
    pub const DEFAULT_PERCENTILE_WINDOW_BUCKETS: usize = 10;

    /// Merges the given options over the defaults and validates the result.
    ///
    /// Invalid configuration is a registration-time failure; the process
    /// must not start serving a command with a broken configuration.
    pub fn resolve(key: impl Into<CommandKey>, options: CommandOptions) -> Result<Arc<Self>> {
        let properties = Self {
            command_key: key.into(),
            command_group: options
                .command_group
                .unwrap_or_else(|| Self::DEFAULT_COMMAND_GROUP.to_string()),
            circuit_enabled: options.circuit_enabled.unwrap_or(true),
            force_open: options.circuit_breaker_force_opened.unwrap_or(false),
            force_closed: options.circuit_breaker_force_closed.unwrap_or(false),
            request_volume_threshold: options
                .circuit_breaker_request_volume_threshold
                .unwrap_or(Self::DEFAULT_REQUEST_VOLUME_THRESHOLD),
            error_threshold_percentage: options
                .circuit_breaker_error_threshold_percentage
                .unwrap_or(Self::DEFAULT_ERROR_THRESHOLD_PERCENTAGE),
            sleep_window: Duration::from_millis(
                options
                    .circuit_breaker_sleep_window_in_milliseconds
                    .unwrap_or(Self::DEFAULT_SLEEP_WINDOW_MS),
            ),
            execution_timeout: Duration::from_millis(
                options
                    .execution_timeout_in_milliseconds
                    .unwrap_or(Self::DEFAULT_EXECUTION_TIMEOUT_MS),
            ),
            max_concurrent_executions: options
                .execution_isolation_semaphore_max_concurrent_requests
                .unwrap_or(Self::DEFAULT_MAX_CONCURRENT_EXECUTIONS),
            max_concurrent_fallback_executions: options
                .fallback_isolation_semaphore_max_concurrent_requests
                .unwrap_or(Self::DEFAULT_MAX_CONCURRENT_FALLBACK_EXECUTIONS),
            statistical_window: Duration::from_millis(
                options
                    .statistical_window_length
                    .unwrap_or(Self::DEFAULT_STATISTICAL_WINDOW_MS),
            ),
            statistical_window_buckets: options
                .statistical_window_number_of_buckets
                .unwrap_or(Self::DEFAULT_STATISTICAL_WINDOW_BUCKETS),
            percentile_window: Duration::from_millis(
                options
                    .percentile_window_length
                    .unwrap_or(Self::DEFAULT_PERCENTILE_WINDOW_MS),
            ),
            percentile_window_buckets: options
                .percentile_window_number_of_buckets
                .unwrap_or(Self::DEFAULT_PERCENTILE_WINDOW_BUCKETS),
        };
        properties.validate()?;
        Ok(Arc::new(properties))
    }

    fn validate(&self) -> Result<()> {
        if self.command_key.as_str().is_empty() {
            return Err(self.invalid("command key must not be empty"));
        }
        if self.force_open && self.force_closed {
            return Err(self.invalid("forceOpened and forceClosed are mutually exclusive"));
        }
        if self.error_threshold_percentage > 100 {
            return Err(self.invalid("error threshold percentage must be between 0 and 100"));
        }
        if self.sleep_window.is_zero() {
            return Err(self.invalid("sleep window must be positive"));
        }
        if self.execution_timeout.is_zero() {
            return Err(self.invalid("execution timeout must be positive"));
        }
        if self.max_concurrent_executions == 0 {
            return Err(self.invalid("max concurrent executions must be at least 1"));
        }
        if self.max_concurrent_fallback_executions == 0 {
            return Err(self.invalid("max concurrent fallback executions must be at least 1"));
        }
        self.validate_window(
            "statistical",
            self.statistical_window,
            self.statistical_window_buckets,
        )?;
        self.validate_window(
            "percentile",
            self.percentile_window,
            self.percentile_window_buckets,
        )?;
        Ok(())
    }

    fn validate_window(&self, name: &str, window: Duration, buckets: usize) -> Result<()> {
        if window.is_zero() {
            return Err(self.invalid(&format!("{name} window length must be positive")));
        }
        if buckets == 0 {
            return Err(self.invalid(&format!("{name} window must have at least one bucket")));
        }
        if window.as_millis() % buckets as u128 != 0 {
            return Err(self.invalid(&format!(
                "{name} window length must divide evenly into {buckets} buckets"
            )));
        }
        Ok(())
    }

    fn invalid(&self, reason: &str) -> CommandError {
        CommandError::Configuration(format!("command '{}': {reason}", self.command_key))
    }

    /// Width of one statistical bucket.
    pub fn statistical_bucket_width(&self) -> Duration {
        self.statistical_window / self.statistical_window_buckets as u32
    }

    /// Width of one percentile bucket.
    pub fn percentile_bucket_width(&self) -> Duration {
        self.percentile_window / self.percentile_window_buckets as u32
    }
}
