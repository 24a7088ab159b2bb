use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal outcome of a single command invocation.
///
/// Every invocation records exactly one outcome into its key's metrics
/// window; the circuit breaker's health evaluation is computed from these.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CommandOutcome {
    /// Underlying logic completed before the deadline
    Success,
    /// Underlying logic returned an error before the deadline
    Failure,
    /// The deadline elapsed before the underlying logic settled
    Timeout,
    /// The primary concurrency pool was exhausted; logic never ran
    Rejected,
    /// The breaker refused admission; logic never ran
    ShortCircuited,
}

impl CommandOutcome {
    /// True when the underlying logic actually ran to a verdict.
    pub fn executed(&self) -> bool {
        matches!(
            self,
            CommandOutcome::Success | CommandOutcome::Failure | CommandOutcome::Timeout
        )
    }

    /// True when the outcome counts against the error threshold.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            CommandOutcome::Failure | CommandOutcome::Timeout | CommandOutcome::ShortCircuited
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandOutcome::Success => "success",
            CommandOutcome::Failure => "failure",
            CommandOutcome::Timeout => "timeout",
            CommandOutcome::Rejected => "rejected",
            CommandOutcome::ShortCircuited => "short_circuited",
        }
    }
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The two independent bounded pools of a command's concurrency gate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IsolationPool {
    Primary,
    Fallback,
}

impl IsolationPool {
    pub fn as_str(&self) -> &'static str {
        match self {
            IsolationPool::Primary => "primary",
            IsolationPool::Fallback => "fallback",
        }
    }
}

impl fmt::Display for IsolationPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executed_outcomes() {
        assert!(CommandOutcome::Success.executed());
        assert!(CommandOutcome::Failure.executed());
        assert!(CommandOutcome::Timeout.executed());
        assert!(!CommandOutcome::Rejected.executed());
        assert!(!CommandOutcome::ShortCircuited.executed());
    }

    #[test]
    fn test_error_outcomes() {
        assert!(!CommandOutcome::Success.is_error());
        assert!(CommandOutcome::Failure.is_error());
        assert!(CommandOutcome::Timeout.is_error());
        assert!(!CommandOutcome::Rejected.is_error());
        assert!(CommandOutcome::ShortCircuited.is_error());
    }
}
