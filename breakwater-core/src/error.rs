use std::time::Duration;
use thiserror::Error;

use crate::domain::{CommandKey, IsolationPool};

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Command {0} not found")]
    NotFound(CommandKey),

    #[error("Invalid command configuration: {0}")]
    Configuration(String),

    #[error("Circuit breaker is open for {key}")]
    CircuitOpen { key: CommandKey },

    #[error("Execution rejected for {key}: {pool} pool exhausted")]
    Rejected { key: CommandKey, pool: IsolationPool },

    #[error("Command {key} timed out after {elapsed:?}")]
    Timeout { key: CommandKey, elapsed: Duration },

    #[error("Command {key} failed: {cause}")]
    ExecutionFailed {
        key: CommandKey,
        cause: anyhow::Error,
    },

    #[error("Fallback for {key} failed: {cause}")]
    FallbackFailed {
        key: CommandKey,
        cause: anyhow::Error,
    },
}

impl CommandError {
    /// Registration-time errors are fatal; everything else is expected to be
    /// handled per call by the caller.
    pub fn recoverable(&self) -> bool {
        !matches!(
            self,
            CommandError::NotFound(_) | CommandError::Configuration(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CommandError>;
