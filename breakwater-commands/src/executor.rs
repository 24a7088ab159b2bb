//! Execution orchestration for one command invocation.
//!
//! A [`PreparedCommand`] ties together the shared breaker, gate, and
//! metrics window of its key for a single call: consult the breaker,
//! acquire a primary slot, race the underlying logic against the execution
//! deadline, record exactly one outcome, and route to the fallback when the
//! primary path cannot deliver.
//!
//! The underlying logic runs as a detached task completing a oneshot
//! channel. The channel is the one-shot completion guard the cancellation
//! model requires: only the first of {work, timer} to settle produces an
//! effect. A timed-out execution is abandoned rather than forcibly killed,
//! and its late result is discarded, never recorded a second time.

use std::sync::Arc;
use std::time::{Duration, Instant};

use breakwater_core::{
    Command, CommandError, CommandKey, CommandOutcome, ExecutionContext, IsolationPool, Result,
};
use metrics::histogram;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::registry::RegisteredCommand;

/// An executable bound to one command key, instance, and execution context.
pub struct PreparedCommand {
    key: CommandKey,
    entry: Arc<RegisteredCommand>,
    instance: Arc<dyn Command>,
    context: ExecutionContext,
}

impl PreparedCommand {
    pub(crate) fn new(
        entry: Arc<RegisteredCommand>,
        instance: Arc<dyn Command>,
        context: ExecutionContext,
    ) -> Self {
        Self {
            key: entry.properties().command_key.clone(),
            entry,
            instance,
            context,
        }
    }

    pub fn key(&self) -> &CommandKey {
        &self.key
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Runs the invocation to a result or a typed, recoverable failure.
    pub async fn execute(&self, args: Value) -> Result<Value> {
        let started = Instant::now();
        let breaker = self.entry.breaker();

        if !breaker.allow() {
            breaker.mark_outcome(CommandOutcome::ShortCircuited, started.elapsed());
            debug!(command = %self.key, "short-circuited: circuit is open");
            return self
                .fallback_or(
                    args,
                    CommandError::CircuitOpen {
                        key: self.key.clone(),
                    },
                )
                .await;
        }

        let Some(permit) = self.entry.gate().try_acquire(IsolationPool::Primary) else {
            breaker.mark_outcome(CommandOutcome::Rejected, started.elapsed());
            return self
                .fallback_or(
                    args,
                    CommandError::Rejected {
                        key: self.key.clone(),
                        pool: IsolationPool::Primary,
                    },
                )
                .await;
        };

        let (settled_tx, settled_rx) = oneshot::channel();
        let instance = Arc::clone(&self.instance);
        let run_args = args.clone();
        tokio::spawn(async move {
            let result = instance.run(run_args).await;
            // Nobody listens after the deadline; the late result is dropped
            // here without ever touching the metrics.
            let _ = settled_tx.send(result);
        });

        let deadline = self.entry.properties().execution_timeout;
        tokio::select! {
            settled = settled_rx => {
                let latency = started.elapsed();
                drop(permit);
                self.observe(latency);
                match settled {
                    Ok(Ok(value)) => {
                        breaker.mark_outcome(CommandOutcome::Success, latency);
                        Ok(value)
                    }
                    Ok(Err(cause)) => {
                        breaker.mark_outcome(CommandOutcome::Failure, latency);
                        warn!(command = %self.key, error = %cause, "command execution failed");
                        self.fallback_or(
                            args,
                            CommandError::ExecutionFailed {
                                key: self.key.clone(),
                                cause,
                            },
                        )
                        .await
                    }
                    Err(_) => {
                        breaker.mark_outcome(CommandOutcome::Failure, latency);
                        warn!(command = %self.key, "command task aborted before completing");
                        self.fallback_or(
                            args,
                            CommandError::ExecutionFailed {
                                key: self.key.clone(),
                                cause: anyhow::anyhow!("command task aborted before completing"),
                            },
                        )
                        .await
                    }
                }
            }
            _ = tokio::time::sleep(deadline) => {
                let latency = started.elapsed();
                drop(permit);
                self.observe(latency);
                breaker.mark_outcome(CommandOutcome::Timeout, latency);
                warn!(
                    command = %self.key,
                    timeout_ms = deadline.as_millis() as u64,
                    "command timed out; abandoning in-flight work"
                );
                self.fallback_or(
                    args,
                    CommandError::Timeout {
                        key: self.key.clone(),
                        elapsed: deadline,
                    },
                )
                .await
            }
        }
    }

    /// Routes to the fallback when one is declared, otherwise surfaces the
    /// primary failure. The fallback runs in its own bounded pool with no
    /// deadline; a saturated fallback pool returns the original failure
    /// unchanged.
    async fn fallback_or(&self, args: Value, cause: CommandError) -> Result<Value> {
        if !self.instance.has_fallback() {
            return Err(cause);
        }

        let Some(_permit) = self.entry.gate().try_acquire(IsolationPool::Fallback) else {
            warn!(command = %self.key, "fallback pool exhausted; returning primary failure");
            return Err(cause);
        };

        debug!(command = %self.key, cause = %cause, "routing to fallback");
        match self.instance.fallback(args, &cause).await {
            Ok(value) => Ok(value),
            Err(fallback_cause) => Err(CommandError::FallbackFailed {
                key: self.key.clone(),
                cause: fallback_cause,
            }),
        }
    }

    fn observe(&self, latency: Duration) {
        histogram!(
            "command_execution_duration_seconds",
            &[("command", self.key.to_string())]
        )
        .record(latency.as_secs_f64());
    }
}
