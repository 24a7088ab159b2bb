//! Process-wide command registry.
//!
//! Maps each command key to its resolved properties, its constructor, and
//! the shared resilience state (metrics window, circuit breaker,
//! concurrency gate) created lazily on first registration and kept for the
//! process lifetime. An explicit object rather than load-time statics: the
//! embedding service owns one registry, populates it during initialization,
//! and only then starts serving.

use std::sync::Arc;

use breakwater_core::{
    CommandConstructor, CommandError, CommandKey, CommandOptions, CommandProperties, Result,
};
use breakwater_metrics::MetricsWindow;
use dashmap::DashMap;
use tracing::info;

use crate::circuit_breaker::CircuitBreaker;
use crate::gate::ConcurrencyGate;

/// One registry entry: everything the executor needs to serve a key.
pub struct RegisteredCommand {
    properties: Arc<CommandProperties>,
    window: Arc<MetricsWindow>,
    breaker: Arc<CircuitBreaker>,
    gate: Arc<ConcurrencyGate>,
    constructor: Arc<dyn CommandConstructor>,
}

impl RegisteredCommand {
    pub fn properties(&self) -> &Arc<CommandProperties> {
        &self.properties
    }

    pub fn window(&self) -> &Arc<MetricsWindow> {
        &self.window
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn gate(&self) -> &Arc<ConcurrencyGate> {
        &self.gate
    }

    pub fn constructor(&self) -> &Arc<dyn CommandConstructor> {
        &self.constructor
    }
}

/// Process-wide table of registered commands.
#[derive(Default)]
pub struct CommandRegistry {
    entries: DashMap<CommandKey, Arc<RegisteredCommand>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a command under `key`, resolving and validating its
    /// configuration and creating the key's shared breaker/window/gate.
    ///
    /// Invalid configuration fails here, never at execution time.
    /// Re-registering a key wins over the previous registration wholesale:
    /// the entry is replaced with fresh shared state built from the new
    /// properties.
    pub fn register(
        &self,
        key: impl Into<CommandKey>,
        options: CommandOptions,
        constructor: impl CommandConstructor + 'static,
    ) -> Result<()> {
        let key = key.into();
        let properties = CommandProperties::resolve(key.clone(), options)?;
        let window = Arc::new(MetricsWindow::from_properties(&properties));
        let breaker = Arc::new(CircuitBreaker::new(
            Arc::clone(&properties),
            Arc::clone(&window),
        ));
        let gate = Arc::new(ConcurrencyGate::new(
            key.clone(),
            properties.max_concurrent_executions,
            properties.max_concurrent_fallback_executions,
        ));

        info!(command = %key, group = %properties.command_group, "registered command");
        self.entries.insert(
            key,
            Arc::new(RegisteredCommand {
                properties,
                window,
                breaker,
                gate,
                constructor: Arc::new(constructor),
            }),
        );
        Ok(())
    }

    pub fn lookup(&self, key: &CommandKey) -> Result<Arc<RegisteredCommand>> {
        self.entries
            .get(key)
            .map(|entry| Arc::clone(&*entry))
            .ok_or_else(|| CommandError::NotFound(key.clone()))
    }

    pub fn keys(&self) -> Vec<CommandKey> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clears every registration and its shared state. Test utility.
    pub fn reset(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use breakwater_core::{Command, CommandOutcome, ExecutionContext};
    use serde_json::Value;
    use std::time::Duration;

    struct Noop;

    #[async_trait]
    impl Command for Noop {
        async fn run(&self, args: Value) -> anyhow::Result<Value> {
            Ok(args)
        }
    }

    fn noop_constructor(_context: &ExecutionContext) -> Arc<dyn Command> {
        Arc::new(Noop)
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = CommandRegistry::new();
        registry
            .register("Ping", CommandOptions::default(), noop_constructor)
            .unwrap();

        let entry = registry.lookup(&"Ping".into()).unwrap();
        assert_eq!(entry.properties().command_key.as_str(), "Ping");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup_unknown_key_fails() {
        let registry = CommandRegistry::new();
        let result = registry.lookup(&"Missing".into());
        assert!(matches!(result, Err(CommandError::NotFound(_))));
    }

    #[test]
    fn test_invalid_configuration_fails_at_registration() {
        let registry = CommandRegistry::new();
        let result = registry.register(
            "Broken",
            CommandOptions::new().with_execution_timeout_ms(0),
            noop_constructor,
        );
        assert!(matches!(result, Err(CommandError::Configuration(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reregistration_replaces_entry_and_state() {
        let registry = CommandRegistry::new();
        registry
            .register("Ping", CommandOptions::default(), noop_constructor)
            .unwrap();

        let first = registry.lookup(&"Ping".into()).unwrap();
        first
            .window()
            .record(CommandOutcome::Failure, Duration::from_millis(1));
        assert_eq!(first.window().snapshot().failures, 1);

        registry
            .register(
                "Ping",
                CommandOptions::new().with_execution_timeout_ms(250),
                noop_constructor,
            )
            .unwrap();

        let second = registry.lookup(&"Ping".into()).unwrap();
        assert_eq!(
            second.properties().execution_timeout,
            Duration::from_millis(250)
        );
        // Fresh shared state: the old failure history is gone.
        assert_eq!(second.window().snapshot().failures, 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_reset_clears_registrations() {
        let registry = CommandRegistry::new();
        registry
            .register("A", CommandOptions::default(), noop_constructor)
            .unwrap();
        registry
            .register("B", CommandOptions::default(), noop_constructor)
            .unwrap();
        assert_eq!(registry.len(), 2);

        registry.reset();
        assert!(registry.is_empty());
        assert!(registry.lookup(&"A".into()).is_err());
    }

    #[test]
    fn test_keys_lists_registrations() {
        let registry = CommandRegistry::new();
        registry
            .register("A", CommandOptions::default(), noop_constructor)
            .unwrap();
        registry
            .register("B", CommandOptions::default(), noop_constructor)
            .unwrap();

        let mut keys: Vec<String> = registry.keys().iter().map(|k| k.to_string()).collect();
        keys.sort();
        assert_eq!(keys, vec!["A", "B"]);
    }
}
