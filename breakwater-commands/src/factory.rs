//! Resolves command instances for execution.
//!
//! The factory is the seam between the request-dispatch layer and the
//! engine: given a key and a request's execution context it looks up the
//! registration, asks the injected constructor for an instance, and returns
//! an executable bound to that context.

use breakwater_core::{CommandKey, ExecutionContext, Result};

use crate::executor::PreparedCommand;
use crate::registry::CommandRegistry;

pub struct CommandFactory;

impl CommandFactory {
    /// Returns an executable for `key` bound to `context`. When a schema is
    /// given it is bound into the context before the instance is
    /// constructed, so provider commands can select their persistence
    /// target.
    pub fn get(
        registry: &CommandRegistry,
        key: impl Into<CommandKey>,
        context: ExecutionContext,
        schema: Option<&str>,
    ) -> Result<PreparedCommand> {
        let key = key.into();
        let entry = registry.lookup(&key)?;
        let context = match schema {
            Some(schema) => context.with_schema(schema),
            None => context,
        };
        let instance = entry.constructor().construct(&context);
        Ok(PreparedCommand::new(entry, instance, context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use breakwater_core::{Command, CommandError, CommandOptions};
    use serde_json::{json, Value};
    use std::sync::Arc;

    struct EchoSchema {
        schema: Option<String>,
    }

    #[async_trait]
    impl Command for EchoSchema {
        async fn run(&self, _args: Value) -> anyhow::Result<Value> {
            Ok(json!(self.schema))
        }
    }

    fn registry() -> CommandRegistry {
        let registry = CommandRegistry::new();
        registry
            .register(
                "Echo",
                CommandOptions::default(),
                |context: &ExecutionContext| {
                    Arc::new(EchoSchema {
                        schema: context.schema.clone(),
                    }) as Arc<dyn Command>
                },
            )
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn test_get_binds_context_and_schema() {
        let registry = registry();
        let command = CommandFactory::get(
            &registry,
            "Echo",
            ExecutionContext::new().with_tenant("acme"),
            Some("Customer"),
        )
        .unwrap();

        assert_eq!(command.context().tenant.as_deref(), Some("acme"));
        assert_eq!(command.context().schema.as_deref(), Some("Customer"));

        let result = command.execute(json!(null)).await.unwrap();
        assert_eq!(result, json!("Customer"));
    }

    #[tokio::test]
    async fn test_get_unknown_key_fails() {
        let registry = CommandRegistry::new();
        let result = CommandFactory::get(&registry, "Nope", ExecutionContext::new(), None);
        assert!(matches!(result, Err(CommandError::NotFound(_))));
    }
}
