use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::domain::ExecutionContext;
use crate::error::CommandError;

/// Executable logic behind a registered command key.
///
/// `run` is the protected call to the unreliable dependency. A command may
/// declare a fallback by overriding `has_fallback` and `fallback`; the
/// executor routes to it when the primary path short-circuits, is rejected,
/// times out, or fails.
#[async_trait]
pub trait Command: Send + Sync {
    async fn run(&self, args: Value) -> anyhow::Result<Value>;

    fn has_fallback(&self) -> bool {
        false
    }

    /// Alternate path invoked with the original arguments and the failure
    /// that triggered it. Only called when `has_fallback` returns true.
    async fn fallback(&self, _args: Value, _cause: &CommandError) -> anyhow::Result<Value> {
        Err(anyhow::anyhow!("no fallback declared"))
    }
}

/// Instantiation boundary: given an execution context, produce a command
/// instance. The dependency-injection layer supplies the implementation;
/// the engine only ever calls `construct`.
pub trait CommandConstructor: Send + Sync {
    fn construct(&self, context: &ExecutionContext) -> Arc<dyn Command>;
}

impl<F> CommandConstructor for F
where
    F: Fn(&ExecutionContext) -> Arc<dyn Command> + Send + Sync,
{
    fn construct(&self, context: &ExecutionContext) -> Arc<dyn Command> {
        self(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Command for Echo {
        async fn run(&self, args: Value) -> anyhow::Result<Value> {
            Ok(args)
        }
    }

    #[tokio::test]
    async fn test_default_fallback_is_absent() {
        let echo = Echo;
        assert!(!echo.has_fallback());

        let cause = CommandError::Configuration("x".into());
        let result = echo.fallback(json!(null), &cause).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_closure_constructor() {
        let ctor = |_context: &ExecutionContext| Arc::new(Echo) as Arc<dyn Command>;
        let instance = ctor.construct(&ExecutionContext::default());

        let result = instance.run(json!("ping")).await.unwrap();
        assert_eq!(result, json!("ping"));
    }
}
