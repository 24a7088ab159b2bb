use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-request context handed to command constructors.
///
/// Populated by the request-dispatch layer; the engine treats it as opaque
/// apart from the optional schema binding, which provider commands use to
/// select a persistence target.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExecutionContext {
    pub tenant: Option<String>,
    pub correlation_id: Option<String>,
    pub schema: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }
}
