use serde::{Deserialize, Serialize};
use std::fmt;

/// Newtype pattern for CommandKey
///
/// Uniquely identifies a registered command type for the lifetime of the
/// process. All shared resilience state (breaker, metrics window, gate) is
/// keyed by this value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct CommandKey(pub String);

impl CommandKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommandKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CommandKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for CommandKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}
