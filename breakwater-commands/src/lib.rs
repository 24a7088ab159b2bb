//! # Breakwater Commands
//!
//! The execution half of the resilience engine:
//! - Circuit breaker state machine gating admission per command key
//! - Concurrency gate (bulkhead) isolating primary and fallback pools
//! - Process-wide command registry with lazily created shared state
//! - Execution orchestration: timeout racing, outcome recording, fallback
//!   routing
//! - Periodic health stream for observability consumers

pub mod circuit_breaker;
pub mod executor;
pub mod factory;
pub mod gate;
pub mod health;
pub mod registry;

// Re-export main types
pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use executor::PreparedCommand;
pub use factory::CommandFactory;
pub use gate::{ConcurrencyGate, GatePermit};
pub use health::{health_stream, HealthEvent};
pub use registry::{CommandRegistry, RegisteredCommand};
