//! Periodic health snapshots for observability consumers.
//!
//! [`health_stream`] yields one [`HealthEvent`] per registered command per
//! tick, for as long as the subscriber keeps polling. The stream is lazy
//! (nothing runs until polled), restartable (drop it and subscribe again),
//! and strictly read-only: it observes breaker state and window snapshots
//! without mutating either. Serialization is serde, so the out-of-scope
//! HTTP layer can forward events as SSE or JSON verbatim.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use breakwater_core::CommandKey;
use breakwater_metrics::HealthSnapshot;
use chrono::{DateTime, Utc};
use futures::stream::{self, Stream};
use serde::Serialize;
use tokio::time::Interval;

use crate::circuit_breaker::CircuitState;
use crate::registry::CommandRegistry;

/// One command's health at one instant.
#[derive(Debug, Clone, Serialize)]
pub struct HealthEvent {
    pub key: CommandKey,
    pub group: String,
    pub state: CircuitState,
    pub snapshot: HealthSnapshot,
    pub timestamp: DateTime<Utc>,
}

struct StreamState {
    registry: Arc<CommandRegistry>,
    filter: Option<CommandKey>,
    period: Duration,
    interval: Option<Interval>,
    pending: VecDeque<HealthEvent>,
}

/// Subscribes to periodic health snapshots.
///
/// With `key` set, only that command is observed; otherwise every
/// registered command is, re-evaluated against the registry each tick so
/// late registrations appear without resubscribing.
pub fn health_stream(
    registry: Arc<CommandRegistry>,
    key: Option<CommandKey>,
    period: Duration,
) -> impl Stream<Item = HealthEvent> {
    let state = StreamState {
        registry,
        filter: key,
        period,
        interval: None,
        pending: VecDeque::new(),
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((event, state));
            }
            // Created on first poll so subscribing alone schedules nothing.
            let interval = state
                .interval
                .get_or_insert_with(|| tokio::time::interval(state.period));
            interval.tick().await;
            state.pending = collect(&state.registry, state.filter.as_ref());
        }
    })
}

fn collect(registry: &CommandRegistry, filter: Option<&CommandKey>) -> VecDeque<HealthEvent> {
    let timestamp = Utc::now();
    registry
        .keys()
        .into_iter()
        .filter(|key| filter.map_or(true, |wanted| wanted == key))
        .filter_map(|key| registry.lookup(&key).ok())
        .map(|entry| HealthEvent {
            key: entry.properties().command_key.clone(),
            group: entry.properties().command_group.clone(),
            state: entry.breaker().state(),
            snapshot: entry.window().snapshot(),
            timestamp,
        })
        .collect()
}
