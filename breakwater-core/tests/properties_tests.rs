use breakwater_core::{CommandError, CommandOptions, CommandProperties};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::time::Duration;

// ===== Resolution Tests =====

#[test]
fn test_resolution_with_empty_options_uses_defaults() {
    let properties = CommandProperties::resolve("Ping", CommandOptions::default()).unwrap();

    assert_eq!(properties.command_key.as_str(), "Ping");
    assert!(properties.circuit_enabled);
    assert_eq!(properties.request_volume_threshold, 20);
    assert_eq!(properties.error_threshold_percentage, 50);
    assert_eq!(properties.sleep_window, Duration::from_secs(5));
    assert_eq!(properties.execution_timeout, Duration::from_secs(1));
}

#[test]
fn test_resolution_is_immutable_shared_state() {
    let properties = CommandProperties::resolve("Ping", CommandOptions::default()).unwrap();
    let clone = std::sync::Arc::clone(&properties);
    assert_eq!(*properties, *clone);
}

// ===== Registration Document Tests =====

#[test]
fn test_full_registration_document_round_trip() {
    let options = CommandOptions::new()
        .with_circuit_enabled(true)
        .with_request_volume_threshold(10)
        .with_error_threshold_percentage(25)
        .with_sleep_window_ms(2_000)
        .with_execution_timeout_ms(750)
        .with_max_concurrent_executions(5)
        .with_max_concurrent_fallback_executions(3)
        .with_statistical_window(20_000, 20)
        .with_percentile_window(60_000, 6)
        .with_command_group("payments");

    let json = serde_json::to_string(&options).unwrap();
    let parsed: CommandOptions = serde_json::from_str(&json).unwrap();
    assert_eq!(options, parsed);

    let properties = CommandProperties::resolve("Charge", parsed).unwrap();
    assert_eq!(properties.statistical_window, Duration::from_secs(20));
    assert_eq!(properties.statistical_window_buckets, 20);
    assert_eq!(properties.percentile_window, Duration::from_secs(60));
    assert_eq!(properties.command_group, "payments");
}

#[test]
fn test_partial_document_resolves_with_defaults() {
    // A document naming only a subset of options resolves with defaults for
    // the rest.
    let options: CommandOptions =
        serde_json::from_str(r#"{"executionTimeoutInMilliseconds": 300}"#).unwrap();
    let properties = CommandProperties::resolve("Lookup", options).unwrap();

    assert_eq!(properties.execution_timeout, Duration::from_millis(300));
    assert_eq!(properties.max_concurrent_executions, 10);
}

// ===== Validation Tests =====

#[test]
fn test_validation_failures_name_the_command() {
    let result = CommandProperties::resolve(
        "Broken",
        CommandOptions::new().with_sleep_window_ms(0),
    );

    match result {
        Err(CommandError::Configuration(reason)) => assert!(reason.contains("Broken")),
        other => panic!("expected configuration error, got {other:?}"),
    }
}

#[test]
fn test_empty_key_is_rejected() {
    let result = CommandProperties::resolve("", CommandOptions::default());
    assert!(matches!(result, Err(CommandError::Configuration(_))));
}

#[rstest]
#[case::zero_timeout(CommandOptions::new().with_execution_timeout_ms(0))]
#[case::zero_sleep_window(CommandOptions::new().with_sleep_window_ms(0))]
#[case::zero_statistical_window(CommandOptions::new().with_statistical_window(0, 10))]
#[case::uneven_buckets(CommandOptions::new().with_statistical_window(1_000, 3))]
#[case::zero_buckets(CommandOptions::new().with_percentile_window(1_000, 0))]
#[case::zero_primary_pool(CommandOptions::new().with_max_concurrent_executions(0))]
#[case::zero_fallback_pool(CommandOptions::new().with_max_concurrent_fallback_executions(0))]
#[case::threshold_over_100(CommandOptions::new().with_error_threshold_percentage(101))]
#[case::conflicting_force_flags(
    CommandOptions::new().with_force_opened(true).with_force_closed(true)
)]
fn test_invalid_options_fail_at_registration(#[case] options: CommandOptions) {
    assert!(matches!(
        CommandProperties::resolve("Broken", options),
        Err(CommandError::Configuration(_))
    ));
}
