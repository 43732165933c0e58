use super::{CliArgs, HarnessConfig, ProviderKind};
use crate::HarnessError;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[test]
fn test_config_default() {
    let config = HarnessConfig::default();
    assert_eq!(config.provider, ProviderKind::Module);
    assert_eq!(config.wasm_path, PathBuf::from("plain.go.wasm"));
    assert_eq!(config.buffer_size, 1024);
    assert_eq!(config.rounds, 3);
    assert!(config.cancel_dial_scope);
    assert_eq!(config.cancel_after_round, 1);
    assert_eq!(config.round_delay, Duration::from_secs(1));
    assert_eq!(config.io_timeout, Duration::from_secs(10));
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_rejects_zero_io_timeout() {
    let config = HarnessConfig {
        io_timeout: Duration::ZERO,
        ..HarnessConfig::default()
    };
    assert!(matches!(config.validate(), Err(HarnessError::Config(_))));

    let args = CliArgs::try_parse_from(["dialscope", "--io-timeout-ms", "250"]).unwrap();
    assert_eq!(HarnessConfig::from(args).io_timeout, Duration::from_millis(250));
}

#[test]
fn test_config_rejects_cancel_round_out_of_range() {
    let config = HarnessConfig {
        cancel_after_round: 3,
        ..HarnessConfig::default()
    };
    assert!(matches!(config.validate(), Err(HarnessError::Config(_))));

    // Out-of-range rounds only matter when cancellation is enabled
    let config = HarnessConfig {
        cancel_after_round: 3,
        cancel_dial_scope: false,
        ..HarnessConfig::default()
    };
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_rejects_tiny_buffer() {
    let config = HarnessConfig {
        buffer_size: 4,
        ..HarnessConfig::default()
    };
    assert!(matches!(config.validate(), Err(HarnessError::Config(_))));

    let config = HarnessConfig {
        rounds: 0,
        ..HarnessConfig::default()
    };
    assert!(matches!(config.validate(), Err(HarnessError::Config(_))));
}

#[test]
fn test_cli_defaults() {
    let args = CliArgs::try_parse_from(["dialscope"]).unwrap();
    assert_eq!(args.wasm, PathBuf::from("plain.go.wasm"));
    assert!(args.cancel_dial_ctx);
    assert!(!args.use_tcp);

    let config = HarnessConfig::from(args);
    assert_eq!(config.provider, ProviderKind::Module);
    assert!(config.verify_redial);
}

#[test]
fn test_cli_bool_flag_forms() {
    let args = CliArgs::try_parse_from(["dialscope", "--use-tcp", "--cancel-dial-ctx=false"]).unwrap();
    assert!(args.use_tcp);
    assert!(!args.cancel_dial_ctx);

    let args = CliArgs::try_parse_from([
        "dialscope",
        "--use-tcp=true",
        "--cancel-dial-ctx",
        "true",
        "--round-delay-ms",
        "0",
        "--wasm",
        "transport.wasm",
    ])
    .unwrap();
    let config = HarnessConfig::from(args);
    assert_eq!(config.provider, ProviderKind::Tcp);
    assert!(config.cancel_dial_scope);
    assert_eq!(config.round_delay, Duration::ZERO);
    assert_eq!(config.wasm_path, PathBuf::from("transport.wasm"));
}

#[test]
fn test_child_scope_cancel_does_not_reach_parent() {
    let process = CancellationToken::new();
    let dial = process.child_token();

    dial.cancel();

    assert!(dial.is_cancelled());
    assert!(!process.is_cancelled());

    // A fresh child of the untouched parent starts live
    assert!(!process.child_token().is_cancelled());
}

#[test]
fn test_parent_scope_cancel_reaches_child() {
    let process = CancellationToken::new();
    let dial = process.child_token();

    process.cancel();

    assert!(dial.is_cancelled());
    // Children created after the parent is cancelled are born cancelled
    assert!(process.child_token().is_cancelled());
}
