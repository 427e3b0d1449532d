// SPDX-License-Identifier: MIT OR Apache-2.0
//! Validation and merge behaviour of `runcx-config` through its public API.

use runcx_config::{
    ConfigError, ConfigWarning, RunConfig, VALID_ENCODINGS, VALID_LOG_LEVELS, VALID_POLICIES,
    merge_configs, parse_toml, validate_config,
};

fn reasons(err: ConfigError) -> Vec<String> {
    match err {
        ConfigError::ValidationError { reasons } => reasons,
        other => panic!("expected ValidationError, got {other:?}"),
    }
}

#[test]
fn every_listed_name_validates() {
    for level in VALID_LOG_LEVELS {
        let cfg = RunConfig {
            log_level: Some((*level).into()),
            ..Default::default()
        };
        validate_config(&cfg).unwrap();
    }
    for policy in VALID_POLICIES {
        let cfg = RunConfig {
            cancellation_policy: Some((*policy).into()),
            ..Default::default()
        };
        validate_config(&cfg).unwrap();
    }
    for encoding in VALID_ENCODINGS {
        let cfg = RunConfig {
            output_encoding: Some((*encoding).into()),
            input_encoding: Some(encoding.to_uppercase()),
            ..Default::default()
        };
        validate_config(&cfg).unwrap();
    }
}

#[test]
fn all_errors_are_reported_together() {
    let cfg = parse_toml(
        r#"
        buffer_size = 0
        success_codes = []
        timeout_ms = 0

        [env]
        "A=B" = "x"
        "#,
    )
    .unwrap();
    let reasons = reasons(validate_config(&cfg).unwrap_err());
    assert_eq!(reasons.len(), 4, "{reasons:?}");
}

#[test]
fn oversized_buffer_is_an_error_but_large_one_warns() {
    let too_big = RunConfig {
        buffer_size: Some(64 * 1024 * 1024),
        ..Default::default()
    };
    assert!(validate_config(&too_big).is_err());

    let large = RunConfig {
        buffer_size: Some(2 * 1024 * 1024),
        ..Default::default()
    };
    let warnings = validate_config(&large).unwrap();
    assert_eq!(
        warnings,
        vec![ConfigWarning::LargeBuffer {
            bytes: 2 * 1024 * 1024
        }]
    );
}

#[test]
fn cleared_environment_without_entries_warns() {
    let cfg = RunConfig {
        inherit_env: Some(false),
        ..Default::default()
    };
    let warnings = validate_config(&cfg).unwrap();
    assert_eq!(warnings, vec![ConfigWarning::EmptyEnvironment]);
    assert!(warnings[0].to_string().contains("empty environment"));
}

#[test]
fn merge_of_defaults_is_default() {
    let merged = merge_configs(RunConfig::default(), RunConfig::default());
    assert_eq!(merged, RunConfig::default());
}

#[test]
fn toml_round_trips_through_serialisation() {
    let cfg = parse_toml("echo_prompt = \"$ \"\nsuccess_codes = [0, 1]").unwrap();
    let text = toml::to_string(&cfg).unwrap();
    assert_eq!(parse_toml(&text).unwrap(), cfg);
}
