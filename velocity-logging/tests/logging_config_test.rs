use velocity_logging::{init_logging_from_config, init_simple_tracing, LogFormat, LogLevel, LoggingConfig};

#[test]
fn test_logging_config_from_yaml() {
    let yaml_config = r#"
level: info
format: json
include_location: true
directives:
  - velocity_engine=trace
"#;

    let config: LoggingConfig = serde_yaml::from_str(yaml_config).unwrap();
    assert_eq!(config.level, LogLevel::Info);
    assert_eq!(config.format, LogFormat::Json);
    assert!(config.include_location);
    assert_eq!(config.filter_string(), "info,velocity_engine=trace");
}

#[test]
fn test_repeated_initialization_is_harmless() {
    let config = LoggingConfig {
        format: LogFormat::Compact,
        ..LoggingConfig::default()
    };

    assert!(init_logging_from_config(&config).is_ok());
    // A second subscriber cannot be installed, which must not be an error
    assert!(init_logging_from_config(&config).is_ok());
    assert!(init_simple_tracing("debug").is_ok());

    tracing::info!(phase = "download", "logging initialized");
}
