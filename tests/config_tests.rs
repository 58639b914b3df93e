//! Tests for loading `ServerConfig` from YAML files

use socketio::prelude::*;
use socketio::server::transport::polling;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(yaml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(yaml.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_full_config_from_file() {
    let file = write_config(
        r#"
resource: /realtime
heartbeat_timeout_ms: 60000
closing_timeout_ms: 25000
polling_duration_ms: 5000
transports:
  - xhr-polling
"#,
    );

    let config = ServerConfig::from_yaml_file(file.path().to_str().unwrap()).unwrap();

    assert_eq!(config.resource, "/realtime");
    assert_eq!(config.heartbeat_timeout_ms, 60000);
    assert_eq!(config.closing_timeout_ms, 25000);
    assert_eq!(config.polling_duration_ms, 5000);
    assert_eq!(config.transports, Some(vec!["xhr-polling".to_string()]));
}

#[test]
fn test_empty_file_uses_defaults() {
    let file = write_config("{}\n");
    let config = ServerConfig::from_yaml_file(file.path().to_str().unwrap()).unwrap();
    assert_eq!(config, ServerConfig::default());
}

#[test]
fn test_missing_file_is_io_error() {
    let err = ServerConfig::from_yaml_file("/definitely/not/here.yaml").unwrap_err();
    assert!(matches!(err, ConfigError::Io { ref path, .. } if path == "/definitely/not/here.yaml"));
}

#[test]
fn test_invalid_yaml_is_parse_error() {
    let file = write_config("heartbeat_timeout_ms: not-a-number\n");
    let err = ServerConfig::from_yaml_file(file.path().to_str().unwrap()).unwrap_err();
    assert!(matches!(err, ConfigError::ParseError { .. }));
}

#[test]
fn test_zero_polling_duration_is_rejected() {
    let file = write_config("polling_duration_ms: 0\n");
    let err = ServerConfig::from_yaml_file(file.path().to_str().unwrap()).unwrap_err();
    assert!(matches!(err, ConfigError::ZeroDuration { ref field } if field == "polling_duration_ms"));
}

#[test]
fn test_loaded_config_drives_the_handshake() {
    let file = write_config(
        r#"
heartbeat_timeout_ms: 45000
closing_timeout_ms: 30000
transports: [xhr-polling]
"#,
    );
    let config = ServerConfig::from_yaml_file(file.path().to_str().unwrap()).unwrap();

    let server = ServerBuilder::new()
        .with_config(config)
        .with_session_id_generator(|| Some("FROMYAML00000001".to_string()))
        .build()
        .unwrap();

    assert_eq!(
        server.handshake_body("FROMYAML00000001"),
        format!("FROMYAML00000001:45000:30000:{}", polling::NAME)
    );
}

#[test]
fn test_unknown_transport_fails_at_build() {
    let config = ServerConfig::from_yaml_str("transports: [flashsocket]\n").unwrap();
    let result = ServerBuilder::new().with_config(config).build();
    assert!(result.is_err());
}
