//! Configuration loading from files, environment and CLI overrides

use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;

use copilot_core::{
    apply_env_from, load_config_from_path, ConfigError, ConfigOverrides, ConfigSource,
    EndpointScope, InsightSession, PlaybackMode, SessionSettings,
};

fn config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_file_then_cli_layers() {
    let file = config_file(
        r#"
[api]
base_url = "http://finance.local:8000"
user_id = 5
scope = "token"

[playback]
char_delay_ms = 20
"#,
    );

    let mut config = load_config_from_path(Some(file.path().to_path_buf())).unwrap();
    assert_eq!(config.config_file_path.as_deref(), Some(file.path()));
    assert_eq!(config.api.scope, EndpointScope::Token);

    ConfigOverrides::new()
        .with_user_id(9)
        .with_mode(PlaybackMode::Buffered)
        .apply(&mut config)
        .unwrap();

    assert_eq!(config.api.user_id, 9);
    assert_eq!(config.playback.mode, PlaybackMode::Buffered);
    assert_eq!(config.source(), ConfigSource::Cli);
}

#[test]
fn test_env_layer_over_file() {
    let file = config_file("[playback]\nchar_delay_ms = 20\nmode = \"live\"\n");
    let mut config = load_config_from_path(Some(file.path().to_path_buf())).unwrap();

    apply_env_from(&mut config, |key| match key {
        "COPILOT_CHAR_DELAY_MS" => Some("45".to_string()),
        "COPILOT_SCOPE" => Some("token".to_string()),
        _ => None,
    });

    assert_eq!(config.playback.char_delay, Duration::from_millis(45));
    assert_eq!(config.api.scope, EndpointScope::Token);
    assert_eq!(config.source(), ConfigSource::Env);
}

#[test]
fn test_invalid_mode_reported_with_key() {
    let file = config_file("[playback]\nmode = \"sometimes\"\n");
    let err = load_config_from_path(Some(file.path().to_path_buf())).unwrap_err();

    match err {
        ConfigError::InvalidValue { key, value, .. } => {
            assert_eq!(key, "playback.mode");
            assert_eq!(value, "sometimes");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_bad_base_url_rejected() {
    let file = config_file("[api]\nbase_url = \"finance.local\"\n");
    let err = load_config_from_path(Some(file.path().to_path_buf())).unwrap_err();
    assert!(err.to_string().contains("api.base_url"));
}

#[test]
fn test_session_settings_follow_config() {
    let file = config_file("[api]\nread_timeout_ms = 0\n\n[playback]\nchar_delay_ms = 0\n");
    let config = load_config_from_path(Some(file.path().to_path_buf())).unwrap();

    let settings = SessionSettings::from_config(&config);
    assert_eq!(settings.read_timeout, None);
    assert_eq!(settings.playback.char_delay, Duration::ZERO);
}

#[tokio::test]
async fn test_http_session_from_config() {
    let file = config_file("[api]\nbase_url = \"http://127.0.0.1:8000\"\n");
    let config = load_config_from_path(Some(file.path().to_path_buf())).unwrap();

    let session = InsightSession::http(&config).unwrap();
    assert!(!session.is_running());
    assert_eq!(session.settings(), &SessionSettings::from_config(&config));
}
