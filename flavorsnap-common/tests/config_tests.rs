//! Configuration resolution tests
//!
//! Tests touching FLAVORSNAP_CONFIG run serially.

use std::fs;

use flavorsnap_common::config::{load_config, resolve_config_path, SinkKind, CONFIG_ENV_VAR};
use flavorsnap_common::Error;
use serial_test::serial;

#[test]
#[serial]
fn env_var_names_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flavorsnap.toml");
    fs::write(
        &path,
        r#"
        [server]
        bind = "0.0.0.0:8080"
        stub_label = "jollof rice"

        [logging]
        sink = "tracing"
        "#,
    )
    .unwrap();

    std::env::set_var(CONFIG_ENV_VAR, &path);
    let config = load_config(None);
    std::env::remove_var(CONFIG_ENV_VAR);

    let config = config.unwrap();
    assert_eq!(config.server.bind, "0.0.0.0:8080");
    assert_eq!(config.server.stub_label, "jollof rice");
    assert_eq!(config.logging.sink, SinkKind::Tracing);
}

#[test]
#[serial]
fn cli_argument_beats_env_var() {
    let dir = tempfile::tempdir().unwrap();
    let cli = dir.path().join("cli.toml");
    let env = dir.path().join("env.toml");
    fs::write(&cli, "[client]\nmax_retries = 4\n").unwrap();
    fs::write(&env, "[client]\nmax_retries = 9\n").unwrap();

    std::env::set_var(CONFIG_ENV_VAR, &env);
    let resolved = resolve_config_path(Some(&cli));
    let config = load_config(Some(&cli));
    std::env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(resolved, Some(cli.clone()));
    assert_eq!(config.unwrap().client.max_retries, 4);
}

#[test]
#[serial]
fn missing_explicit_file_is_an_error() {
    std::env::remove_var(CONFIG_ENV_VAR);
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");

    let err = load_config(Some(&missing)).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert!(err.to_string().contains("nope.toml"));
}

#[test]
#[serial]
fn invalid_values_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[upload]\naccepted_types = []\n").unwrap();

    let err = load_config(Some(&path)).unwrap_err();
    assert!(err.to_string().contains("accepted_types"));
}
