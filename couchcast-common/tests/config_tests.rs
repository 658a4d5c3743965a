//! Integration tests for configuration resolution

use couchcast_common::config::{config_file_path, load_config_file, CliOverrides, Config, FileConfig};
use serial_test::serial;
use std::io::Write;
use std::path::PathBuf;

#[test]
fn parses_full_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
port = 6200
library_root = "/mnt/storage"
stream_base_url = "http://192.168.100.102:6200"
ffmpeg_path = "/usr/local/bin/ffmpeg"
discovery_timeout_secs = 5
connect_timeout_secs = 20
"#
    )
    .unwrap();

    let parsed = load_config_file(file.path()).unwrap();
    let config = Config::from_sources(CliOverrides::default(), parsed);

    assert_eq!(config.port, 6200);
    assert_eq!(config.library_root, PathBuf::from("/mnt/storage"));
    assert_eq!(config.stream_base_url, "http://192.168.100.102:6200");
    assert_eq!(config.ffmpeg_path, PathBuf::from("/usr/local/bin/ffmpeg"));
    assert_eq!(config.discovery_timeout_secs, 5);
    assert_eq!(config.connect_timeout_secs, 20);
}

#[test]
fn partial_config_file_leaves_defaults_in_place() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "port = 6200").unwrap();

    let parsed = load_config_file(file.path()).unwrap();
    let config = Config::from_sources(CliOverrides::default(), parsed);

    assert_eq!(config.port, 6200);
    assert_eq!(config.ffmpeg_path, PathBuf::from("ffmpeg"));
}

#[test]
fn malformed_config_file_is_an_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "port = \"not a number").unwrap();

    assert!(load_config_file(file.path()).is_err());
}

#[test]
fn missing_config_file_is_an_error() {
    assert!(load_config_file(std::path::Path::new("/nonexistent/config.toml")).is_err());
}

#[test]
#[serial]
fn env_var_overrides_config_file_search() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "port = 6400").unwrap();

    std::env::set_var("COUCHCAST_CONFIG", file.path());
    let found = config_file_path();
    std::env::remove_var("COUCHCAST_CONFIG");

    assert_eq!(found, Some(file.path().to_path_buf()));

    let parsed = load_config_file(file.path()).unwrap();
    assert_eq!(parsed.port, Some(6400));
}

#[test]
#[serial]
fn resolve_works_without_any_config_file() {
    std::env::remove_var("COUCHCAST_CONFIG");
    // No config file in the test environment: defaults must apply cleanly
    let config = Config::resolve(CliOverrides::default());
    assert!(config.is_ok());
}

#[test]
fn file_values_fill_fields_the_cli_left_unset() {
    let file = FileConfig {
        connect_timeout_secs: Some(30),
        ..Default::default()
    };
    let cli = CliOverrides {
        port: Some(9100),
        ..Default::default()
    };
    let config = Config::from_sources(cli, file);
    assert_eq!(config.port, 9100);
    assert_eq!(config.connect_timeout_secs, 30);
}
