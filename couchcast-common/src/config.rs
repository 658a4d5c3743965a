//! Configuration loading and resolution
//!
//! Settings are resolved per-field in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file (`~/.config/couchcast/config.toml`, then
//!    `/etc/couchcast/config.toml`)
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Default HTTP port for the service
pub const DEFAULT_PORT: u16 = 5120;

/// Default mDNS discovery window in seconds
pub const DEFAULT_DISCOVERY_TIMEOUT_SECS: u64 = 3;

/// Default bound on a single connect attempt in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server listens on
    pub port: u16,

    /// Root folder of the media library
    pub library_root: PathBuf,

    /// Base URL receivers use to stream media back from this host.
    ///
    /// Must be an address the receiver can reach and resolve. Chromecast
    /// devices resolve hostnames through Google's public DNS, so a
    /// router-level custom hostname here makes casting fail silently;
    /// prefer a numeric LAN address.
    pub stream_base_url: String,

    /// Path to the ffmpeg binary used for thumbnail extraction
    pub ffmpeg_path: PathBuf,

    /// How long a discovery scan listens for receivers, in seconds
    pub discovery_timeout_secs: u64,

    /// Upper bound on a single connect attempt, in seconds
    pub connect_timeout_secs: u64,
}

/// Optional overrides parsed from the TOML config file
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub port: Option<u16>,
    pub library_root: Option<PathBuf>,
    pub stream_base_url: Option<String>,
    pub ffmpeg_path: Option<PathBuf>,
    pub discovery_timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
}

/// Overrides supplied on the command line (already parsed by the caller)
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub port: Option<u16>,
    pub library_root: Option<PathBuf>,
    pub stream_base_url: Option<String>,
    pub ffmpeg_path: Option<PathBuf>,
}

impl Config {
    /// Resolve the effective configuration from CLI overrides, environment
    /// variables, the config file, and compiled defaults.
    pub fn resolve(cli: CliOverrides) -> Result<Self> {
        let file = match config_file_path() {
            Some(path) => load_config_file(&path)?,
            None => FileConfig::default(),
        };
        Ok(Self::from_sources(cli, file))
    }

    /// Merge the three override layers over compiled defaults.
    ///
    /// Environment variables for fields exposed as CLI flags are handled by
    /// clap's `env` support before this is called, so the precedence seen
    /// here is CLI-or-env, then file, then default.
    pub fn from_sources(cli: CliOverrides, file: FileConfig) -> Self {
        let port = cli.port.or(file.port).unwrap_or(DEFAULT_PORT);
        Self {
            port,
            library_root: cli
                .library_root
                .or(file.library_root)
                .unwrap_or_else(default_library_root),
            stream_base_url: cli
                .stream_base_url
                .or(file.stream_base_url)
                .unwrap_or_else(|| format!("http://127.0.0.1:{}", port)),
            ffmpeg_path: cli
                .ffmpeg_path
                .or(file.ffmpeg_path)
                .unwrap_or_else(|| PathBuf::from("ffmpeg")),
            discovery_timeout_secs: file
                .discovery_timeout_secs
                .unwrap_or(DEFAULT_DISCOVERY_TIMEOUT_SECS),
            connect_timeout_secs: file
                .connect_timeout_secs
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

/// Find the config file, preferring the user config dir over the system one.
///
/// Returns None when no config file exists (defaults apply).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("COUCHCAST_CONFIG") {
        return Some(PathBuf::from(path));
    }

    let user_config = dirs::config_dir().map(|d| d.join("couchcast").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/couchcast/config.toml");
    if system_config.exists() {
        return Some(system_config);
    }

    None
}

/// Parse a TOML config file into partial overrides
pub fn load_config_file(path: &std::path::Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("cannot parse {}: {}", path.display(), e)))
}

/// OS-dependent default library root
fn default_library_root() -> PathBuf {
    dirs::video_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = Config::from_sources(CliOverrides::default(), FileConfig::default());
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert_eq!(config.discovery_timeout_secs, DEFAULT_DISCOVERY_TIMEOUT_SECS);
        assert_eq!(config.connect_timeout_secs, DEFAULT_CONNECT_TIMEOUT_SECS);
        assert_eq!(config.stream_base_url, "http://127.0.0.1:5120");
    }

    #[test]
    fn cli_overrides_beat_file_values() {
        let cli = CliOverrides {
            port: Some(9000),
            library_root: Some(PathBuf::from("/srv/media")),
            ..Default::default()
        };
        let file = FileConfig {
            port: Some(8000),
            library_root: Some(PathBuf::from("/mnt/storage")),
            stream_base_url: Some("http://192.168.1.10:8000".into()),
            ..Default::default()
        };
        let config = Config::from_sources(cli, file);
        assert_eq!(config.port, 9000);
        assert_eq!(config.library_root, PathBuf::from("/srv/media"));
        // File value survives where the CLI is silent
        assert_eq!(config.stream_base_url, "http://192.168.1.10:8000");
    }

    #[test]
    fn stream_base_url_tracks_resolved_port() {
        let cli = CliOverrides {
            port: Some(7777),
            ..Default::default()
        };
        let config = Config::from_sources(cli, FileConfig::default());
        assert_eq!(config.stream_base_url, "http://127.0.0.1:7777");
    }
}
