//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the art-matrix.toml file.
//! The file is the single definition unit for the values the device must not carry
//! in source control: the Wi-Fi credentials and the two service URLs.
//!
//! Unlike the display settings, those values have no defaults. A file that omits
//! one of them fails to load instead of silently running with an empty string.
//!
//! ```toml
//! [network]
//! ssid = "home"
//! password = "hunter2"
//!
//! [service]
//! track_url = "http://192.168.1.10:5000/user/alice/track"
//! art_url = "http://192.168.1.10:5000/user/alice/art"
//!
//! [display]
//! poll_interval_secs = 5
//! rotation = 270
//! ```

use crate::ImageMode;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_PATH: &str = "art-matrix.toml";

/// Errors raised while loading or validating the configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read or written
    #[error("config IO on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML is malformed or a required field is missing
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Serializing the config back to TOML failed
    #[error("config serialization: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A required value was present but empty
    #[error("`{0}` must not be empty")]
    Empty(&'static str),

    /// A URL did not parse or was not http(s)
    #[error("`{field}` is not a valid http(s) URL: {value}")]
    Url { field: &'static str, value: String },

    /// Both explicit URLs and a server/username pair were given
    #[error("[service] takes either track_url/art_url or server/username, not both")]
    AmbiguousService,

    /// Neither explicit URLs nor a server/username pair were given
    #[error("[service] needs track_url and art_url, or server and username")]
    MissingService,

    /// Rotation was not a multiple of 90 degrees
    #[error("rotation must be 0, 90, 180 or 270 (got {0})")]
    Rotation(u16),
}

/// Application configuration loaded from art-matrix.toml
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Wi-Fi credentials
    pub network: NetworkConfig,
    /// Track and art endpoints
    pub service: ServiceConfig,
    /// Panel and update loop settings
    pub display: DisplayConfig,
}

/// Wi-Fi credentials. Both fields are required in the file.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkConfig {
    /// Network name
    pub ssid: String,
    /// Network secret; an explicit empty string means an open network
    pub password: String,
}

impl fmt::Debug for NetworkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkConfig")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Resolved service endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceConfig {
    /// Endpoint answering with track name, artists and remaining milliseconds
    #[serde(serialize_with = "serialize_url")]
    pub track_url: Url,
    /// Endpoint answering with the raw pixel payload
    #[serde(serialize_with = "serialize_url")]
    pub art_url: Url,
}

impl ServiceConfig {
    /// Derive both endpoints from a server address and a user name, the
    /// layout the now-playing server exposes (`/user/<name>/track`, `/user/<name>/art`).
    pub fn from_server(server: &str, username: &str) -> Result<Self, ConfigError> {
        if server.trim().is_empty() {
            return Err(ConfigError::Empty("service.server"));
        }
        if username.trim().is_empty() {
            return Err(ConfigError::Empty("service.username"));
        }

        let base = if server.contains("://") {
            server.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", server.trim_end_matches('/'))
        };

        Ok(Self {
            track_url: parse_url("service.server", &format!("{base}/user/{username}/track"))?,
            art_url: parse_url("service.server", &format!("{base}/user/{username}/art"))?,
        })
    }

    /// The server's combined page (`/user/<name>/`): three track lines and the
    /// pixels as hex text. It sits next to the track endpoint.
    pub fn now_playing_url(&self, mode: ImageMode) -> Url {
        let mut url = self.track_url.clone();
        url.set_query(None);
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop().push("");
        }
        url.query_pairs_mut()
            .append_pair("mode", &mode.code().to_string());
        url
    }

    /// Art URL with the `mode` query parameter the server understands.
    pub fn art_url_for(&self, mode: ImageMode) -> Url {
        let mut url = self.art_url.clone();
        url.query_pairs_mut()
            .append_pair("mode", &mode.code().to_string());
        url
    }
}

/// Raw `[service]` section as written in the file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawService {
    track_url: Option<String>,
    art_url: Option<String>,
    server: Option<String>,
    username: Option<String>,
}

impl RawService {
    fn resolve(self) -> Result<ServiceConfig, ConfigError> {
        match (self.track_url, self.art_url, self.server, self.username) {
            (Some(track), Some(art), None, None) => Ok(ServiceConfig {
                track_url: parse_url("service.track_url", &track)?,
                art_url: parse_url("service.art_url", &art)?,
            }),
            (None, None, Some(server), Some(user)) => ServiceConfig::from_server(&server, &user),
            (None, None, _, _) | (Some(_), None, None, None) | (None, Some(_), None, None) => {
                Err(ConfigError::MissingService)
            }
            _ => Err(ConfigError::AmbiguousService),
        }
    }
}

/// Raw file layout. `network` and `service` carry no serde defaults.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    network: NetworkConfig,
    service: RawService,
    #[serde(default)]
    display: DisplayConfig,
}

/// Panel and update loop configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DisplayConfig {
    /// Seconds between art refreshes
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Payload format requested from the art endpoint
    #[serde(default)]
    pub image_mode: ImageMode,

    /// Clockwise panel rotation in degrees
    #[serde(default)]
    pub rotation: u16,

    /// Consecutive failed updates tolerated before the process gives up
    #[serde(default = "default_max_missed")]
    pub max_missed_updates: u32,

    /// Where the last good frame is kept
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,

    /// Cached frame TTL in minutes
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_minutes: u64,

    /// HTTP request timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Fetch track and pixels in one request from the server's combined page
    /// instead of the separate track and art endpoints
    #[serde(default)]
    pub combined_endpoint: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            image_mode: ImageMode::DEFAULT,
            rotation: 0,
            max_missed_updates: default_max_missed(),
            cache_path: default_cache_path(),
            cache_ttl_minutes: default_cache_ttl(),
            http_timeout_secs: default_http_timeout(),
            combined_endpoint: false,
        }
    }
}

fn default_poll_interval() -> u64 {
    5
}

fn default_max_missed() -> u32 {
    3
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("/tmp/art_matrix_frame.json")
}

fn default_cache_ttl() -> u64 {
    30
}

fn default_http_timeout() -> u64 {
    10
}

fn serialize_url<S: serde::Serializer>(url: &Url, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(url.as_str())
}

fn parse_url(field: &'static str, value: &str) -> Result<Url, ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Empty(field));
    }
    match Url::parse(value.trim()) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(url),
        _ => Err(ConfigError::Url {
            field,
            value: value.to_string(),
        }),
    }
}

impl Config {
    /// Load configuration from art-matrix.toml in the working directory
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(DEFAULT_PATH)
    }

    /// Load configuration from specified path.
    ///
    /// There is no fallback: a missing file or a missing credential is an error.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&contents)?;
        info!(
            ssid = %config.network.ssid,
            art_url = %config.service.art_url,
            "loaded configuration from {}",
            path.display()
        );
        Ok(config)
    }

    /// Parse and validate configuration text.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(contents)?;

        if raw.network.ssid.trim().is_empty() {
            return Err(ConfigError::Empty("network.ssid"));
        }
        if !matches!(raw.display.rotation, 0 | 90 | 180 | 270) {
            return Err(ConfigError::Rotation(raw.display.rotation));
        }

        Ok(Config {
            network: raw.network,
            service: raw.service.resolve()?,
            display: raw.display,
        })
    }

    /// Save current configuration to `path` as pretty TOML
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("configuration saved to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FULL: &str = r#"
[network]
ssid = "home"
password = "hunter2"

[service]
track_url = "http://10.0.0.2:5000/user/alice/track"
art_url = "http://10.0.0.2:5000/user/alice/art"
"#;

    #[test]
    fn test_display_defaults() {
        let config = Config::from_toml(FULL).unwrap();
        assert_eq!(config.display.poll_interval_secs, 5);
        assert_eq!(config.display.image_mode, ImageMode::Rgb888);
        assert_eq!(config.display.rotation, 0);
        assert_eq!(config.display.max_missed_updates, 3);
        assert_eq!(config.display.cache_ttl_minutes, 30);
        assert!(!config.display.combined_endpoint);
    }

    #[test]
    fn test_misspelled_display_key_rejected() {
        let text = format!("{FULL}
[display]
rotaton = 270
");
        let err = Config::from_toml(&text).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("rotaton"), "{err}");
    }

    #[test]
    fn test_unknown_section_and_network_key_rejected() {
        let text = format!("{FULL}
[dispaly]
rotation = 90
");
        assert!(matches!(Config::from_toml(&text), Err(ConfigError::Parse(_))));

        let text = FULL.replace("ssid = \"home\"", "ssid = \"home\"\npasword = \"x\"");
        assert!(matches!(Config::from_toml(&text), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_password_fails() {
        let text = FULL.replace("password = \"hunter2\"\n", "");
        let err = Config::from_toml(&text).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("password"), "{err}");
    }

    #[test]
    fn test_missing_network_section_fails() {
        let text = FULL.replace("[network]\nssid = \"home\"\npassword = \"hunter2\"\n", "");
        assert!(Config::from_toml(&text).is_err());
    }

    #[test]
    fn test_missing_art_url_fails() {
        let text = FULL.replace("art_url = \"http://10.0.0.2:5000/user/alice/art\"\n", "");
        assert!(matches!(
            Config::from_toml(&text),
            Err(ConfigError::MissingService)
        ));
    }

    #[test]
    fn test_empty_password_is_open_network() {
        let text = FULL.replace("hunter2", "");
        let config = Config::from_toml(&text).unwrap();
        assert_eq!(config.network.password, "");
    }

    #[test]
    fn test_empty_ssid_rejected() {
        let text = FULL.replace("ssid = \"home\"", "ssid = \"\"");
        assert!(matches!(
            Config::from_toml(&text),
            Err(ConfigError::Empty("network.ssid"))
        ));
    }

    #[test]
    fn test_bad_url_rejected() {
        let text = FULL.replace("http://10.0.0.2:5000/user/alice/art", "ftp://nowhere");
        assert!(matches!(
            Config::from_toml(&text),
            Err(ConfigError::Url {
                field: "service.art_url",
                ..
            })
        ));
    }

    #[test]
    fn test_server_and_username_derive_urls() {
        let text = r#"
[network]
ssid = "home"
password = "pw"

[service]
server = "10.0.0.2:5000"
username = "alice"
"#;
        let config = Config::from_toml(text).unwrap();
        assert_eq!(
            config.service.track_url.as_str(),
            "http://10.0.0.2:5000/user/alice/track"
        );
        assert_eq!(
            config.service.art_url.as_str(),
            "http://10.0.0.2:5000/user/alice/art"
        );
    }

    #[test]
    fn test_both_service_forms_rejected() {
        let text = format!("{FULL}server = \"10.0.0.2\"\nusername = \"alice\"\n");
        assert!(matches!(
            Config::from_toml(&text),
            Err(ConfigError::AmbiguousService)
        ));
    }

    #[test]
    fn test_bad_rotation_rejected() {
        let text = format!("{FULL}\n[display]\nrotation = 45\n");
        assert!(matches!(
            Config::from_toml(&text),
            Err(ConfigError::Rotation(45))
        ));
    }

    #[test]
    fn test_bad_image_mode_rejected() {
        let text = format!("{FULL}\n[display]\nimage_mode = 444\n");
        assert!(Config::from_toml(&text).is_err());
    }

    #[test]
    fn test_art_url_carries_mode() {
        let config = Config::from_toml(FULL).unwrap();
        let url = config.service.art_url_for(ImageMode::Rgb565);
        assert_eq!(url.query(), Some("mode=565"));
    }

    #[test]
    fn test_now_playing_url_is_the_user_page() {
        let config = Config::from_toml(FULL).unwrap();
        let url = config.service.now_playing_url(ImageMode::Rgb888);
        assert_eq!(url.as_str(), "http://10.0.0.2:5000/user/alice/?mode=888");
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = Config::from_toml(FULL).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let err = Config::load_from_path("/nonexistent/path").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_save_then_load() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(FULL.as_bytes()).unwrap();
        let config = Config::load_from_path(file.path()).unwrap();

        let out = NamedTempFile::new().unwrap();
        config.save(out.path()).unwrap();
        let reloaded = Config::load_from_path(out.path()).unwrap();
        assert_eq!(reloaded.network, config.network);
        assert_eq!(reloaded.service, config.service);
        assert_eq!(reloaded.display, config.display);
    }
}
