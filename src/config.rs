use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Result, WrapErr, bail};
use log::debug;
use serde::{Deserialize, Serialize};

pub const API_KEY_ENV: &str = "YOUTUBE_API_KEY";

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_METADATA_API_URL: &str = "https://www.googleapis.com/youtube/v3/videos";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 15 * 60;
const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u32 = 100;
const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub youtube_api_key: Option<String>,
    pub metadata_api_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub rate_limit_window_secs: Option<u64>,
    pub rate_limit_max_requests: Option<u32>,
    pub server_url: Option<String>,
}

impl Config {
    /// Load config from ~/.config/ytscribe/config.toml if it exists
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            debug!("Loading config from {}", path.display());
            let content = std::fs::read_to_string(path)?;
            let config: Config =
                toml::from_str(&content).wrap_err_with(|| format!("invalid config file {}", path.display()))?;
            Ok(config)
        } else {
            debug!("No config file found at {}", path.display());
            Ok(Config::default())
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn server_url(&self) -> &str {
        self.server_url.as_deref().unwrap_or(DEFAULT_SERVER_URL)
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("ytscribe")
        .join("config.toml")
}

/// Inbound request cap per caller address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSettings {
    pub window: Duration,
    pub max_requests: u32,
}

/// Everything the server needs, resolved once at startup
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub api_key: String,
    pub metadata_api_url: String,
    pub request_timeout: Duration,
    pub rate_limit: RateLimitSettings,
}

impl ServerSettings {
    /// Merge CLI overrides, the environment key and the config file
    pub fn resolve(
        config: &Config,
        env_api_key: Option<String>,
        host: Option<&str>,
        port: Option<u16>,
    ) -> Result<Self> {
        let api_key = env_api_key
            .filter(|k| !k.trim().is_empty())
            .or_else(|| config.youtube_api_key.clone().filter(|k| !k.trim().is_empty()));
        let Some(api_key) = api_key else {
            bail!(
                "{API_KEY_ENV} is not set\n\nSet the environment variable or add youtube_api_key to {}",
                config_path().display()
            );
        };

        let host = host.or(config.host.as_deref()).unwrap_or(DEFAULT_HOST);
        let ip: IpAddr = host.parse().wrap_err_with(|| format!("invalid listen host: {host}"))?;
        let port = port.or(config.port).unwrap_or(DEFAULT_PORT);

        Ok(Self {
            addr: SocketAddr::new(ip, port),
            api_key,
            metadata_api_url: config
                .metadata_api_url
                .clone()
                .unwrap_or_else(|| DEFAULT_METADATA_API_URL.to_string()),
            request_timeout: config.request_timeout(),
            rate_limit: RateLimitSettings {
                window: Duration::from_secs(config.rate_limit_window_secs.unwrap_or(DEFAULT_RATE_LIMIT_WINDOW_SECS)),
                max_requests: config.rate_limit_max_requests.unwrap_or(DEFAULT_RATE_LIMIT_MAX_REQUESTS),
            },
        })
    }
}
