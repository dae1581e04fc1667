use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const DEFAULT_CONNECT_TIMEOUT_SECONDS: u64 = 15;
const DEFAULT_KEEPALIVE_SECONDS: u64 = 30;
const DEFAULT_LOOKUP_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_MAX_RESPONSE_SIZE: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub connect_timeout_seconds: u64,
    pub keepalive_seconds: u64,
    /// Deadline used by `WhoisClient::lookup`.
    pub lookup_timeout_seconds: u64,
    /// Per-read deadline on the connection itself; 0 disables it.
    pub read_timeout_seconds: u64,
    pub max_response_size: usize,
    /// `socks5://[user:pass@]host:port` (or `socks5h://`); `None` dials directly.
    pub proxy_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigData {
    pub connect_timeout_seconds: u64,
    pub keepalive_seconds: u64,
    pub lookup_timeout_seconds: u64,
    pub read_timeout_seconds: u64,
    pub max_response_size: u64,
    #[serde(default)]
    pub proxy_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            connect_timeout_seconds: DEFAULT_CONNECT_TIMEOUT_SECONDS,
            keepalive_seconds: DEFAULT_KEEPALIVE_SECONDS,
            lookup_timeout_seconds: DEFAULT_LOOKUP_TIMEOUT_SECONDS,
            read_timeout_seconds: 0,
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE as usize,
            proxy_url: None,
        }
    }
}

impl Config {
    /// Load defaults and apply overrides from the process environment.
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_with(|name| std::env::var(name).ok())
    }

    /// Same as [`Config::load`], reading variables through `env`.
    pub fn load_with<F>(env: F) -> Result<Self, config::ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = config::Config::builder()
            .set_default("connect_timeout_seconds", DEFAULT_CONNECT_TIMEOUT_SECONDS)?
            .set_default("keepalive_seconds", DEFAULT_KEEPALIVE_SECONDS)?
            .set_default("lookup_timeout_seconds", DEFAULT_LOOKUP_TIMEOUT_SECONDS)?
            .set_default("read_timeout_seconds", 0u64)?
            .set_default("max_response_size", DEFAULT_MAX_RESPONSE_SIZE)?;

        settings = Self::apply_env_overrides(settings, &env)?;

        let config_data: ConfigData = settings.build()?.try_deserialize()?;

        Ok(Config {
            connect_timeout_seconds: config_data.connect_timeout_seconds,
            keepalive_seconds: config_data.keepalive_seconds,
            lookup_timeout_seconds: config_data.lookup_timeout_seconds,
            read_timeout_seconds: config_data.read_timeout_seconds,
            max_response_size: config_data.max_response_size as usize,
            proxy_url: config_data.proxy_url.filter(|url| !url.trim().is_empty()),
        })
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_seconds)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_seconds)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        match self.read_timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    fn apply_env_overrides<F>(
        mut settings: config::ConfigBuilder<config::builder::DefaultState>,
        env: &F,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Later entries win when several aliases are set
        let env_mappings = [
            ("WHOIS_CONNECT_TIMEOUT_SECONDS", "connect_timeout_seconds"),
            ("WHOIS_KEEPALIVE_SECONDS", "keepalive_seconds"),
            ("WHOIS_TIMEOUT", "lookup_timeout_seconds"),
            ("WHOIS_LOOKUP_TIMEOUT_SECONDS", "lookup_timeout_seconds"),
            ("WHOIS_READ_TIMEOUT_SECONDS", "read_timeout_seconds"),
            ("WHOIS_MAX_RESPONSE_SIZE", "max_response_size"),
            ("ALL_PROXY", "proxy_url"),
            ("WHOIS_PROXY", "proxy_url"),
        ];

        for (env_var, config_key) in env_mappings {
            if let Some(value) = env(env_var) {
                // ALL_PROXY is shared with other tools and often names an HTTP proxy
                if env_var == "ALL_PROXY" && !is_socks5_url(&value) {
                    debug!("Ignoring ALL_PROXY={}: not a SOCKS5 proxy", value);
                    continue;
                }
                settings = settings.set_override(config_key, value)?;
            }
        }

        Ok(settings)
    }
}

fn is_socks5_url(value: &str) -> bool {
    let value = value.trim().to_ascii_lowercase();
    value.starts_with("socks5://") || value.starts_with("socks5h://")
}
