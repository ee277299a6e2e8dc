use anyhow::{anyhow, Context};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "EXPIRY_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: General,
    pub clock: ClockSettings,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct General {
    pub log_level: String,
}

impl General {
    /// Install the global subscriber. `RUST_LOG` overrides `log_level`.
    pub fn init_tracing(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.log_level));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
}

impl Default for General {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ClockSettings {
    /// "local", "UTC" or an IANA zone name.
    pub timezone: String,
    /// Venue clock minus host clock, in seconds.
    pub server_offset_secs: i64,
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            timezone: "local".to_string(),
            server_offset_secs: 0,
        }
    }
}

/// Calendar convention the binaries run the core with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Local,
    Named(chrono_tz::Tz),
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Load the file named by `EXPIRY_CONFIG`, or `config.toml`.
    pub fn from_env() -> anyhow::Result<Self> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_or_default(path)
    }

    /// Load `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.zone()?;
        Ok(config)
    }

    pub fn zone(&self) -> anyhow::Result<Zone> {
        let name = self.clock.timezone.trim();
        if name.eq_ignore_ascii_case("local") {
            return Ok(Zone::Local);
        }
        name.parse::<chrono_tz::Tz>()
            .map(Zone::Named)
            .map_err(|e| anyhow!("unknown timezone {:?}: {}", name, e))
    }
}
