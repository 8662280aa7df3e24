use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const CLIENT_ID_ENV: &str = "TUNEFETCH_CLIENT_ID";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Outbound proxy for the streaming API.
    pub proxy: Option<String>,
    #[serde(default)]
    pub streaming: StreamingConfig,
    #[serde(default)]
    pub mirror: MirrorConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    pub client_id: Option<String>,
    pub api_base: String,
    pub timeout_secs: u64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            api_base: "https://api-v2.soundcloud.com".to_string(),
            timeout_secs: 15,
        }
    }
}

impl StreamingConfig {
    pub fn is_configured(&self) -> bool {
        self.client_id.as_ref().is_some_and(|s| !s.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    pub host: String,
    pub scheme: String,
    pub timeout_secs: u64,
    /// Probe candidate URLs and keep only those served as `audio/*`.
    pub verify_audio: bool,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            host: "skysound7.com".to_string(),
            scheme: "https".to_string(),
            timeout_secs: 12,
            verify_audio: true,
        }
    }
}

impl MirrorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn referer(&self) -> String {
        format!("{}://{}/", self.scheme, self.host)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub max_concurrent: usize,
    /// 0 keeps every resolved URL for the process lifetime.
    pub cache_capacity: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 6,
            cache_capacity: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Bodies shorter than this are treated as error pages or previews.
    pub min_bytes: usize,
    pub timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            min_bytes: 50_000,
            timeout_secs: 30,
        }
    }
}

impl DownloadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub capacity: usize,
    pub ttl_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            ttl_secs: 600,
        }
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

pub fn default_config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home)
        .join(".config")
        .join("tunefetch")
        .join("config.toml")
}

/// Loads the config file, falling back to defaults when it is missing.
/// A malformed file is an error rather than a silent reset.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        parse_config(&content).with_context(|| format!("invalid config {}", path.display()))?
    } else {
        Config::default()
    };

    apply_client_id_override(&mut config, std::env::var(CLIENT_ID_ENV).ok());
    Ok(config)
}

fn apply_client_id_override(config: &mut Config, value: Option<String>) {
    if let Some(id) = value.filter(|id| !id.trim().is_empty()) {
        config.streaming.client_id = Some(id.trim().to_string());
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    Ok(toml::from_str(content)?)
}

pub fn save_config(path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
