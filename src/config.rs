use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

const DEFAULT_LOCAL_URL: &str = "http://localhost:3001/";
const DEFAULT_UPLOAD_GRACE_MS: u64 = 1000;
const DEFAULT_NOTICE_SECS: u64 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub username: Option<String>,
    /// How long finished uploads stay visible before they are cleared.
    #[serde(default = "default_upload_grace_ms")]
    pub upload_grace_ms: u64,
    /// Lifetime of a GUI notification banner.
    #[serde(default = "default_notice_secs")]
    pub notice_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            username: None,
            upload_grace_ms: DEFAULT_UPLOAD_GRACE_MS,
            notice_secs: DEFAULT_NOTICE_SECS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerMode {
    #[default]
    Local,
    Remote,
}

impl fmt::Display for ServerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMode::Local => f.write_str("local"),
            ServerMode::Remote => f.write_str("remote"),
        }
    }
}

impl FromStr for ServerMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(ServerMode::Local),
            "remote" => Ok(ServerMode::Remote),
            other => Err(anyhow!("Unknown server mode '{}' (expected local or remote)", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub mode: ServerMode,
    #[serde(default = "default_local_url")]
    pub local_url: String,
    #[serde(default)]
    pub remote_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            mode: ServerMode::default(),
            local_url: default_local_url(),
            remote_url: String::new(),
        }
    }
}

fn default_local_url() -> String {
    DEFAULT_LOCAL_URL.to_string()
}

fn default_upload_grace_ms() -> u64 {
    DEFAULT_UPLOAD_GRACE_MS
}

fn default_notice_secs() -> u64 {
    DEFAULT_NOTICE_SECS
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context("Failed to read config file")?;

        let config: Config = serde_json::from_str(&content)
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Defaults overridden by `DRIVE_*` environment variables. Unset variables
    /// keep their defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(mode) = std::env::var("DRIVE_SERVER_MODE") {
            config.server.mode = mode.parse()
                .context("DRIVE_SERVER_MODE is invalid")?;
        }
        if let Ok(url) = std::env::var("DRIVE_LOCAL_URL") {
            config.server.local_url = url;
        }
        if let Ok(url) = std::env::var("DRIVE_REMOTE_URL") {
            config.server.remote_url = url;
        }
        if let Ok(username) = std::env::var("DRIVE_USERNAME") {
            config.username = Some(username);
        }

        Ok(config)
    }

    /// Loads the file at `path`, else the per-user default file if present,
    /// else the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        match Self::default_path() {
            Some(default) if default.is_file() => Self::from_file(&default),
            _ => Self::from_env(),
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("rust-drive").join("config.json"))
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .context("Failed to serialize config")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        fs::write(path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Base URL for the selected server mode, always ending in `/`.
    pub fn base_url(&self) -> Result<Url> {
        let raw = match self.server.mode {
            ServerMode::Local => &self.server.local_url,
            ServerMode::Remote => &self.server.remote_url,
        };
        if raw.trim().is_empty() {
            return Err(anyhow!("No URL configured for {} server mode", self.server.mode));
        }

        let mut url = Url::parse(raw.trim())
            .with_context(|| format!("Invalid {} server URL: {}", self.server.mode, raw))?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    pub fn upload_grace(&self) -> Duration {
        Duration::from_millis(self.upload_grace_ms)
    }

    pub fn notice_lifetime(&self) -> Duration {
        Duration::from_secs(self.notice_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"username": "alice"}"#).unwrap();
        assert_eq!(config.username.as_deref(), Some("alice"));
        assert_eq!(config.server.mode, ServerMode::Local);
        assert_eq!(config.upload_grace(), Duration::from_secs(1));
        assert_eq!(config.base_url().unwrap().as_str(), "http://localhost:3001/");
    }

    #[test]
    fn test_remote_mode_needs_url() {
        let mut config = Config::default();
        config.server.mode = ServerMode::Remote;
        assert!(config.base_url().is_err());

        config.server.remote_url = "https://drive.example.com/api".to_string();
        assert_eq!(
            config.base_url().unwrap().as_str(),
            "https://drive.example.com/api/"
        );
    }

    #[test]
    fn test_server_mode_parse() {
        assert_eq!("Remote".parse::<ServerMode>().unwrap(), ServerMode::Remote);
        assert!("lila".parse::<ServerMode>().is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let path = std::env::temp_dir()
            .join(format!("rust-drive-config-{}", std::process::id()))
            .join("config.json");
        let mut config = Config::default();
        config.username = Some("bob".to_string());
        config.server.mode = ServerMode::Remote;
        config.server.remote_url = "https://example.com/".to_string();

        config.save_to_file(&path).unwrap();
        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.username.as_deref(), Some("bob"));
        assert_eq!(loaded.server.mode, ServerMode::Remote);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
