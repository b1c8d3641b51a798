//! Application configuration.
//!
//! Loaded from `streamgate/config.toml` under the platform config directory
//! unless an explicit path is given; missing files fall back to defaults so
//! the tool works with zero setup.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub proxy: ProxyConfig,
    pub resolver: ResolverConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        let defaults = hls_proxy::ProxyServerConfig::default();
        Self {
            bind_address: defaults.bind_address,
            port: defaults.port,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Referer override per source name (lowercase).
    pub referers: FxHashMap<String, String>,
    /// Cookie string per source name (lowercase), for sites that gate
    /// streams behind a session.
    pub cookies: FxHashMap<String, String>,
}

impl AppConfig {
    pub fn load(path: Option<&str>) -> Result<Self> {
        let path = Self::resolve_path(path)?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config at {}", path.display()))
    }

    pub fn reset(path: Option<&str>) -> Result<()> {
        let path = Self::resolve_path(path)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, toml::to_string_pretty(&Self::default())?)
            .with_context(|| format!("failed to write config at {}", path.display()))
    }

    pub fn show(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn resolve_path(path: Option<&str>) -> Result<PathBuf> {
        if let Some(path) = path {
            return Ok(Path::new(path).to_path_buf());
        }
        let dir = dirs::config_dir().context("no config directory on this platform")?;
        Ok(dir.join("streamgate").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_toml() {
        let config = AppConfig::default();
        let raw = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&raw).unwrap();
        assert_eq!(parsed.proxy.port, config.proxy.port);
        assert_eq!(parsed.proxy.bind_address, config.proxy.bind_address);
    }

    #[test]
    fn partial_files_fill_in_defaults() {
        let parsed: AppConfig = toml::from_str("[proxy]\nport = 9000\n").unwrap();
        assert_eq!(parsed.proxy.port, 9000);
        assert_eq!(
            parsed.proxy.bind_address,
            ProxyConfig::default().bind_address
        );
        assert!(parsed.resolver.cookies.is_empty());
    }

    #[test]
    fn per_source_cookies_parse() {
        let parsed: AppConfig =
            toml::from_str("[resolver.cookies]\nstrimsy = \"session=abc\"\n").unwrap();
        assert_eq!(
            parsed.resolver.cookies.get("strimsy").map(String::as_str),
            Some("session=abc")
        );
    }
}
