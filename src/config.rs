use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ui::window::WindowConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  /// Base URL of the dashboard backend (e.g. "https://api.example.com")
  pub backend_url: String,
  /// Custom title for header (defaults to backend host if not set)
  pub title: Option<String>,
  #[serde(default = "default_request_timeout_secs")]
  pub request_timeout_secs: u64,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub repositories: RepositoriesConfig,
  #[serde(default = "WindowConfig::terminal")]
  pub window: WindowConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Default time-to-live for every resource family
  #[serde(default = "default_ttl_secs")]
  pub ttl_secs: u64,
  /// Per resource family TTLs (e.g. "ai-comment-stats: 60")
  #[serde(default)]
  pub ttl_overrides: HashMap<String, u64>,
  /// Entries kept per resource family; 0 means unbounded
  #[serde(default = "default_max_entries")]
  pub max_entries: usize,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      ttl_secs: default_ttl_secs(),
      ttl_overrides: HashMap::new(),
      max_entries: default_max_entries(),
    }
  }
}

impl CacheConfig {
  /// TTL for a resource family.
  pub fn ttl_for(&self, resource: &str) -> Duration {
    let secs = self
      .ttl_overrides
      .get(resource)
      .copied()
      .unwrap_or(self.ttl_secs);
    Duration::from_secs(secs)
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoriesConfig {
  #[serde(default = "default_filter")]
  pub default_filter: String,
  #[serde(default = "default_page_size")]
  pub page_size: u32,
  /// Server-side sort field passed to the list endpoint
  #[serde(default = "default_sort")]
  pub sort: String,
  #[serde(default = "default_direction")]
  pub direction: String,
}

impl Default for RepositoriesConfig {
  fn default() -> Self {
    Self {
      default_filter: default_filter(),
      page_size: default_page_size(),
      sort: default_sort(),
      direction: default_direction(),
    }
  }
}

fn default_request_timeout_secs() -> u64 {
  10
}

fn default_ttl_secs() -> u64 {
  300
}

fn default_max_entries() -> usize {
  256
}

fn default_filter() -> String {
  "all".to_string()
}

fn default_page_size() -> u32 {
  15
}

fn default_sort() -> String {
  "updated".to_string()
}

fn default_direction() -> String {
  "desc".to_string()
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./ghdash.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/ghdash/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/ghdash/config.yaml\n\
                 with at least `backend_url: https://...`."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("ghdash.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("ghdash").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub(crate) fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;

    url::Url::parse(&config.backend_url)
      .map_err(|e| eyre!("Invalid backend_url '{}': {}", config.backend_url, e))?;
    if config.repositories.page_size == 0 {
      return Err(eyre!("repositories.page_size must be at least 1"));
    }

    Ok(config)
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.request_timeout_secs)
  }

  /// Get the backend bearer token from environment variables.
  ///
  /// Checks GHDASH_TOKEN first, then GHDASH_USER_TOKEN as fallback.
  pub fn get_user_token() -> Option<String> {
    std::env::var("GHDASH_TOKEN")
      .or_else(|_| std::env::var("GHDASH_USER_TOKEN"))
      .ok()
      .filter(|t| !t.trim().is_empty())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config = Config::parse("backend_url: https://api.example.com\n").unwrap();
    assert_eq!(config.cache.ttl_secs, 300);
    assert_eq!(config.cache.max_entries, 256);
    assert_eq!(config.repositories.page_size, 15);
    assert_eq!(config.repositories.default_filter, "all");
    assert_eq!(config.request_timeout(), Duration::from_secs(10));
    assert_eq!(config.window.threshold, 50);
  }

  #[test]
  fn test_ttl_overrides() {
    let yaml = r#"
backend_url: https://api.example.com
cache:
  ttl_secs: 120
  ttl_overrides:
    ai-comment-stats: 30
"#;
    let config = Config::parse(yaml).unwrap();
    assert_eq!(config.cache.ttl_for("repositories"), Duration::from_secs(120));
    assert_eq!(config.cache.ttl_for("ai-comment-stats"), Duration::from_secs(30));
  }

  #[test]
  fn test_invalid_backend_url_is_rejected() {
    assert!(Config::parse("backend_url: not a url\n").is_err());
  }

  #[test]
  fn test_zero_page_size_is_rejected() {
    let yaml = "backend_url: https://api.example.com\nrepositories:\n  page_size: 0\n";
    assert!(Config::parse(yaml).is_err());
  }

  #[test]
  fn test_load_from_explicit_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "backend_url: http://localhost:3000").unwrap();
    writeln!(file, "title: Local").unwrap();
    let config = Config::load(Some(file.path())).unwrap();
    assert_eq!(config.title.as_deref(), Some("Local"));
  }

  #[test]
  fn test_missing_explicit_path_errors() {
    let err = Config::load(Some(Path::new("/definitely/not/here.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }
}
