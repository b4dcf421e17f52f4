use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cart::DEFAULT_CHECKOUT_DELAY;
use crate::debounce::DEFAULT_DEBOUNCE;

pub const DEFAULT_API_URL: &str = "https://itx-frontend-test.onrender.com";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub storage: StorageConfig,
  #[serde(default)]
  pub search: SearchConfig,
  #[serde(default)]
  pub checkout: CheckoutConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  #[serde(default = "default_api_url")]
  pub base_url: String,
  /// Per-request timeout
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: default_api_url(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

fn default_api_url() -> String {
  DEFAULT_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
  15
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
  /// Database file; defaults to $XDG_DATA_HOME/mobile-store/store.db
  pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
  #[serde(default = "default_debounce_ms")]
  pub debounce_ms: u64,
}

impl Default for SearchConfig {
  fn default() -> Self {
    Self {
      debounce_ms: default_debounce_ms(),
    }
  }
}

impl SearchConfig {
  pub fn debounce(&self) -> Duration {
    Duration::from_millis(self.debounce_ms)
  }
}

fn default_debounce_ms() -> u64 {
  DEFAULT_DEBOUNCE.as_millis() as u64
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutConfig {
  #[serde(default = "default_redirect_delay_ms")]
  pub redirect_delay_ms: u64,
}

impl Default for CheckoutConfig {
  fn default() -> Self {
    Self {
      redirect_delay_ms: default_redirect_delay_ms(),
    }
  }
}

impl CheckoutConfig {
  pub fn redirect_delay(&self) -> Duration {
    Duration::from_millis(self.redirect_delay_ms)
  }
}

fn default_redirect_delay_ms() -> u64 {
  DEFAULT_CHECKOUT_DELAY.as_millis() as u64
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./mobile-store.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/mobile-store/config.yaml
  ///
  /// Without a file the defaults apply. `MOBILE_STORE_API_URL` overrides the
  /// API base URL either way.
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

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Self::default(),
    };

    if let Some(url) = Self::api_url_from_env() {
      config.api.base_url = url;
    }

    config.validate()?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("mobile-store.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("mobile-store").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    // An empty file deserializes to unit, not to an empty mapping
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents)
  }

  /// Get the API base URL override from the environment.
  ///
  /// Checks MOBILE_STORE_API_URL.
  fn api_url_from_env() -> Option<String> {
    std::env::var("MOBILE_STORE_API_URL")
      .ok()
      .filter(|v| !v.trim().is_empty())
  }

  /// Check values that would only fail later, deep inside a request.
  pub fn validate(&self) -> Result<()> {
    url::Url::parse(&self.api.base_url)
      .map_err(|e| eyre!("Invalid api.base_url {}: {}", self.api.base_url, e))?;
    if self.api.timeout_secs == 0 {
      return Err(eyre!("api.timeout_secs must be greater than zero"));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.api.base_url, DEFAULT_API_URL);
    assert_eq!(config.search.debounce(), Duration::from_millis(300));
    assert_eq!(config.checkout.redirect_delay(), Duration::from_millis(2500));
    assert!(config.storage.path.is_none());
    assert!(config.validate().is_ok());
  }

  #[test]
  fn test_partial_file_keeps_defaults() {
    let config = Config::parse("api:\n  base_url: http://localhost:3000\n").unwrap();
    assert_eq!(config.api.base_url, "http://localhost:3000");
    assert_eq!(config.api.timeout_secs, 15);
    assert_eq!(config.search.debounce_ms, 300);
  }

  #[test]
  fn test_empty_file_is_default() {
    let config = Config::parse("   \n").unwrap();
    assert_eq!(config.api.base_url, DEFAULT_API_URL);
  }

  #[test]
  fn test_full_file() {
    let config = Config::parse(
      r#"
api:
  base_url: https://store.example.com
  timeout_secs: 3
storage:
  path: /tmp/store.db
search:
  debounce_ms: 150
checkout:
  redirect_delay_ms: 10
"#,
    )
    .unwrap();
    assert_eq!(config.api.timeout_secs, 3);
    assert_eq!(config.storage.path, Some(PathBuf::from("/tmp/store.db")));
    assert_eq!(config.search.debounce(), Duration::from_millis(150));
    assert_eq!(config.checkout.redirect_delay(), Duration::from_millis(10));
  }

  #[test]
  fn test_invalid_url_fails_validation() {
    let mut config = Config::default();
    config.api.base_url = "::nope::".to_string();
    assert!(config.validate().is_err());
  }

  #[test]
  fn test_zero_timeout_fails_validation() {
    let mut config = Config::default();
    config.api.timeout_secs = 0;
    assert!(config.validate().is_err());
  }

  #[test]
  fn test_missing_explicit_path_is_error() {
    let result = Config::load(Some(Path::new("/definitely/not/here.yaml")));
    assert!(result.is_err());
  }

  #[test]
  fn test_load_explicit_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "checkout:\n  redirect_delay_ms: 0\n").unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.checkout.redirect_delay_ms, 0);
  }
}
