use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub session: SessionConfig,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Backend root, e.g. https://erp.example.com/api
  pub base_url: String,
  /// Keep a cookie store on the HTTP client
  #[serde(default = "default_true")]
  pub with_credentials: bool,
  /// Per-request timeout in seconds, 0 disables it
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
  #[serde(default = "default_ttl_hours")]
  pub ttl_hours: u64,
}

impl Default for SessionConfig {
  fn default() -> Self {
    Self {
      ttl_hours: default_ttl_hours(),
    }
  }
}

impl SessionConfig {
  pub fn ttl(&self) -> Duration {
    Duration::from_secs(self.ttl_hours.saturating_mul(3600))
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// When false nothing is written to disk
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// SQLite file (defaults to the platform data dir)
  pub path: Option<PathBuf>,
  /// How long a settled query counts as fresh
  #[serde(default = "default_stale_secs")]
  pub stale_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      path: None,
      stale_secs: default_stale_secs(),
    }
  }
}

impl CacheConfig {
  pub fn stale_time(&self) -> Duration {
    Duration::from_secs(self.stale_secs)
  }
}

fn default_true() -> bool {
  true
}

fn default_timeout_secs() -> u64 {
  30
}

fn default_ttl_hours() -> u64 {
  24
}

fn default_stale_secs() -> u64 {
  300
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./sitedash.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/sitedash/config.yaml
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
        "No configuration file found. Create one at ~/.config/sitedash/config.yaml \
         with at least `api: {{ base_url: ... }}`."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("sitedash.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("sitedash").join("config.yaml");
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

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  /// Get the account password from the environment.
  ///
  /// Checks SITEDASH_PASSWORD.
  pub fn get_password() -> Result<String> {
    std::env::var("SITEDASH_PASSWORD")
      .map_err(|_| eyre!("Password not given. Pass --password or set SITEDASH_PASSWORD."))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_config_gets_defaults() {
    let config = Config::parse("api:\n  base_url: https://erp.example.com/api\n").unwrap();

    assert_eq!(config.api.base_url, "https://erp.example.com/api");
    assert!(config.api.with_credentials);
    assert_eq!(config.api.timeout_secs, 30);
    assert_eq!(config.session.ttl(), Duration::from_secs(24 * 3600));
    assert!(config.cache.enabled);
    assert!(config.cache.path.is_none());
    assert_eq!(config.cache.stale_time(), Duration::from_secs(300));
  }

  #[test]
  fn test_full_config() {
    let yaml = r#"
api:
  base_url: http://localhost:5000/api
  with_credentials: false
  timeout_secs: 0
session:
  ttl_hours: 8
cache:
  enabled: false
  path: /tmp/sitedash.db
  stale_secs: 10
"#;
    let config = Config::parse(yaml).unwrap();

    assert!(!config.api.with_credentials);
    assert_eq!(config.api.timeout_secs, 0);
    assert_eq!(config.session.ttl_hours, 8);
    assert!(!config.cache.enabled);
    assert_eq!(config.cache.path, Some(PathBuf::from("/tmp/sitedash.db")));
    assert_eq!(config.cache.stale_secs, 10);
  }

  #[test]
  fn test_huge_ttl_saturates() {
    let yaml = format!(
      "api:\n  base_url: http://localhost/api\nsession:\n  ttl_hours: {}\n",
      u64::MAX
    );
    let config = Config::parse(&yaml).unwrap();
    assert_eq!(config.session.ttl(), Duration::from_secs(u64::MAX));
  }

  #[test]
  fn test_missing_base_url_is_an_error() {
    assert!(Config::parse("session:\n  ttl_hours: 1\n").is_err());
  }

  #[test]
  fn test_missing_explicit_path() {
    let err = Config::load(Some(Path::new("/nonexistent/sitedash.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }
}
