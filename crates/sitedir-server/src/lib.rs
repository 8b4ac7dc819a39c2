//! Configuration and wiring for the `sitedir` server binary.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use sitedir_core::service::{EngineConfig, NotificationConfig, RetryPolicy};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `SITEDIR_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:          String,
  pub port:          u16,
  pub store_path:    PathBuf,
  pub retry:         RetryPolicy,
  pub notifications: NotificationConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:          "127.0.0.1".to_string(),
      port:          8080,
      store_path:    PathBuf::from("~/.local/share/sitedir/sitedir.db"),
      retry:         RetryPolicy::default(),
      notifications: NotificationConfig::default(),
    }
  }
}

impl ServerConfig {
  /// Layer the optional TOML file at `path` under the environment.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("SITEDIR").separator("__"))
      .build()?
      .try_deserialize()
  }

  pub fn engine_config(&self) -> EngineConfig {
    EngineConfig { retry: self.retry, notifications: self.notifications }
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use std::io::Write as _;

  use super::*;

  #[test]
  fn missing_file_yields_defaults() {
    let cfg = ServerConfig::load(Path::new("/nonexistent/sitedir.toml")).unwrap();
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.retry, RetryPolicy::default());
    assert!(cfg.notifications.background);
  }

  #[test]
  fn file_overrides_nested_sections() {
    let path = std::env::temp_dir().join(format!("sitedir-{}.toml", std::process::id()));
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
      file,
      "port = 9000\n\n[retry]\nmax_attempts = 5\n\n[notifications]\nbackground = false"
    )
    .unwrap();

    let cfg = ServerConfig::load(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.retry.max_attempts, 5);
    assert_eq!(cfg.retry.base_delay_ms, RetryPolicy::default().base_delay_ms);
    assert!(!cfg.engine_config().notifications.background);
  }

  #[test]
  fn tilde_expands_against_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(
      expand_tilde(Path::new("~/x.db")),
      PathBuf::from(home).join("x.db")
    );
    assert_eq!(expand_tilde(Path::new("/abs.db")), PathBuf::from("/abs.db"));
  }
}
