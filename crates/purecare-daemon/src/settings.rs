//! Daemon configuration.
//!
//! Read from an optional TOML file, then overridden by `PURECARE_*`
//! environment variables (`__` separates nested keys). A lifespan override
//! needs both of its keys:
//!
//! ```text
//! PURECARE_LIFESPANS__FILTER1__VALUE=3
//! PURECARE_LIFESPANS__FILTER1__UNIT=month
//! ```

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Context as _;
use purecare_core::catalog::LifespanCatalog;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
  pub host:                String,
  pub port:                u16,
  pub store_path:          PathBuf,
  pub sweep_interval_secs: u64,
  pub send_timeout_ms:     u64,
  pub queue_capacity:      usize,
  /// Lifespans given to newly added purifiers.
  pub lifespans:           LifespanCatalog,
}

impl Default for DaemonConfig {
  fn default() -> Self {
    Self {
      host:                "127.0.0.1".to_string(),
      port:                8080,
      store_path:          PathBuf::from("~/.local/share/purecare/purecare.db"),
      sweep_interval_secs: 3600,
      send_timeout_ms:     2000,
      queue_capacity:      256,
      lifespans:           LifespanCatalog::default(),
    }
  }
}

impl DaemonConfig {
  pub fn load(path: &Path) -> anyhow::Result<Self> { Self::load_with_env(path, None) }

  /// Like [`DaemonConfig::load`], reading variables from `vars` instead of the
  /// process environment when given.
  fn load_with_env(path: &Path, vars: Option<config::Map<String, String>>) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("PURECARE")
          .prefix_separator("_")
          .separator("__")
          .source(vars),
      )
      .build()
      .context("failed to read config file")?;

    let cfg: Self = settings
      .try_deserialize()
      .context("failed to deserialise DaemonConfig")?;
    anyhow::ensure!(cfg.sweep_interval_secs > 0, "sweep_interval_secs must be positive");
    Ok(cfg)
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn sweep_interval(&self) -> Duration { Duration::from_secs(self.sweep_interval_secs) }

  pub fn send_timeout(&self) -> Duration { Duration::from_millis(self.send_timeout_ms) }

  /// `store_path` with a leading `~` expanded.
  pub fn store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
