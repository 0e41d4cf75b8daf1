//! Client configuration: an optional TOML file layered with `CREW_*`
//! environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;

const DEFAULT_STORE_PATH: &str = "~/.local/share/crew/crew.db";

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
  /// SQLite database file. A leading `~` is expanded.
  pub store_path: PathBuf,
  /// Principal to sign in as when `--as` is not given.
  #[serde(default)]
  pub user:       Option<String>,
}

impl ClientConfig {
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .set_default("store_path", DEFAULT_STORE_PATH)
      .context("setting config defaults")?
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("CREW"))
      .build()
      .context("failed to read config file")?;

    let mut cfg: ClientConfig = settings
      .try_deserialize()
      .context("failed to deserialise ClientConfig")?;
    cfg.store_path = expand_tilde(&cfg.store_path);
    Ok(cfg)
  }
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

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn absolute_paths_are_untouched() {
    assert_eq!(expand_tilde(Path::new("/tmp/crew.db")), PathBuf::from("/tmp/crew.db"));
  }

  #[test]
  fn missing_file_falls_back_to_defaults() {
    let cfg = ClientConfig::load(Path::new("/nonexistent/crew.toml")).unwrap();
    assert!(cfg.store_path.ends_with("crew/crew.db"));
  }
}
