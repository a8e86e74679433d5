//! Runtime server configuration, deserialised from `config.toml` layered with
//! `MASTERY_*` environment variables.

use std::path::{Path, PathBuf};

use mastery_core::{engine::RewardConfig, module::ModuleDefinition};
use serde::Deserialize;

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8080 }

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:       String,
  #[serde(default = "default_port")]
  pub port:       u16,
  pub store_path: PathBuf,
  /// Module catalogue; validated into a `ModuleGraph` at startup.
  #[serde(default)]
  pub modules:    Vec<ModuleDefinition>,
  #[serde(default)]
  pub rewards:    RewardConfig,
}

impl ServerConfig {
  /// Layer the TOML file at `path` (optional) under the environment.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("MASTERY"))
      .build()?
      .try_deserialize()
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
