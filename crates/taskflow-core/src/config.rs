use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::{
  Context,
  anyhow
};
use serde::{
  Deserialize,
  Serialize
};
use tracing::{
  debug,
  info
};
use url::Url;

use crate::api::rest::{
  ClientOptions,
  DEFAULT_USER_AGENT
};

pub const DEFAULT_API_BASE_URL: &str =
  "http://localhost:8000";
pub const CONFIG_ENV: &str =
  "TASKFLOW_CONFIG";
pub const API_URL_ENV: &str =
  "TASKFLOW_API_URL";

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
#[serde(default)]
pub struct Config {
  pub api_base_url:         String,
  pub credential_path:
    Option<PathBuf>,
  pub request_timeout_secs: u64,
  pub user_agent:           Option<String>,
  pub serialize_per_id:     bool,
  pub color:                bool,
  #[serde(skip)]
  pub loaded_file:
    Option<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    Self {
      api_base_url:         DEFAULT_API_BASE_URL
        .to_string(),
      credential_path:      None,
      request_timeout_secs: 30,
      user_agent:           None,
      serialize_per_id:     false,
      color:                true,
      loaded_file:          None
    }
  }
}

impl Config {
  /// Loads the config file (if any)
  /// and applies environment
  /// overrides.
  #[tracing::instrument(skip(
    override_path
  ))]
  pub fn load(
    override_path: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg =
      match resolve_config_path(
        override_path
      ) {
        | Some(path) => {
          info!(config = %path.display(), "loading config");
          Self::load_file(&path)?
        }
        | None => {
          info!(
            "no config file found; \
             using defaults"
          );
          Self::default()
        }
      };

    cfg.apply_env_with(|key| {
      std::env::var(key).ok()
    });
    Ok(cfg)
  }

  pub fn load_file(
    path: &Path
  ) -> anyhow::Result<Self> {
    let path = expand_tilde(path);
    let raw =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;
    let mut cfg: Self =
      toml::from_str(&raw)
        .with_context(|| {
          format!(
            "failed to parse TOML {}",
            path.display()
          )
        })?;
    cfg.loaded_file = Some(path);
    Ok(cfg)
  }

  pub fn apply_env_with<F>(
    &mut self,
    lookup: F
  ) where
    F: Fn(&str) -> Option<String>
  {
    if let Some(url) =
      lookup(API_URL_ENV)
      && !url.trim().is_empty()
    {
      debug!(url = %url, "api url from environment");
      self.api_base_url =
        url.trim().to_string();
    }
  }

  pub fn apply_overrides(
    &mut self,
    api_url: Option<&str>
  ) {
    if let Some(url) = api_url {
      debug!(url = %url, "api url from command line");
      self.api_base_url =
        url.trim().to_string();
    }
  }

  pub fn api_url(
    &self
  ) -> anyhow::Result<Url> {
    Url::parse(&self.api_base_url)
      .with_context(|| {
        format!(
          "invalid api_base_url: {}",
          self.api_base_url
        )
      })
  }

  pub fn credential_path(
    &self
  ) -> anyhow::Result<PathBuf> {
    match &self.credential_path {
      | Some(path) => {
        Ok(expand_tilde(path))
      }
      | None => {
        default_credential_path()
      }
    }
  }

  pub fn client_options(
    &self
  ) -> ClientOptions {
    ClientOptions {
      user_agent: self
        .user_agent
        .clone()
        .unwrap_or_else(|| {
          DEFAULT_USER_AGENT
            .to_string()
        }),
      timeout:    Duration::from_secs(
        self.request_timeout_secs.max(1)
      )
    }
  }
}

fn resolve_config_path(
  override_path: Option<&Path>
) -> Option<PathBuf> {
  if let Some(path) = override_path {
    return Some(path.to_path_buf());
  }

  if let Ok(env_path) =
    std::env::var(CONFIG_ENV)
  {
    let trimmed = env_path.trim();
    if trimmed == "/dev/null" {
      return None;
    }
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  let candidate = dirs::config_dir()?
    .join("taskflow")
    .join("config.toml");
  candidate
    .exists()
    .then_some(candidate)
}

fn default_credential_path()
-> anyhow::Result<PathBuf> {
  let base = dirs::data_dir()
    .or_else(dirs::home_dir)
    .ok_or_else(|| {
      anyhow!(
        "cannot determine data \
         directory"
      )
    })?;
  Ok(
    base
      .join("taskflow")
      .join("access_token")
  )
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}
