// src/config/monitor.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::feeds::FeedSettings;
use crate::model::{Environment, MetricConfig};

pub const ENV_CONFIG_PATH: &str = "PUBLISH_MONITOR_CONFIG";

fn default_probe_timeout() -> u64 {
    10
}
fn default_connect_timeout() -> u64 {
    4
}
fn default_reconnect_delay_ms() -> u64 {
    1_000
}
fn default_push_idle_timeout_ms() -> u64 {
    60_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_reconnect_delay_ms")]
    pub push_reconnect_delay_ms: u64,
    #[serde(default = "default_push_idle_timeout_ms")]
    pub push_idle_timeout_ms: u64,
    pub environments: Vec<Environment>,
    pub metrics: Vec<MetricConfig>,
}

impl AppConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn feed_settings(&self) -> FeedSettings {
        FeedSettings {
            request_timeout: self.probe_timeout(),
            connect_timeout: self.connect_timeout(),
            reconnect_delay: Duration::from_millis(self.push_reconnect_delay_ms),
            push_idle_timeout: Duration::from_millis(self.push_idle_timeout_ms),
        }
    }

    /// Load from an explicit path; TOML or JSON by extension.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading monitor config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        Self::parse(&content, &ext)
    }

    /// Load using env var + fallbacks:
    /// 1) $PUBLISH_MONITOR_CONFIG
    /// 2) config/monitor.toml
    /// 3) config/monitor.json
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                bail!("{ENV_CONFIG_PATH} points to non-existent path");
            }
            return Self::load_from(&pb);
        }
        for candidate in ["config/monitor.toml", "config/monitor.json"] {
            let pb = PathBuf::from(candidate);
            if pb.exists() {
                return Self::load_from(&pb);
            }
        }
        Err(anyhow!("no monitor config found (set {ENV_CONFIG_PATH})"))
    }

    pub fn parse(s: &str, hint_ext: &str) -> Result<Self> {
        let mut cfg: AppConfig = if hint_ext == "json" {
            serde_json::from_str(s).context("parsing monitor config json")?
        } else {
            toml::from_str(s).context("parsing monitor config toml")?
        };
        cfg.normalize()?;
        Ok(cfg)
    }

    fn normalize(&mut self) -> Result<()> {
        if self.environments.is_empty() {
            bail!("monitor config needs at least one environment");
        }

        let mut names = HashSet::new();
        for env in &mut self.environments {
            env.name = env.name.trim().to_string();
            env.read_url = env.read_url.trim().to_string();
            env.s3_url = env.s3_url.take().map(|u| u.trim().to_string());
            if !names.insert(env.name.clone()) {
                bail!("duplicate environment `{}`", env.name);
            }
            // "ENV" means: read from PUBLISH_MONITOR_<NAME>_PASSWORD
            if env
                .password
                .as_deref()
                .is_some_and(|p| p.trim().eq_ignore_ascii_case("env"))
            {
                let var = password_var(&env.name);
                env.password =
                    Some(std::env::var(&var).map_err(|_| anyhow!("Missing {var} env var"))?);
            }
        }

        let mut aliases = HashSet::new();
        for m in &mut self.metrics {
            m.alias = m.alias.trim().to_string();
            m.endpoint = m.endpoint.trim().to_string();
            if !aliases.insert(m.alias.clone()) {
                bail!("duplicate metric alias `{}`", m.alias);
            }
        }
        Ok(())
    }
}

fn password_var(environment: &str) -> String {
    let upper: String = environment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("PUBLISH_MONITOR_{upper}_PASSWORD")
}
