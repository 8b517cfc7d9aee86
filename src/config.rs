//! Daemon configuration: a TOML file mapping filesystem labels to pool
//! descriptors, plus an optional notification transport.
//!
//! The configuration is loaded and validated once at startup; the core only
//! ever sees the resulting immutable [`AppConfig`].

use anyhow::{Context, Result, bail};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// When true, notification bodies include the full backup-engine output.
    #[serde(default)]
    pub send_backup_output: bool,

    /// Optional notification transport; absent means log-only operation.
    #[serde(default)]
    pub notify: Option<NotifyConfig>,

    /// Pool descriptors keyed by filesystem label.
    pub pools: HashMap<String, PoolConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotifyConfig {
    pub webhook_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolConfig {
    /// ZFS pool name passed to zpool/zfs commands.
    pub pool_name: String,

    /// Passphrase fed to `zfs load-key` on stdin. Empty or absent means
    /// the pool is not encrypted and the decrypt stage is skipped.
    #[serde(default)]
    pub passphrase: Option<String>,

    /// Arguments forwarded verbatim to the backup engine.
    pub backup_parameters: Vec<String>,

    /// Split space-containing parameter entries into separate arguments.
    #[serde(default = "default_true")]
    pub split_parameters: bool,
}

fn default_true() -> bool {
    true
}

impl PoolConfig {
    pub fn has_passphrase(&self) -> bool {
        self.passphrase.as_deref().is_some_and(|p| !p.is_empty())
    }
}

/// Load the configuration from a TOML file, with `ZBAKD_`-prefixed
/// environment variables taking precedence over file values.
pub fn load(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        bail!("configuration file not found: {}", path.display());
    }

    let mut config: AppConfig = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("ZBAKD_").split("__"))
        .extract()
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;

    validate(&config)?;

    for pool in config.pools.values_mut() {
        if pool.split_parameters {
            pool.backup_parameters = split_spaced(&pool.backup_parameters);
        }
    }

    Ok(config)
}

fn validate(config: &AppConfig) -> Result<()> {
    if config.pools.is_empty() {
        bail!("configuration must define at least one pool");
    }

    for (label, pool) in &config.pools {
        if label.is_empty() {
            bail!("pool entries must be keyed by a non-empty filesystem label");
        }
        if pool.pool_name.is_empty() {
            bail!("pool '{label}' has an empty pool_name");
        }
    }

    if let Some(notify) = &config.notify {
        if notify.webhook_url.is_empty() {
            bail!("notify.webhook_url must not be empty when [notify] is present");
        }
    }

    Ok(())
}

/// Each entry containing a space becomes multiple arguments; the rest pass
/// through untouched. Matches how operators write a whole flag-plus-value
/// in one config string.
fn split_spaced(params: &[String]) -> Vec<String> {
    params
        .iter()
        .flat_map(|p| {
            if p.contains(' ') {
                p.split(' ').map(str::to_string).collect::<Vec<_>>()
            } else {
                vec![p.clone()]
            }
        })
        .collect()
}

const MASK: &str = "*****";

/// Redacted rendering for the startup log line. Passphrases and the
/// webhook URL never appear in logs.
impl fmt::Display for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut value = serde_json::to_value(self).map_err(|_| fmt::Error)?;

        if let Some(notify) = value.get_mut("notify").and_then(|n| n.as_object_mut()) {
            notify.insert("webhook_url".into(), MASK.into());
        }
        if let Some(pools) = value.get_mut("pools").and_then(|p| p.as_object_mut()) {
            for pool in pools.values_mut() {
                if let Some(obj) = pool.as_object_mut() {
                    if obj.get("passphrase").is_some_and(|p| !p.is_null()) {
                        obj.insert("passphrase".into(), MASK.into());
                    }
                }
            }
        }

        let pretty = serde_json::to_string_pretty(&value).map_err(|_| fmt::Error)?;
        f.write_str(&pretty)
    }
}

impl fmt::Display for PoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut value = serde_json::to_value(self).map_err(|_| fmt::Error)?;
        if let Some(obj) = value.as_object_mut() {
            if obj.get("passphrase").is_some_and(|p| !p.is_null()) {
                obj.insert("passphrase".into(), MASK.into());
            }
        }
        let pretty = serde_json::to_string_pretty(&value).map_err(|_| fmt::Error)?;
        f.write_str(&pretty)
    }
}
