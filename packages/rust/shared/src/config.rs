//! Application configuration for the machine config server.
//!
//! User config lives at `~/.mcserver/mcserver.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MachineConfigServerError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "mcserver.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".mcserver";

/// Bind address for the metrics listener when none is configured.
pub const DEFAULT_METRICS_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Bind address for the config endpoint when none is configured.
pub const DEFAULT_SERVER_BIND_ADDRESS: &str = "0.0.0.0:22623";

// ---------------------------------------------------------------------------
// Config structs (matching mcserver.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Config endpoint settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Where the serving kubeconfig comes from.
    #[serde(default)]
    pub kubeconfig: KubeconfigConfig,

    /// Metrics listener settings.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the config endpoint listens on.
    #[serde(default = "default_server_bind_address")]
    pub bind_address: String,

    /// Directory holding one `<pool>.json` MachineConfig per pool.
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_server_bind_address(),
            config_dir: default_config_dir(),
        }
    }
}

fn default_server_bind_address() -> String {
    DEFAULT_SERVER_BIND_ADDRESS.into()
}
fn default_config_dir() -> PathBuf {
    PathBuf::from("/etc/mcs/machine-configs")
}

/// `[kubeconfig]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubeconfigConfig {
    /// Serving kubeconfig handed to new nodes.
    #[serde(default = "default_kubeconfig_path")]
    pub path: PathBuf,

    /// Root CA bundle for the control plane.
    #[serde(default = "default_root_ca_path")]
    pub root_ca_path: PathBuf,
}

impl Default for KubeconfigConfig {
    fn default() -> Self {
        Self {
            path: default_kubeconfig_path(),
            root_ca_path: default_root_ca_path(),
        }
    }
}

fn default_kubeconfig_path() -> PathBuf {
    PathBuf::from("/etc/mcs/kubeconfig")
}
fn default_root_ca_path() -> PathBuf {
    PathBuf::from("/etc/mcs/ca.crt")
}

/// `[metrics]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Address the `/metrics` listener binds to. Empty means the default.
    #[serde(default = "default_metrics_bind_address")]
    pub bind_address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            bind_address: default_metrics_bind_address(),
        }
    }
}

impl MetricsConfig {
    /// The bind address to use, falling back to the default when unset.
    pub fn resolved_bind_address(&self) -> &str {
        if self.bind_address.trim().is_empty() {
            DEFAULT_METRICS_BIND_ADDRESS
        } else {
            &self.bind_address
        }
    }
}

fn default_metrics_bind_address() -> String {
    DEFAULT_METRICS_BIND_ADDRESS.into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.mcserver/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| MachineConfigServerError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.mcserver/mcserver.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content =
        std::fs::read_to_string(path).map_err(|e| MachineConfigServerError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        MachineConfigServerError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| MachineConfigServerError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content = toml::to_string_pretty(&config)
        .map_err(|e| MachineConfigServerError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| MachineConfigServerError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("config_dir"));
        assert!(toml_str.contains(DEFAULT_METRICS_BIND_ADDRESS));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.server.bind_address, DEFAULT_SERVER_BIND_ADDRESS);
        assert_eq!(parsed.kubeconfig.path, PathBuf::from("/etc/mcs/kubeconfig"));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[server]
config_dir = "/tmp/pools"

[metrics]
bind_address = "127.0.0.1:9100"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.server.config_dir, PathBuf::from("/tmp/pools"));
        assert_eq!(config.server.bind_address, DEFAULT_SERVER_BIND_ADDRESS);
        assert_eq!(config.metrics.resolved_bind_address(), "127.0.0.1:9100");
    }

    #[test]
    fn empty_metrics_address_uses_default() {
        let config: AppConfig =
            toml::from_str("[metrics]\nbind_address = \"\"\n").expect("parse");
        assert_eq!(
            config.metrics.resolved_bind_address(),
            DEFAULT_METRICS_BIND_ADDRESS
        );
    }

    #[test]
    fn unreadable_config_is_io_error() {
        let err = load_config_from(Path::new("/nonexistent/mcserver.toml")).unwrap_err();
        assert!(matches!(err, MachineConfigServerError::Io { .. }));
    }
}
