//! Shared types, error model, and configuration for the machine config server.
//!
//! This crate is the foundation depended on by all other workspace crates.
//! It provides:
//! - [`MachineConfigServerError`]: the unified error type
//! - Domain types ([`MachineConfig`], [`PoolRequest`], [`ProvisioningDocument`])
//!   and the well-known node paths
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DEFAULT_METRICS_BIND_ADDRESS, DEFAULT_SERVER_BIND_ADDRESS, KubeconfigConfig,
    MetricsConfig, ServerConfig, config_dir, config_file_path, init_config, load_config,
    load_config_from,
};
pub use error::{MachineConfigServerError, Result};
pub use types::{
    CURRENT_CONFIG_ANNOTATION, DAEMON_STATE_ANNOTATION, DAEMON_STATE_DONE,
    DESIRED_CONFIG_ANNOTATION, ENCAPSULATED_CONFIG_PATH, KUBECONFIG_PATH, KubeconfigData,
    MachineConfig, MachineConfigSpec, NODE_ANNOTATIONS_PATH, ObjectMeta, PIVOT_MARKER_PATH,
    PoolRequest, ProvisioningDocument,
};
