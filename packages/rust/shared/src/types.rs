//! Core domain types for the machine config server.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Well-known node paths
// ---------------------------------------------------------------------------

/// Where the node daemon reads its first-boot annotations from.
pub const NODE_ANNOTATIONS_PATH: &str = "/etc/machine-config-daemon/node-annotations.json";

/// Marker read by `pivot.service` to switch OS images early.
pub const PIVOT_MARKER_PATH: &str = "/etc/pivot/image-pullspec";

/// Audit copy of the machine config that produced the document.
pub const ENCAPSULATED_CONFIG_PATH: &str = "/etc/ignition-machine-config-encapsulated.json";

/// Serving kubeconfig used by the node after boot.
pub const KUBECONFIG_PATH: &str = "/etc/kubernetes/kubeconfig";

// ---------------------------------------------------------------------------
// Node annotations
// ---------------------------------------------------------------------------

pub const CURRENT_CONFIG_ANNOTATION: &str = "machineconfiguration.openshift.io/currentConfig";
pub const DESIRED_CONFIG_ANNOTATION: &str = "machineconfiguration.openshift.io/desiredConfig";
pub const DAEMON_STATE_ANNOTATION: &str = "machineconfiguration.openshift.io/state";

/// Daemon state reported by a node that booted straight into its config.
pub const DAEMON_STATE_DONE: &str = "Done";

// ---------------------------------------------------------------------------
// MachineConfig
// ---------------------------------------------------------------------------

/// Declarative machine configuration, as stored by the control plane.
///
/// Only the fields the pipeline reads are typed; everything else rides
/// along in the flattened `extra` maps so the encapsulated copy is faithful.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: MachineConfigSpec,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Subset of Kubernetes object metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `spec` of a [`MachineConfig`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineConfigSpec {
    /// Target OS image; empty means "do not pivot".
    #[serde(rename = "osImageURL", default)]
    pub os_image_url: String,
    /// The object's own Ignition config, embedded as JSON.
    #[serde(default)]
    pub config: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Requests and documents
// ---------------------------------------------------------------------------

/// Identifies which machine config pool is asking for a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolRequest {
    pub machine_pool: String,
}

impl PoolRequest {
    pub fn new(machine_pool: impl Into<String>) -> Self {
        Self {
            machine_pool: machine_pool.into(),
        }
    }
}

impl std::fmt::Display for PoolRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.machine_pool)
    }
}

/// Raw, encoded provisioning document bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningDocument(Vec<u8>);

impl ProvisioningDocument {
    pub fn new(raw: Vec<u8>) -> Self {
        Self(raw)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for ProvisioningDocument {
    fn from(raw: Vec<u8>) -> Self {
        Self(raw)
    }
}

/// Output of the kubeconfig collaborator.
#[derive(Debug, Clone, Default)]
pub struct KubeconfigData {
    /// Serving kubeconfig embedded into the document.
    pub kubeconfig: Vec<u8>,
    /// Root CA bundle. Distributed through another channel; not embedded.
    pub root_ca: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_request_displays_pool() {
        let req = PoolRequest::new("worker");
        assert_eq!(req.machine_pool, "worker");
        assert_eq!(req.to_string(), "worker");
    }

    #[test]
    fn machine_config_keeps_unknown_fields() {
        let json = r#"{
            "apiVersion": "machineconfiguration.openshift.io/v1",
            "kind": "MachineConfig",
            "metadata": {"name": "rendered-worker-abc", "uid": "1234"},
            "spec": {
                "osImageURL": "registry.example/os:v1",
                "config": {"ignition": {"version": "2.2.0"}},
                "kernelArguments": ["nosmt"]
            },
            "status": {}
        }"#;
        let mc: MachineConfig = serde_json::from_str(json).expect("deserialize");
        assert_eq!(mc.metadata.name, "rendered-worker-abc");
        assert_eq!(mc.spec.os_image_url, "registry.example/os:v1");
        assert_eq!(mc.metadata.extra["uid"], "1234");
        assert!(mc.spec.extra.contains_key("kernelArguments"));
        assert!(mc.extra.contains_key("status"));

        let out = serde_json::to_value(&mc).expect("serialize");
        assert_eq!(out["spec"]["osImageURL"], "registry.example/os:v1");
        assert_eq!(out["spec"]["kernelArguments"][0], "nosmt");
        assert_eq!(out["metadata"]["uid"], "1234");
    }

    #[test]
    fn missing_spec_fields_default() {
        let mc: MachineConfig =
            serde_json::from_str(r#"{"metadata": {"name": "m"}}"#).expect("deserialize");
        assert!(mc.spec.os_image_url.is_empty());
        assert!(mc.spec.config.is_null());
    }
}
