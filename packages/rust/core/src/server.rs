//! The config server facade: one request in, one provisioning document out.

use sha2::{Digest, Sha256};
use tracing::{info, instrument};

use mcserver_shared::{KubeconfigData, MachineConfig, PoolRequest, ProvisioningDocument, Result};

use crate::appenders;
use crate::assembler;

/// Where machine configs and serving credentials come from.
pub trait ConfigSource: Send + Sync {
    /// Resolve a pool request to the machine config it should boot into.
    fn machine_config(&self, request: &PoolRequest) -> Result<MachineConfig>;

    /// Fetch the serving kubeconfig and root CA for new nodes.
    fn kubeconfig(&self) -> Result<KubeconfigData>;
}

/// Anything that can answer a node's config request.
pub trait Server: Send + Sync {
    fn get_config(&self, request: &PoolRequest) -> Result<ProvisioningDocument>;
}

/// The standard server: assemble, then run the appender pipeline.
///
/// Holds no per-request state, so one instance can serve many nodes at once.
#[derive(Debug, Clone)]
pub struct MachineConfigServer<S> {
    source: S,
}

impl<S: ConfigSource> MachineConfigServer<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: ConfigSource> Server for MachineConfigServer<S> {
    #[instrument(skip_all, fields(pool = %request))]
    fn get_config(&self, request: &PoolRequest) -> Result<ProvisioningDocument> {
        let machine_config = self.source.machine_config(request)?;
        let doc = assembler::assemble(&machine_config)?;

        let kubeconfig = || self.source.kubeconfig();
        let steps = appenders::appenders(
            &machine_config.metadata.name,
            &kubeconfig,
            &machine_config.spec.os_image_url,
        );
        let doc = appenders::run(doc, &steps)?;

        info!(
            config = %machine_config.metadata.name,
            size = doc.len(),
            sha256 = %digest(&doc),
            "serving provisioning document"
        );
        Ok(doc)
    }
}

fn digest(doc: &ProvisioningDocument) -> String {
    let mut hasher = Sha256::new();
    hasher.update(doc.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use mcserver_ignition as ignition;
    use mcserver_shared::{
        CURRENT_CONFIG_ANNOTATION, ENCAPSULATED_CONFIG_PATH, KUBECONFIG_PATH,
        MachineConfigServerError, NODE_ANNOTATIONS_PATH, PIVOT_MARKER_PATH,
    };
    use serde_json::json;

    use crate::appenders::PIVOT_UNIT_NAME;

    struct FakeSource {
        os_image_url: &'static str,
        credentials_ok: bool,
    }

    impl ConfigSource for FakeSource {
        fn machine_config(&self, request: &PoolRequest) -> Result<MachineConfig> {
            if request.machine_pool != "worker" {
                return Err(MachineConfigServerError::ConfigLookup(format!(
                    "unknown pool {request}"
                )));
            }
            Ok(serde_json::from_value(json!({
                "metadata": {"name": "rendered-worker-abc"},
                "spec": {
                    "osImageURL": self.os_image_url,
                    "config": {"ignition": {"version": "2.2.0"}}
                }
            }))
            .unwrap())
        }

        fn kubeconfig(&self) -> Result<KubeconfigData> {
            if self.credentials_ok {
                Ok(KubeconfigData {
                    kubeconfig: b"kubeconfig-bytes".to_vec(),
                    root_ca: b"root-ca-bytes".to_vec(),
                })
            } else {
                Err(MachineConfigServerError::CredentialFetch("forbidden".into()))
            }
        }
    }

    fn server(os_image_url: &'static str, credentials_ok: bool) -> MachineConfigServer<FakeSource> {
        MachineConfigServer::new(FakeSource {
            os_image_url,
            credentials_ok,
        })
    }

    #[test]
    fn serves_full_document() {
        let doc = server("registry.example/os:v2", true)
            .get_config(&PoolRequest::new("worker"))
            .unwrap();
        let config = ignition::decode(doc.as_bytes()).unwrap();

        let paths: Vec<_> = config.storage.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            [
                ENCAPSULATED_CONFIG_PATH,
                NODE_ANNOTATIONS_PATH,
                PIVOT_MARKER_PATH,
                KUBECONFIG_PATH
            ]
        );
        assert_eq!(config.systemd.units.len(), 1);
        assert_eq!(config.systemd.units[0].name, PIVOT_UNIT_NAME);

        let annotations: BTreeMap<String, String> =
            serde_json::from_slice(&config.storage.files[1].data().unwrap()).unwrap();
        assert_eq!(annotations[CURRENT_CONFIG_ANNOTATION], "rendered-worker-abc");

        assert_eq!(config.storage.files[3].data().unwrap(), b"kubeconfig-bytes");
        let raw = String::from_utf8(doc.into_bytes()).unwrap();
        assert!(!raw.contains("root-ca-bytes"));
    }

    #[test]
    fn empty_image_url_skips_pivot() {
        let doc = server("", true)
            .get_config(&PoolRequest::new("worker"))
            .unwrap();
        let config = ignition::decode(doc.as_bytes()).unwrap();

        assert!(config.systemd.units.is_empty());
        assert!(config.storage.files.iter().all(|f| f.path != PIVOT_MARKER_PATH));
        assert_eq!(config.storage.files.len(), 3);
    }

    #[test]
    fn lookup_errors_are_returned_verbatim() {
        let err = server("", true)
            .get_config(&PoolRequest::new("infra"))
            .unwrap_err();
        assert!(matches!(err, MachineConfigServerError::ConfigLookup(_)));
    }

    #[test]
    fn credential_failure_fails_the_request() {
        let err = server("registry.example/os:v2", false)
            .get_config(&PoolRequest::new("worker"))
            .unwrap_err();

        match &err {
            MachineConfigServerError::Append { appender, .. } => assert_eq!(*appender, "kubeconfig"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(
            err.root_cause(),
            MachineConfigServerError::CredentialFetch(_)
        ));
    }

    #[test]
    fn repeated_requests_are_identical() {
        let server = server("registry.example/os:v2", true);
        let request = PoolRequest::new("worker");
        assert_eq!(
            server.get_config(&request).unwrap(),
            server.get_config(&request).unwrap()
        );
    }
}
