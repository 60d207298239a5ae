//! File-backed [`ConfigSource`]: one MachineConfig JSON file per pool.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use mcserver_shared::{
    AppConfig, KubeconfigData, MachineConfig, MachineConfigServerError, PoolRequest, Result,
};

use crate::server::ConfigSource;

/// Pool names are DNS-1123 labels; anything else never touches the disk.
static POOL_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]{0,61}[a-z0-9])?$").expect("valid regex"));

/// Reads `<config_dir>/<pool>.json` and a kubeconfig/root CA pair from disk.
#[derive(Debug, Clone)]
pub struct DirectoryConfigSource {
    config_dir: PathBuf,
    kubeconfig_path: PathBuf,
    root_ca_path: PathBuf,
}

impl DirectoryConfigSource {
    pub fn new(
        config_dir: impl Into<PathBuf>,
        kubeconfig_path: impl Into<PathBuf>,
        root_ca_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config_dir: config_dir.into(),
            kubeconfig_path: kubeconfig_path.into(),
            root_ca_path: root_ca_path.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.server.config_dir,
            &config.kubeconfig.path,
            &config.kubeconfig.root_ca_path,
        )
    }

    /// Path of the MachineConfig file for `pool`, if the name is acceptable.
    fn pool_path(&self, pool: &str) -> Result<PathBuf> {
        if !POOL_NAME_RE.is_match(pool) {
            return Err(MachineConfigServerError::ConfigLookup(format!(
                "invalid pool name {pool:?}"
            )));
        }
        Ok(self.config_dir.join(format!("{pool}.json")))
    }
}

impl ConfigSource for DirectoryConfigSource {
    fn machine_config(&self, request: &PoolRequest) -> Result<MachineConfig> {
        let path = self.pool_path(&request.machine_pool)?;

        let content = std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => MachineConfigServerError::ConfigLookup(format!(
                "no machine config for pool {request}"
            )),
            _ => MachineConfigServerError::io(&path, e),
        })?;

        let config: MachineConfig = serde_json::from_slice(&content).map_err(|e| {
            MachineConfigServerError::ConfigLookup(format!("invalid {}: {e}", path.display()))
        })?;

        debug!(pool = %request, name = %config.metadata.name, "loaded machine config");
        Ok(config)
    }

    fn kubeconfig(&self) -> Result<KubeconfigData> {
        Ok(KubeconfigData {
            kubeconfig: read_credential(&self.kubeconfig_path)?,
            root_ca: read_credential(&self.root_ca_path)?,
        })
    }
}

fn read_credential(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        MachineConfigServerError::CredentialFetch(format!("{}: {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mcs-source-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn source(dir: &Path) -> DirectoryConfigSource {
        DirectoryConfigSource::new(dir, dir.join("kubeconfig"), dir.join("ca.crt"))
    }

    #[test]
    fn loads_pool_file() {
        let tmp = temp_dir();
        std::fs::write(
            tmp.join("worker.json"),
            r#"{"metadata": {"name": "rendered-worker-abc"}, "spec": {"osImageURL": ""}}"#,
        )
        .unwrap();

        let mc = source(&tmp)
            .machine_config(&PoolRequest::new("worker"))
            .unwrap();
        assert_eq!(mc.metadata.name, "rendered-worker-abc");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_pool_is_lookup_error() {
        let tmp = temp_dir();
        let err = source(&tmp)
            .machine_config(&PoolRequest::new("master"))
            .unwrap_err();
        assert!(matches!(err, MachineConfigServerError::ConfigLookup(_)));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_path_like_pool_names() {
        let tmp = temp_dir();
        for pool in ["../etc/passwd", "Worker", "", "a.b", "-worker"] {
            let err = source(&tmp)
                .machine_config(&PoolRequest::new(pool))
                .unwrap_err();
            assert!(
                matches!(err, MachineConfigServerError::ConfigLookup(_)),
                "{pool:?} gave {err}"
            );
        }

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn invalid_json_is_lookup_error() {
        let tmp = temp_dir();
        std::fs::write(tmp.join("worker.json"), "{not json").unwrap();
        let err = source(&tmp)
            .machine_config(&PoolRequest::new("worker"))
            .unwrap_err();
        assert!(err.to_string().contains("worker.json"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn reads_kubeconfig_and_root_ca() {
        let tmp = temp_dir();
        std::fs::write(tmp.join("kubeconfig"), "kind: Config\n").unwrap();
        std::fs::write(tmp.join("ca.crt"), "CA").unwrap();

        let data = source(&tmp).kubeconfig().unwrap();
        assert_eq!(data.kubeconfig, b"kind: Config\n");
        assert_eq!(data.root_ca, b"CA");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_credentials_are_fetch_errors() {
        let tmp = temp_dir();
        let err = source(&tmp).kubeconfig().unwrap_err();
        assert!(matches!(err, MachineConfigServerError::CredentialFetch(_)));

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
