//! Provisioning document assembler.
//!
//! Turns a [`MachineConfig`] into the base document the appenders work on:
//! the object's own Ignition config plus an encapsulated copy of the object.

use serde_json::Value;
use tracing::{debug, instrument};

use mcserver_ignition::{self as ignition, Config};
use mcserver_shared::{
    ENCAPSULATED_CONFIG_PATH, MachineConfig, MachineConfigServerError, ProvisioningDocument,
    Result,
};

use crate::appenders::append_file;

/// Assemble the base provisioning document for `config`.
///
/// The encapsulated copy has its own `spec.config` replaced by an empty
/// Ignition config, so the document never nests itself.
#[instrument(skip_all, fields(name = %config.metadata.name))]
pub fn assemble(config: &MachineConfig) -> Result<ProvisioningDocument> {
    let base = base_document(&config.spec.config)?;

    let mut snapshot = config.clone();
    snapshot.spec.config = placeholder()?;
    let serialized = serde_json::to_vec(&snapshot).map_err(|e| {
        MachineConfigServerError::Serialization(format!("could not marshal machine config: {e}"))
    })?;

    debug!(size = serialized.len(), "encapsulating machine config");
    append_file(&base, ENCAPSULATED_CONFIG_PATH, &serialized)
}

/// Encode the embedded Ignition config, or an empty one when there is none.
fn base_document(embedded: &Value) -> Result<ProvisioningDocument> {
    let raw = match embedded {
        Value::Null => ignition::encode(&Config::new())?,
        other => serde_json::to_vec(other)
            .map_err(|e| MachineConfigServerError::Serialization(e.to_string()))?,
    };
    Ok(raw.into())
}

fn placeholder() -> Result<Value> {
    serde_json::to_value(Config::new())
        .map_err(|e| MachineConfigServerError::Serialization(e.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
