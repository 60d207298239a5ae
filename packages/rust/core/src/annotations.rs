//! Node annotations reported by a freshly provisioned node.

use std::collections::BTreeMap;

use mcserver_shared::{
    CURRENT_CONFIG_ANNOTATION, DAEMON_STATE_ANNOTATION, DAEMON_STATE_DONE,
    DESIRED_CONFIG_ANNOTATION, MachineConfigServerError, Result,
};

/// Build the JSON annotation payload for a node booting into `config_id`.
///
/// Current and desired config are the same, and the daemon state is already
/// `Done`: the node needs no update right after first boot.
pub fn node_annotations(config_id: &str) -> Result<Vec<u8>> {
    let annotations = BTreeMap::from([
        (CURRENT_CONFIG_ANNOTATION, config_id),
        (DESIRED_CONFIG_ANNOTATION, config_id),
        (DAEMON_STATE_ANNOTATION, DAEMON_STATE_DONE),
    ]);

    serde_json::to_vec(&annotations).map_err(|e| {
        MachineConfigServerError::Serialization(format!("could not marshal node annotations: {e}"))
    })
}
