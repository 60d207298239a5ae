//! Document mutation pipeline.
//!
//! Each appender takes the current encoded document, decodes it, adds its
//! artifact, and encodes the result. Appenders never see each other; the
//! [`run`] driver sequences them and stops at the first failure.

use tracing::{debug, instrument, warn};

use mcserver_ignition::{self as ignition, File, Unit};
use mcserver_shared::{
    KUBECONFIG_PATH, KubeconfigData, MachineConfigServerError, NODE_ANNOTATIONS_PATH,
    PIVOT_MARKER_PATH, ProvisioningDocument, Result,
};

use crate::annotations;

/// Unit that drops the reboot flag `pivot.service` looks for.
pub const PIVOT_UNIT_NAME: &str = "mcd-write-pivot-reboot.service";

// Ignition writes `/run/...` paths to the real root rather than the runtime
// tmpfs, so the flag has to be created by a unit on first boot.
const PIVOT_UNIT_CONTENTS: &str = "[Unit]
Before=pivot.service
ConditionFirstBoot=true
[Service]
ExecStart=/bin/sh -c 'mkdir /run/pivot && touch /run/pivot/reboot-needed'
[Install]
WantedBy=multi-user.target
";

/// Retrieves the serving kubeconfig for the node.
pub type KubeconfigFn<'a> = dyn Fn() -> Result<KubeconfigData> + 'a;

type ApplyFn<'a> = dyn Fn(&ProvisioningDocument) -> Result<ProvisioningDocument> + 'a;

/// A named pipeline step.
pub struct Appender<'a> {
    name: &'static str,
    apply: Box<ApplyFn<'a>>,
}

impl<'a> Appender<'a> {
    pub fn new(
        name: &'static str,
        apply: impl Fn(&ProvisioningDocument) -> Result<ProvisioningDocument> + 'a,
    ) -> Self {
        Self {
            name,
            apply: Box::new(apply),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn apply(&self, doc: &ProvisioningDocument) -> Result<ProvisioningDocument> {
        (self.apply)(doc)
    }
}

impl std::fmt::Debug for Appender<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Appender").field("name", &self.name).finish()
    }
}

/// A failed pipeline run.
#[derive(Debug, thiserror::Error)]
#[error("{appender} appender failed: {source}")]
pub struct AppendError {
    /// Name of the appender that failed.
    pub appender: &'static str,
    /// The document as it was right before the failing appender ran.
    pub document: ProvisioningDocument,
    #[source]
    pub source: MachineConfigServerError,
}

impl From<AppendError> for MachineConfigServerError {
    fn from(err: AppendError) -> Self {
        MachineConfigServerError::append(err.appender, err.source)
    }
}

/// The standard appenders, in the order they must run.
pub fn appenders<'a>(
    config_id: &'a str,
    kubeconfig: &'a KubeconfigFn<'a>,
    os_image_url: &'a str,
) -> Vec<Appender<'a>> {
    vec![
        Appender::new("node-annotations", move |doc| {
            append_node_annotations(doc, config_id)
        }),
        Appender::new("initial-pivot", move |doc| {
            append_initial_pivot(doc, os_image_url)
        }),
        Appender::new("kubeconfig", move |doc| append_kubeconfig(doc, kubeconfig)),
    ]
}

/// Run `appenders` in order. Effects of steps that succeeded before a failure
/// are kept in the returned [`AppendError::document`].
#[instrument(skip_all, fields(steps = appenders.len()))]
pub fn run(
    doc: ProvisioningDocument,
    appenders: &[Appender<'_>],
) -> std::result::Result<ProvisioningDocument, AppendError> {
    let mut doc = doc;
    for appender in appenders {
        match appender.apply(&doc) {
            Ok(next) => doc = next,
            Err(source) => {
                warn!(appender = appender.name(), error = %source, "appender failed");
                return Err(AppendError {
                    appender: appender.name(),
                    document: doc,
                    source,
                });
            }
        }
    }
    Ok(doc)
}

// ---------------------------------------------------------------------------
// Appenders
// ---------------------------------------------------------------------------

/// Append one inline file to the document.
pub fn append_file(
    doc: &ProvisioningDocument,
    path: &str,
    data: &[u8],
) -> Result<ProvisioningDocument> {
    let mut config = ignition::decode(doc.as_bytes())?;
    config.storage.files.push(File::inline(path, data));
    debug!(path, size = data.len(), "appended file");
    Ok(ignition::encode(&config)?.into())
}

/// Embed the first-boot node annotations.
pub fn append_node_annotations(
    doc: &ProvisioningDocument,
    config_id: &str,
) -> Result<ProvisioningDocument> {
    let annotations = annotations::node_annotations(config_id)?;
    append_file(doc, NODE_ANNOTATIONS_PATH, &annotations)
}

/// Tell `pivot.service` to switch to `os_image_url` before normal boot.
///
/// A no-op when `os_image_url` is empty. Otherwise adds the pull-spec marker
/// file and the unit that raises the runtime reboot flag, in one encode.
pub fn append_initial_pivot(
    doc: &ProvisioningDocument,
    os_image_url: &str,
) -> Result<ProvisioningDocument> {
    if os_image_url.is_empty() {
        return Ok(doc.clone());
    }

    let mut config = ignition::decode(doc.as_bytes())?;
    let marker = format!("{os_image_url}\n");
    config
        .storage
        .files
        .push(File::inline(PIVOT_MARKER_PATH, marker.as_bytes()));
    config
        .systemd
        .units
        .push(Unit::enabled(PIVOT_UNIT_NAME, PIVOT_UNIT_CONTENTS));

    debug!(os_image_url, unit = PIVOT_UNIT_NAME, "appended initial pivot");
    Ok(ignition::encode(&config)?.into())
}

/// Embed the serving kubeconfig. The root CA is not embedded.
pub fn append_kubeconfig(
    doc: &ProvisioningDocument,
    kubeconfig: &KubeconfigFn<'_>,
) -> Result<ProvisioningDocument> {
    let KubeconfigData { kubeconfig, .. } = kubeconfig().map_err(|e| match e {
        MachineConfigServerError::CredentialFetch(_) => e,
        other => MachineConfigServerError::CredentialFetch(other.to_string()),
    })?;
    append_file(doc, KUBECONFIG_PATH, &kubeconfig)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
