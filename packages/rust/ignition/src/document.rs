//! Ignition 2.2 document model and codec.
//!
//! Only the pieces the server mutates are typed (`storage.files`,
//! `systemd.units`). Every struct keeps a flattened map of the fields it does
//! not know about so a decode/encode cycle never loses data.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::trace;

use mcserver_shared::{MachineConfigServerError, Result};

use crate::content;

/// The only Ignition spec version this server reads and writes.
pub const SUPPORTED_VERSION: &str = "2.2.0";

/// Filesystem every injected file is written to.
pub const DEFAULT_FILESYSTEM: &str = "root";

/// `0644`, the mode of every injected file.
pub const DEFAULT_FILE_MODE: u32 = 420;

// ---------------------------------------------------------------------------
// Document types
// ---------------------------------------------------------------------------

/// A decoded Ignition config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub ignition: Ignition,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Storage::is_empty"
    )]
    pub storage: Storage,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Systemd::is_empty"
    )]
    pub systemd: Systemd,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The `ignition` section. Everything besides the version is passed through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ignition {
    pub version: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Storage {
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub files: Vec<File>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Systemd {
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub units: Vec<Unit>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A file written by Ignition on first boot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    #[serde(default, deserialize_with = "null_as_default")]
    pub filesystem: String,
    pub path: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub contents: FileContents,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileContents {
    /// Inline `data:` URL (or any other URL another tool put here).
    #[serde(default, deserialize_with = "null_as_default")]
    pub source: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A systemd unit installed by Ignition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub contents: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Config {
    /// An empty config at the supported version.
    pub fn new() -> Self {
        Self {
            ignition: Ignition {
                version: SUPPORTED_VERSION.to_string(),
                extra: Map::new(),
            },
            storage: Storage::default(),
            systemd: Systemd::default(),
            extra: Map::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage {
    fn is_empty(&self) -> bool {
        self.files.is_empty() && self.extra.is_empty()
    }
}

impl Systemd {
    fn is_empty(&self) -> bool {
        self.units.is_empty() && self.extra.is_empty()
    }
}

impl File {
    /// A root-filesystem file with inline contents and mode `0644`.
    pub fn inline(path: impl Into<String>, data: &[u8]) -> Self {
        Self {
            filesystem: DEFAULT_FILESYSTEM.to_string(),
            path: path.into(),
            contents: FileContents {
                source: content::encode(data),
                extra: Map::new(),
            },
            mode: Some(DEFAULT_FILE_MODE),
            extra: Map::new(),
        }
    }

    /// Decode the inline contents of this file.
    pub fn data(&self) -> Result<Vec<u8>> {
        content::decode(&self.contents.source)
    }
}

impl Unit {
    /// An enabled unit with the given definition text.
    pub fn enabled(name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: Some(true),
            contents: contents.into(),
            extra: Map::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Explicit `null` reads as the empty value, same as an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
struct VersionProbe {
    ignition: Option<ProbeIgnition>,
}

#[derive(Deserialize)]
struct ProbeIgnition {
    version: Option<String>,
}

/// Decode raw document bytes.
///
/// The version is checked before the full parse so an incompatible document
/// reports `UnsupportedVersion` even when its layout differs from 2.2.
pub fn decode(raw: &[u8]) -> Result<Config> {
    let probe: VersionProbe = serde_json::from_slice(raw)
        .map_err(|e| MachineConfigServerError::malformed_document(e.to_string()))?;

    let version = probe
        .ignition
        .and_then(|ignition| ignition.version)
        .ok_or_else(|| MachineConfigServerError::malformed_document("missing ignition.version"))?;

    if version != SUPPORTED_VERSION {
        return Err(MachineConfigServerError::UnsupportedVersion { version });
    }

    let config: Config = serde_json::from_slice(raw)
        .map_err(|e| MachineConfigServerError::malformed_document(e.to_string()))?;

    trace!(
        files = config.storage.files.len(),
        units = config.systemd.units.len(),
        "decoded ignition config"
    );
    Ok(config)
}

/// Encode a config back to raw document bytes.
pub fn encode(config: &Config) -> Result<Vec<u8>> {
    serde_json::to_vec(config).map_err(|e| MachineConfigServerError::Serialization(e.to_string()))
}
