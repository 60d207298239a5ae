//! Provisioning document pipeline for the machine config server.
//!
//! This crate ties the Ignition codecs together into the end-to-end
//! `get_config` workflow: assemble a base document from a MachineConfig,
//! then run the appenders (node annotations, initial pivot, kubeconfig).

pub mod annotations;
pub mod appenders;
pub mod assembler;
pub mod server;
pub mod source;

pub use appenders::{AppendError, Appender, KubeconfigFn};
pub use server::{ConfigSource, MachineConfigServer, Server};
pub use source::DirectoryConfigSource;
