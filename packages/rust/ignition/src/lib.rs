//! Ignition document handling for the machine config server.
//!
//! This crate provides:
//! - [`content`]: `data:` URL codec for inline file contents
//! - [`document`]: typed Ignition 2.2 model with a lossless decode/encode cycle

pub mod content;
pub mod document;

pub use document::{
    Config, DEFAULT_FILE_MODE, DEFAULT_FILESYSTEM, File, FileContents, Ignition,
    SUPPORTED_VERSION, Storage, Systemd, Unit, decode, encode,
};
