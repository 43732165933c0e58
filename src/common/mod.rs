//! Common traits and types used across the dialscope library
//!
//! This module contains the listen/dial capability surface shared by every
//! transport provider, and the harness configuration.

pub mod config;
pub mod test_utils;
pub mod traits;

#[cfg(test)]
mod tests;

pub use config::{CliArgs, HarnessConfig, ProviderKind};
pub use test_utils::{IDENTITY_MODULE_WAT, XOR_MODULE_WAT, fast_config};
pub use traits::{Connection, TransportListener, TransportProvider};
