//! WebAssembly-backed transport provider
//!
//! A transport module is compiled once and instantiated per connection. The
//! harness keeps ownership of the real sockets and relays bytes through the
//! module, so the module's own wire behavior stays opaque.

pub mod loader;
pub mod provider;
pub mod relay;


pub use loader::{Direction, ModuleInstance, TransportModule, VERSION_MARKER};
pub use provider::{ModuleListener, ModuleProvider};
pub use relay::ModuleConn;
