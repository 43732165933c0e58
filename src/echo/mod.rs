//! Echo responder
//!
//! Mirrors every chunk read from a connection back to its sender, one
//! independent task per accepted connection.

pub mod responder;
pub mod server;


pub use responder::echo;
pub use server::spawn_echo_server;
