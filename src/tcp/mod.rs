pub mod listener;
pub mod provider;

#[cfg(test)]
mod tests;

pub use listener::TcpTransportListener;
pub use provider::TcpProvider;
