use std::net::SocketAddr;
use thiserror::Error;

/// Failure to establish an outbound connection
#[derive(Error, Debug)]
pub enum DialError {
    /// The dial scope was cancelled before or while dialing
    #[error("dial scope cancelled")]
    Cancelled,

    /// The remote address could not be reached
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The transport failed to bring the connection up after the socket connected
    #[error("transport handshake failed: {0}")]
    Handshake(String),
}

/// Error types for the dialscope library
#[derive(Error, Debug)]
pub enum HarnessError {
    /// Listener bind or transport module load failures
    #[error("setup error: {0}")]
    Setup(String),

    /// Connection establishment failures
    #[error("dial error: {0}")]
    Dial(#[from] DialError),

    /// Read or write failures on an established connection
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An exchange step did not complete in time
    #[error("timeout: {0}")]
    Timeout(String),

    /// Accept attempted on a closed listener
    #[error("listener closed")]
    ListenerClosed,

    /// A transport module trapped or broke the transform contract while relaying
    #[error("transport module error: {0}")]
    Module(String),

    /// The echoed payload differs from what was sent
    #[error("round {round}: sent {sent:?} but received {received:?}")]
    Mismatch {
        round: usize,
        sent: String,
        received: String,
    },

    /// The dial scope cancellation contract was broken
    #[error("contract violation: {0}")]
    ContractViolation(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// A failure tagged with the orchestrator stage it happened in
    #[error("{stage} failed: {source}")]
    Failed {
        stage: harness::Stage,
        #[source]
        source: Box<HarnessError>,
    },
}

impl HarnessError {
    /// Returns the orchestrator stage this error was raised in, if it was tagged with one
    pub fn stage(&self) -> Option<harness::Stage> {
        match self {
            HarnessError::Failed { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Returns the innermost error, skipping stage tags
    pub fn root(&self) -> &HarnessError {
        match self {
            HarnessError::Failed { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result type for the dialscope library
pub type Result<T> = std::result::Result<T, HarnessError>;

pub mod common;
pub mod echo;
pub mod harness;
pub mod module;
pub mod tcp;

// Re-export main types for convenience
pub use common::{Connection, HarnessConfig, ProviderKind, TransportListener, TransportProvider};
pub use echo::{echo, spawn_echo_server};
pub use harness::{
    ExchangeRecord, Orchestrator, Progress, RunReport, Stage, State, run_harness, run_harness_reporting,
};
pub use module::{ModuleConn, ModuleProvider, TransportModule};
pub use tcp::{TcpProvider, TcpTransportListener};
