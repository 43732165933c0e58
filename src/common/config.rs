use crate::{HarnessError, Result};
use clap::{ArgAction, Parser};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Which transport provider a run exercises
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Plain TCP sockets
    Tcp,
    /// A WebAssembly transport module relaying over TCP sockets
    Module,
}

/// Configuration for a harness run
///
/// # Examples
///
/// ```
/// use dialscope::common::{HarnessConfig, ProviderKind};
/// use std::time::Duration;
///
/// let config = HarnessConfig {
///     provider: ProviderKind::Tcp,
///     round_delay: Duration::ZERO,
///     ..HarnessConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Provider under test
    pub provider: ProviderKind,
    /// Transport module path, used by [`ProviderKind::Module`]
    pub wasm_path: PathBuf,
    /// Address the echo listener binds to
    pub listen_addr: SocketAddr,
    /// Buffer size for the echo responder, relays and reads
    pub buffer_size: usize,
    /// Number of exchange rounds
    pub rounds: usize,
    /// Whether to cancel the dial scope mid-run
    pub cancel_dial_scope: bool,
    /// Round after which the dial scope is cancelled
    pub cancel_after_round: usize,
    /// Pause between rounds
    pub round_delay: Duration,
    /// Whether to check that dialing again on the cancelled scope fails
    pub verify_redial: bool,
    /// Upper bound on how long that second dial may take to fail
    pub redial_timeout: Duration,
    /// Upper bound on each write and read of the exchange
    pub io_timeout: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Module,
            wasm_path: PathBuf::from("plain.go.wasm"),
            listen_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
            buffer_size: 1024,
            rounds: 3,
            cancel_dial_scope: true,
            cancel_after_round: 1,
            round_delay: Duration::from_secs(1),
            verify_redial: true,
            redial_timeout: Duration::from_secs(5),
            io_timeout: Duration::from_secs(10),
        }
    }
}

impl HarnessConfig {
    /// Checks the configuration for values the orchestrator cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(HarnessError::Config("buffer size must be non-zero".to_string()));
        }
        if self.rounds == 0 {
            return Err(HarnessError::Config("at least one round is required".to_string()));
        }
        if self.cancel_dial_scope && self.cancel_after_round >= self.rounds {
            return Err(HarnessError::Config(format!(
                "cancel round {} is outside the {} configured rounds",
                self.cancel_after_round, self.rounds
            )));
        }
        if self.io_timeout.is_zero() {
            return Err(HarnessError::Config("I/O timeout must be non-zero".to_string()));
        }
        let longest = crate::harness::message_for(self.rounds - 1).len();
        if longest > self.buffer_size {
            return Err(HarnessError::Config(format!(
                "buffer size {} cannot hold a {longest} byte message",
                self.buffer_size
            )));
        }
        Ok(())
    }
}

/// Command-line arguments for the harness binary
#[derive(Parser, Debug)]
#[command(name = "dialscope")]
#[command(about = "Checks that cancelling a dial scope leaves established connections usable", long_about = None)]
pub struct CliArgs {
    /// Path to the transport WebAssembly module
    #[arg(long, default_value = "plain.go.wasm")]
    pub wasm: PathBuf,

    /// Whether to cancel the dial scope after message 1
    #[arg(long, default_value_t = true, num_args = 0..=1, default_missing_value = "true", action = ArgAction::Set)]
    pub cancel_dial_ctx: bool,

    /// Test with plain TCP instead of the transport module
    #[arg(long, default_value_t = false, num_args = 0..=1, default_missing_value = "true", action = ArgAction::Set)]
    pub use_tcp: bool,

    /// Pause between rounds in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub round_delay_ms: u64,

    /// Time limit for each write and read of the exchange in milliseconds
    #[arg(long, default_value_t = 10_000)]
    pub io_timeout_ms: u64,

    /// Skip checking that a second dial on the cancelled scope fails
    #[arg(long)]
    pub no_verify_redial: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl From<CliArgs> for HarnessConfig {
    fn from(args: CliArgs) -> Self {
        Self {
            provider: if args.use_tcp {
                ProviderKind::Tcp
            } else {
                ProviderKind::Module
            },
            wasm_path: args.wasm,
            cancel_dial_scope: args.cancel_dial_ctx,
            round_delay: Duration::from_millis(args.round_delay_ms),
            verify_redial: !args.no_verify_redial,
            io_timeout: Duration::from_millis(args.io_timeout_ms),
            ..Self::default()
        }
    }
}
