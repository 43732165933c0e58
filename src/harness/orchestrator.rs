use super::{ExchangeRecord, Progress, RunReport, Stage, State, message_for};
use crate::common::{HarnessConfig, ProviderKind, TransportListener, TransportProvider};
use crate::{HarnessError, ModuleProvider, Result, TcpProvider, spawn_echo_server};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Drives one connection-lifetime run against a provider
///
/// The run listens and starts an echo responder, dials the listener under a
/// child of the process scope, then exchanges `message {i}` for each round.
/// After the configured round the dial scope is cancelled; the remaining
/// rounds must still succeed, and a further dial on that scope must fail.
///
/// # Examples
///
/// ```no_run
/// use dialscope::common::{HarnessConfig, ProviderKind};
/// use dialscope::{Orchestrator, TcpProvider};
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = HarnessConfig {
///         provider: ProviderKind::Tcp,
///         ..HarnessConfig::default()
///     };
///     let mut orchestrator = Orchestrator::new(config, CancellationToken::new());
///     let report = orchestrator.run(&TcpProvider::new()).await?;
///     assert_eq!(report.record.len(), 3);
///     Ok(())
/// }
/// ```
pub struct Orchestrator {
    config: HarnessConfig,
    scope: CancellationToken,
    state: State,
    progress: Option<UnboundedSender<Progress>>,
}

impl Orchestrator {
    pub fn new(config: HarnessConfig, scope: CancellationToken) -> Self {
        Self {
            config,
            scope,
            state: State::SettingUp,
            progress: None,
        }
    }

    /// Reports each completed step on `progress` while the run goes on
    pub fn with_progress(mut self, progress: UnboundedSender<Progress>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Runs the full exchange; the listener is closed before returning
    pub async fn run<P: TransportProvider>(&mut self, provider: &P) -> Result<RunReport> {
        self.transition(State::SettingUp);
        if let Err(e) = self.config.validate() {
            return Err(self.fail(Stage::Setup, e));
        }

        let listener = match provider.listen(&self.scope, self.config.listen_addr).await {
            Ok(listener) => Arc::new(listener),
            Err(e) => return Err(self.fail(Stage::Setup, e)),
        };
        let addr = listener.local_addr();
        info!(provider = provider.name(), address = %addr, "Echo listener ready");
        let server = spawn_echo_server(listener.clone(), self.config.buffer_size);

        let result = self.exchange(provider, addr).await;

        listener.close();
        if let Err(e) = server.await {
            warn!(error = %e, "Echo server task failed");
        }
        result
    }

    async fn exchange<P: TransportProvider>(&mut self, provider: &P, addr: SocketAddr) -> Result<RunReport> {
        self.transition(State::Dialing);
        let dial_scope = self.scope.child_token();
        let _dial_guard = dial_scope.clone().drop_guard();

        let mut conn = match provider.dial(&dial_scope, addr).await {
            Ok(conn) => conn,
            Err(e) => return Err(self.fail(Stage::Dial, e)),
        };
        info!(%addr, "Dial succeeded");

        let mut record = ExchangeRecord::new();
        let mut cancelled_after = None;
        let mut buffer = vec![0u8; self.config.buffer_size];
        let limit = self.config.io_timeout;

        for round in 0..self.config.rounds {
            self.transition(State::Exchanging { round });
            let message = message_for(round);

            if let Err(e) = within(limit, "write", conn.write_all(message.as_bytes())).await {
                let e = after_cancel(e, cancelled_after);
                return Err(self.fail(Stage::Write { round }, e));
            }
            info!(round, %message, "Write succeeded");
            self.report(Progress::Wrote {
                round,
                message: message.clone(),
            });

            let received = &mut buffer[..message.len()];
            if let Err(e) = within(limit, "read", conn.read_exact(received)).await {
                let e = after_cancel(e, cancelled_after);
                return Err(self.fail(Stage::Read { round }, e));
            }
            let received = String::from_utf8_lossy(received).into_owned();
            info!(round, message = %received, "Read succeeded");
            self.report(Progress::Read {
                round,
                message: received.clone(),
            });
            record.push(round, message, received);

            if self.config.cancel_dial_scope && round == self.config.cancel_after_round {
                info!(round, "Cancelling dial scope");
                dial_scope.cancel();
                cancelled_after = Some(round);
                self.report(Progress::CancelledDialScope { round });
            }

            if round + 1 < self.config.rounds {
                tokio::time::sleep(self.config.round_delay).await;
            }
        }

        self.transition(State::Asserting);
        if let Err(e) = record.verify() {
            let round = match &e {
                HarnessError::Mismatch { round, .. } => *round,
                _ => 0,
            };
            return Err(self.fail(Stage::Assert { round }, e));
        }

        let redial_rejected = cancelled_after.is_some() && self.config.verify_redial;
        if redial_rejected {
            self.verify_redial(provider, &dial_scope, addr).await?;
        }

        if let Err(e) = within(limit, "shutdown", conn.shutdown()).await {
            debug!(error = %e, "Shutdown after exchange failed");
        }

        self.transition(State::Done);
        Ok(RunReport {
            provider: provider.name(),
            record,
            cancelled_after,
            redial_rejected,
        })
    }

    async fn verify_redial<P: TransportProvider>(
        &mut self,
        provider: &P,
        dial_scope: &CancellationToken,
        addr: SocketAddr,
    ) -> Result<()> {
        let limit = self.config.redial_timeout;
        match tokio::time::timeout(limit, provider.dial(dial_scope, addr)).await {
            Ok(Err(e)) => {
                info!(error = %e, "Dial on cancelled scope rejected");
                self.report(Progress::RedialRejected);
                Ok(())
            }
            Ok(Ok(_conn)) => Err(self.fail(
                Stage::Redial,
                HarnessError::ContractViolation("dial on a cancelled scope succeeded".to_string()),
            )),
            Err(_) => Err(self.fail(
                Stage::Redial,
                HarnessError::ContractViolation(format!(
                    "dial on a cancelled scope did not fail within {limit:?}"
                )),
            )),
        }
    }

    fn report(&self, event: Progress) {
        if let Some(progress) = &self.progress {
            if progress.send(event).is_err() {
                debug!("Progress receiver dropped");
            }
        }
    }

    fn transition(&mut self, next: State) {
        debug!(from = ?self.state, to = ?next, "State transition");
        self.state = next;
    }

    fn fail(&mut self, stage: Stage, err: impl Into<HarnessError>) -> HarnessError {
        let source = err.into();
        error!(%stage, error = %source, "Run failed");
        self.state = State::Failed(stage);
        HarnessError::Failed {
            stage,
            source: Box::new(source),
        }
    }
}

async fn within<T>(
    limit: Duration,
    operation: &str,
    io: impl Future<Output = std::io::Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, io).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(HarnessError::Timeout(format!(
            "{operation} did not complete within {limit:?}"
        ))),
    }
}

fn after_cancel(err: HarnessError, cancelled_after: Option<usize>) -> HarnessError {
    match cancelled_after {
        Some(round) => HarnessError::ContractViolation(format!(
            "connection failed after the dial scope was cancelled in round {round}: {err}"
        )),
        None => err,
    }
}

/// Selects the configured provider and runs the harness against it
///
/// A transport module that cannot be loaded fails the run at the set up
/// stage, like a listener that cannot bind.
pub async fn run_harness(config: HarnessConfig, scope: CancellationToken) -> Result<RunReport> {
    run_harness_reporting(config, scope, None).await
}

/// Like [`run_harness`], reporting each step on `progress` as it completes
pub async fn run_harness_reporting(
    config: HarnessConfig,
    scope: CancellationToken,
    progress: Option<UnboundedSender<Progress>>,
) -> Result<RunReport> {
    let mut orchestrator = Orchestrator::new(config, scope.clone());
    if let Some(progress) = progress {
        orchestrator = orchestrator.with_progress(progress);
    }
    match orchestrator.config().provider {
        ProviderKind::Tcp => orchestrator.run(&TcpProvider::new()).await,
        ProviderKind::Module => {
            let path = orchestrator.config().wasm_path.clone();
            let buffer_size = orchestrator.config().buffer_size;
            let provider = match ModuleProvider::load(&path, scope, buffer_size).await {
                Ok(provider) => provider,
                Err(e) => return Err(orchestrator.fail(Stage::Setup, e)),
            };
            orchestrator.run(&provider).await
        }
    }
}
