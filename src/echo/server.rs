use super::echo;
use crate::HarnessError;
use crate::common::TransportListener;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info};

/// Runs an accept loop on `listener`, echoing each connection in its own task
///
/// Per-connection tasks are not tracked; they live until their peer closes.
/// The returned handle completes once accepting fails, which is how a closed
/// listener stops the loop.
pub fn spawn_echo_server<L>(listener: Arc<L>, buffer_size: usize) -> JoinHandle<()>
where
    L: TransportListener + 'static,
{
    let local_addr = listener.local_addr();
    let span = tracing::info_span!("echo_server", address = %local_addr);

    tokio::spawn(
        async move {
            info!("Echo server accepting connections");
            loop {
                match listener.accept().await {
                    Ok((conn, addr)) => {
                        info!(%addr, "Accepted connection");
                        let span = tracing::info_span!("connection", %addr);
                        tokio::spawn(
                            async move {
                                if let Err(e) = echo(conn, buffer_size).await {
                                    error!(%addr, error = %e, "Echo failed");
                                }
                                info!(%addr, "Connection closed");
                            }
                            .instrument(span),
                        );
                    }
                    Err(HarnessError::ListenerClosed) => {
                        info!("Listener closed, stopping echo server");
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                        break;
                    }
                }
            }
        }
        .instrument(span),
    )
}
