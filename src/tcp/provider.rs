use super::TcpTransportListener;
use crate::common::TransportProvider;
use crate::{DialError, Result};
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Plain TCP provider
///
/// # Examples
///
/// ```no_run
/// use dialscope::{TcpProvider, TransportListener, TransportProvider};
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let scope = CancellationToken::new();
///     let provider = TcpProvider::new();
///     let listener = provider.listen(&scope, "127.0.0.1:0".parse()?).await?;
///
///     let dial_scope = scope.child_token();
///     let _conn = provider.dial(&dial_scope, listener.local_addr()).await?;
///     dial_scope.cancel(); // the connection stays usable
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct TcpProvider;

impl TcpProvider {
    pub fn new() -> Self {
        Self
    }
}

/// Connects to `addr` unless `scope` is or becomes cancelled first
pub(crate) async fn connect(
    scope: &CancellationToken,
    addr: SocketAddr,
) -> std::result::Result<TcpStream, DialError> {
    if scope.is_cancelled() {
        return Err(DialError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = scope.cancelled() => {
            debug!(%addr, "Dial cancelled while connecting");
            Err(DialError::Cancelled)
        }
        connected = TcpStream::connect(addr) => {
            connected.map_err(|source| DialError::Connect { addr, source })
        }
    }
}

#[async_trait]
impl TransportProvider for TcpProvider {
    type Conn = TcpStream;
    type Listener = TcpTransportListener;

    fn name(&self) -> &'static str {
        "tcp"
    }

    async fn listen(&self, scope: &CancellationToken, addr: SocketAddr) -> Result<TcpTransportListener> {
        TcpTransportListener::bind(scope, addr).await
    }

    async fn dial(
        &self,
        scope: &CancellationToken,
        addr: SocketAddr,
    ) -> std::result::Result<TcpStream, DialError> {
        connect(scope, addr).await
    }
}
