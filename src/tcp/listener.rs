use crate::common::TransportListener;
use crate::{HarnessError, Result};
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

/// TCP listener that can be closed while an accept is pending
pub struct TcpTransportListener {
    inner: TcpListener,
    local_addr: SocketAddr,
    closed: CancellationToken,
}

impl TcpTransportListener {
    /// Binds a listener at `addr`; cancelling `scope` closes it
    pub async fn bind(scope: &CancellationToken, addr: SocketAddr) -> Result<Self> {
        let inner = TcpListener::bind(addr)
            .await
            .map_err(|e| HarnessError::Setup(format!("failed to start listener on {addr}: {e}")))?;
        Self::from_listener(inner, scope.child_token())
    }

    fn from_listener(inner: TcpListener, closed: CancellationToken) -> Result<Self> {
        let local_addr = inner
            .local_addr()
            .map_err(|e| HarnessError::Setup(format!("failed to read listener address: {e}")))?;
        Ok(Self {
            inner,
            local_addr,
            closed,
        })
    }

    /// Waits for the next raw TCP connection
    pub async fn accept_stream(&self) -> Result<(TcpStream, SocketAddr)> {
        if self.closed.is_cancelled() {
            return Err(HarnessError::ListenerClosed);
        }
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(HarnessError::ListenerClosed),
            accepted = self.inner.accept() => Ok(accepted?),
        }
    }
}

#[async_trait]
impl TransportListener for TcpTransportListener {
    type Conn = TcpStream;

    async fn accept(&self) -> Result<(TcpStream, SocketAddr)> {
        self.accept_stream().await
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn close(&self) {
        self.closed.cancel();
    }

    fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}
