use crate::{DialError, Result};
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

/// A bidirectional byte stream between two endpoints
///
/// Owned by whichever side obtained it (accept or dial) until it is dropped
/// or shut down.
pub trait Connection: AsyncRead + AsyncWrite + Unpin + Send + 'static {
    /// Local end of the connection
    fn local_addr(&self) -> std::io::Result<SocketAddr>;

    /// Remote end of the connection
    fn peer_addr(&self) -> std::io::Result<SocketAddr>;
}

impl Connection for tokio::net::TcpStream {
    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        tokio::net::TcpStream::local_addr(self)
    }

    fn peer_addr(&self) -> std::io::Result<SocketAddr> {
        tokio::net::TcpStream::peer_addr(self)
    }
}

/// Passive endpoint yielding inbound connections
///
/// Listeners are shared between the accept loop and the shutdown path, so
/// every method takes `&self`. Once [`close`](TransportListener::close) has
/// been called, pending and future accepts fail with
/// [`HarnessError::ListenerClosed`](crate::HarnessError::ListenerClosed).
#[async_trait]
pub trait TransportListener: Send + Sync {
    /// Connection type produced by this listener
    type Conn: Connection;

    /// Waits for the next inbound connection
    async fn accept(&self) -> Result<(Self::Conn, SocketAddr)>;

    /// Address the listener is bound to
    fn local_addr(&self) -> SocketAddr;

    /// Closes the listener. Calling this more than once is a no-op.
    fn close(&self);

    /// Returns true once the listener has been closed
    fn is_closed(&self) -> bool;
}

/// Uniform listen/dial surface implemented by every transport provider
///
/// `dial` must not keep the scope it was given once it returns: cancelling
/// that scope afterwards must leave the returned connection untouched.
#[async_trait]
pub trait TransportProvider: Send + Sync {
    /// Connection type produced by dialing
    type Conn: Connection;
    /// Listener type for this provider
    type Listener: TransportListener + 'static;

    /// Short provider name used in logs and reports
    fn name(&self) -> &'static str;

    /// Binds a listener at `addr`; it closes when `scope` is cancelled
    async fn listen(&self, scope: &CancellationToken, addr: SocketAddr) -> Result<Self::Listener>;

    /// Opens a connection to `addr`, honoring cancellation of `scope` until it returns
    async fn dial(
        &self,
        scope: &CancellationToken,
        addr: SocketAddr,
    ) -> std::result::Result<Self::Conn, DialError>;
}
