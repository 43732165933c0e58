use super::loader::{Direction, ModuleInstance};
use crate::HarnessError;
use crate::common::Connection;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, warn};

/// Connection carried through a transport module
///
/// The caller talks to one end of an in-memory pipe; two relay tasks move
/// bytes between the other end and the socket, passing each chunk through the
/// module. The relays live until either side closes or the scope they were
/// spawned under is cancelled.
#[derive(Debug)]
pub struct ModuleConn {
    io: DuplexStream,
    local_addr: SocketAddr,
    peer_addr: SocketAddr,
}

impl ModuleConn {
    /// Starts relaying `stream` through `instance` until `scope` is cancelled
    pub(crate) fn spawn(
        stream: TcpStream,
        instance: ModuleInstance,
        scope: &CancellationToken,
        buffer_size: usize,
    ) -> io::Result<Self> {
        let local_addr = stream.local_addr()?;
        let peer_addr = stream.peer_addr()?;

        let (io, relay_end) = tokio::io::duplex(buffer_size);
        let (pipe_rd, pipe_wr) = tokio::io::split(relay_end);
        let (sock_rd, sock_wr) = stream.into_split();
        let instance = instance
            .has_transforms()
            .then(|| Arc::new(Mutex::new(instance)));

        tokio::spawn(
            pump(pipe_rd, sock_wr, instance.clone(), Direction::Outbound, scope.clone(), buffer_size)
                .instrument(tracing::debug_span!("relay", direction = %Direction::Outbound, peer = %peer_addr)),
        );
        tokio::spawn(
            pump(sock_rd, pipe_wr, instance, Direction::Inbound, scope.clone(), buffer_size)
                .instrument(tracing::debug_span!("relay", direction = %Direction::Inbound, peer = %peer_addr)),
        );

        Ok(Self {
            io,
            local_addr,
            peer_addr,
        })
    }
}

async fn pump<R, W>(
    mut reader: R,
    mut writer: W,
    instance: Option<Arc<Mutex<ModuleInstance>>>,
    direction: Direction,
    scope: CancellationToken,
    buffer_size: usize,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer = vec![0u8; buffer_size];
    loop {
        let n = tokio::select! {
            biased;
            _ = scope.cancelled() => {
                debug!("Relay scope cancelled");
                break;
            }
            read = reader.read(&mut buffer) => match read {
                Ok(0) => {
                    debug!("Relay source closed");
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    debug!(error = %e, "Relay read failed");
                    break;
                }
            },
        };

        let written = match &instance {
            Some(instance) => match transform(instance.clone(), direction, buffer[..n].to_vec()).await {
                Ok(chunk) => writer.write_all(&chunk).await,
                Err(e) => {
                    warn!(error = %e, "Dropping connection after module failure");
                    break;
                }
            },
            None => writer.write_all(&buffer[..n]).await,
        };
        if let Err(e) = written {
            debug!(error = %e, "Relay write failed");
            break;
        }
    }
    if let Err(e) = writer.shutdown().await {
        debug!(error = %e, "Relay shutdown failed");
    }
}

/// Runs one chunk through the module on the blocking pool
async fn transform(
    instance: Arc<Mutex<ModuleInstance>>,
    direction: Direction,
    mut chunk: Vec<u8>,
) -> crate::Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || {
        let mut guard = instance
            .lock()
            .map_err(|_| HarnessError::Module("module instance lock poisoned".to_string()))?;
        guard.transform(direction, &mut chunk)?;
        Ok::<_, HarnessError>(chunk)
    })
    .await
    .map_err(|e| HarnessError::Module(format!("module call failed: {e}")))?
}

impl AsyncRead for ModuleConn {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_read(cx, buf)
    }
}

impl AsyncWrite for ModuleConn {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.io).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_shutdown(cx)
    }
}

impl Connection for ModuleConn {
    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.local_addr)
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.peer_addr)
    }
}
