use crate::Result;
use crate::common::Connection;
use std::io::ErrorKind;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};

/// Echoes everything read from `conn` back into it
///
/// Assumes the peer writes first. Returns `Ok(())` when the peer closes the
/// connection, and the first read or write error otherwise. The connection is
/// shut down and dropped before returning in every case.
pub async fn echo<C: Connection>(mut conn: C, buffer_size: usize) -> Result<()> {
    let mut buffer = vec![0; buffer_size];
    let result = echo_loop(&mut conn, &mut buffer).await;
    if let Err(e) = conn.shutdown().await {
        debug!(error = %e, "Shutdown after echo failed");
    }
    result
}

async fn echo_loop<C: Connection>(conn: &mut C, buffer: &mut [u8]) -> Result<()> {
    loop {
        let n = conn.read(buffer).await?;
        if n == 0 {
            info!("Peer closed connection");
            return Ok(());
        }

        debug!(size = n, preview = %String::from_utf8_lossy(&buffer[..n]), "Received data");

        match conn.write_all(&buffer[..n]).await {
            Ok(()) => {}
            Err(e) if peer_gone(&e) => {
                info!(error = %e, "Peer went away before echo");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
        conn.flush().await?;
        debug!(size = n, "Echoed data");
    }
}

fn peer_gone(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::BrokenPipe | ErrorKind::ConnectionReset)
}
