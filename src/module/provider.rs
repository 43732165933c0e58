use super::{ModuleConn, TransportModule};
use crate::common::{TransportListener, TransportProvider};
use crate::tcp::TcpTransportListener;
use crate::tcp::provider::connect;
use crate::{DialError, Result};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Provider that carries every connection through a WebAssembly transport module
///
/// Relay tasks of every connection, dialled or accepted, are bound to the
/// scope the provider was created with. The scope handed to
/// [`dial`](TransportProvider::dial) only governs the dial itself.
#[derive(Debug, Clone)]
pub struct ModuleProvider {
    module: TransportModule,
    scope: CancellationToken,
    buffer_size: usize,
}

impl ModuleProvider {
    pub fn new(module: TransportModule, scope: CancellationToken, buffer_size: usize) -> Self {
        Self {
            module,
            scope,
            buffer_size,
        }
    }

    /// Loads the module at `path` and builds a provider on top of it
    pub async fn load(path: &Path, scope: CancellationToken, buffer_size: usize) -> Result<Self> {
        let module = TransportModule::load(path).await?;
        Ok(Self::new(module, scope, buffer_size))
    }
}

#[async_trait]
impl TransportProvider for ModuleProvider {
    type Conn = ModuleConn;
    type Listener = ModuleListener;

    fn name(&self) -> &'static str {
        "module"
    }

    async fn listen(&self, scope: &CancellationToken, addr: SocketAddr) -> Result<ModuleListener> {
        let inner = TcpTransportListener::bind(scope, addr).await?;
        Ok(ModuleListener {
            inner,
            module: self.module.clone(),
            relay_scope: self.scope.clone(),
            buffer_size: self.buffer_size,
        })
    }

    async fn dial(
        &self,
        scope: &CancellationToken,
        addr: SocketAddr,
    ) -> std::result::Result<ModuleConn, DialError> {
        let stream = connect(scope, addr).await?;
        let instance = self
            .module
            .instantiate()
            .map_err(|e| DialError::Handshake(e.to_string()))?;

        // Last point at which the dial scope may still abort the connection
        if scope.is_cancelled() {
            debug!(%addr, "Dial cancelled during handshake");
            return Err(DialError::Cancelled);
        }

        ModuleConn::spawn(stream, instance, &self.scope, self.buffer_size)
            .map_err(|e| DialError::Handshake(format!("failed to start relay: {e}")))
    }
}

/// Listener whose accepted connections are carried through the transport module
pub struct ModuleListener {
    inner: TcpTransportListener,
    module: TransportModule,
    relay_scope: CancellationToken,
    buffer_size: usize,
}

#[async_trait]
impl TransportListener for ModuleListener {
    type Conn = ModuleConn;

    async fn accept(&self) -> Result<(ModuleConn, SocketAddr)> {
        let (stream, addr) = self.inner.accept_stream().await?;
        let instance = self.module.instantiate()?;
        let conn = ModuleConn::spawn(stream, instance, &self.relay_scope, self.buffer_size)?;
        Ok((conn, addr))
    }

    fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr()
    }

    fn close(&self) {
        self.inner.close();
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}
