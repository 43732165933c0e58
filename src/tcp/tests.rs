use crate::common::{TransportListener, TransportProvider};
use crate::{DialError, HarnessError, TcpProvider};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

fn any_local() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

#[tokio::test]
async fn test_dial_connects_to_listener() {
    let scope = CancellationToken::new();
    let provider = TcpProvider::new();
    let listener = provider.listen(&scope, any_local()).await.unwrap();

    let dial_scope = scope.child_token();
    let mut client = provider.dial(&dial_scope, listener.local_addr()).await.unwrap();
    let (mut server, peer) = listener.accept().await.unwrap();
    assert_eq!(peer, client.local_addr().unwrap());

    client.write_all(b"ping").await.unwrap();
    let mut buf = [0u8; 4];
    server.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"ping");
}

#[tokio::test]
async fn test_connection_survives_dial_scope_cancel() {
    let scope = CancellationToken::new();
    let provider = TcpProvider::new();
    let listener = provider.listen(&scope, any_local()).await.unwrap();

    let dial_scope = scope.child_token();
    let mut client = provider.dial(&dial_scope, listener.local_addr()).await.unwrap();
    let (mut server, _) = listener.accept().await.unwrap();

    dial_scope.cancel();
    tokio::time::sleep(Duration::from_millis(20)).await;

    client.write_all(b"after cancel").await.unwrap();
    let mut buf = [0u8; 12];
    server.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"after cancel");
    assert!(!scope.is_cancelled());
    assert!(!listener.is_closed());
}

#[tokio::test]
async fn test_dial_on_cancelled_scope_fails() {
    let scope = CancellationToken::new();
    let provider = TcpProvider::new();
    let listener = provider.listen(&scope, any_local()).await.unwrap();

    let dial_scope = scope.child_token();
    dial_scope.cancel();

    let result = tokio::time::timeout(
        Duration::from_secs(1),
        provider.dial(&dial_scope, listener.local_addr()),
    )
    .await
    .expect("dial on a cancelled scope must not hang");
    assert!(matches!(result, Err(DialError::Cancelled)));
}

#[tokio::test]
async fn test_dial_unreachable_address_fails() {
    let scope = CancellationToken::new();
    let provider = TcpProvider::new();
    let addr = {
        let listener = provider.listen(&scope, any_local()).await.unwrap();
        listener.local_addr()
    };

    let result = provider.dial(&scope, addr).await;
    assert!(matches!(result, Err(DialError::Connect { addr: a, .. }) if a == addr));
}

#[tokio::test]
async fn test_close_fails_pending_accept() {
    let scope = CancellationToken::new();
    let provider = TcpProvider::new();
    let listener = Arc::new(provider.listen(&scope, any_local()).await.unwrap());

    let pending = {
        let listener = listener.clone();
        tokio::spawn(async move { listener.accept().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    listener.close();
    listener.close();

    let result = tokio::time::timeout(Duration::from_secs(1), pending)
        .await
        .expect("pending accept must return after close")
        .unwrap();
    assert!(matches!(result, Err(HarnessError::ListenerClosed)));
    assert!(listener.is_closed());
    assert!(matches!(listener.accept().await, Err(HarnessError::ListenerClosed)));
}

#[tokio::test]
async fn test_process_scope_cancel_closes_listener() {
    let scope = CancellationToken::new();
    let provider = TcpProvider::new();
    let listener = provider.listen(&scope, any_local()).await.unwrap();

    scope.cancel();

    assert!(listener.is_closed());
    assert!(matches!(listener.accept().await, Err(HarnessError::ListenerClosed)));
}

#[tokio::test]
async fn test_listen_bind_failure_is_setup_error() {
    let scope = CancellationToken::new();
    let provider = TcpProvider::new();
    let taken = provider.listen(&scope, any_local()).await.unwrap();

    let result = provider.listen(&scope, taken.local_addr()).await;
    assert!(matches!(result, Err(HarnessError::Setup(_))));
}
