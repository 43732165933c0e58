use dialscope::common::XOR_MODULE_WAT;
use dialscope::{
    ModuleProvider, TcpProvider, TransportListener, TransportModule, TransportProvider,
    spawn_echo_server,
};
use proptest::prelude::*;
use std::sync::{Arc, OnceLock};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

const BUFFER_SIZE: usize = 1024;

fn xor_module() -> TransportModule {
    static MODULE: OnceLock<TransportModule> = OnceLock::new();
    MODULE
        .get_or_init(|| TransportModule::from_bytes(XOR_MODULE_WAT.as_bytes()).unwrap())
        .clone()
}

/// Sends `data` through an echo responder behind `provider`, cancelling the
/// dial scope before the exchange, and returns what came back
async fn echo_through<P: TransportProvider>(
    provider: &P,
    scope: &CancellationToken,
    data: &[u8],
) -> Result<Vec<u8>, TestCaseError> {
    let listener = provider
        .listen(scope, "127.0.0.1:0".parse().unwrap())
        .await
        .map_err(|e| TestCaseError::fail(format!("Listen failed: {}", e)))?;
    let listener = Arc::new(listener);
    spawn_echo_server(listener.clone(), BUFFER_SIZE);

    let dial_scope = scope.child_token();
    let mut conn = provider
        .dial(&dial_scope, listener.local_addr())
        .await
        .map_err(|e| TestCaseError::fail(format!("Dial failed: {}", e)))?;
    dial_scope.cancel();

    conn.write_all(data)
        .await
        .map_err(|e| TestCaseError::fail(format!("Write failed: {}", e)))?;
    let mut response = vec![0u8; data.len()];
    conn.read_exact(&mut response)
        .await
        .map_err(|e| TestCaseError::fail(format!("Read failed: {}", e)))?;

    listener.close();
    Ok(response)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: the echo responder returns exactly the bytes sent over TCP
    #[test]
    fn tcp_echo_preserves_data(data in prop::collection::vec(any::<u8>(), 1..=BUFFER_SIZE)) {
        tokio_test::block_on(async {
            let scope = CancellationToken::new();
            let response = echo_through(&TcpProvider::new(), &scope, &data).await?;
            prop_assert_eq!(response, data);
            Ok(())
        })?;
    }

    /// Property: the module-backed provider is byte-for-byte transparent
    #[test]
    fn module_echo_preserves_data(data in prop::collection::vec(any::<u8>(), 1..=BUFFER_SIZE)) {
        tokio_test::block_on(async {
            let scope = CancellationToken::new();
            let provider = ModuleProvider::new(xor_module(), scope.clone(), BUFFER_SIZE);
            let response = echo_through(&provider, &scope, &data).await?;
            scope.cancel();
            prop_assert_eq!(response, data);
            Ok(())
        })?;
    }

    /// Property: a cancelled dial scope never yields a connection
    #[test]
    fn dial_on_cancelled_scope_always_fails(use_module in any::<bool>()) {
        tokio_test::block_on(async {
            let scope = CancellationToken::new();
            let dial_scope = scope.child_token();
            dial_scope.cancel();

            let failed = if use_module {
                let provider = ModuleProvider::new(xor_module(), scope.clone(), BUFFER_SIZE);
                let listener = provider.listen(&scope, "127.0.0.1:0".parse().unwrap()).await
                    .map_err(|e| TestCaseError::fail(format!("Listen failed: {}", e)))?;
                provider.dial(&dial_scope, listener.local_addr()).await.is_err()
            } else {
                let provider = TcpProvider::new();
                let listener = provider.listen(&scope, "127.0.0.1:0".parse().unwrap()).await
                    .map_err(|e| TestCaseError::fail(format!("Listen failed: {}", e)))?;
                provider.dial(&dial_scope, listener.local_addr()).await.is_err()
            };

            prop_assert!(failed);
            Ok(())
        })?;
    }
}
