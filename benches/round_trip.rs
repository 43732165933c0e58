use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use dialscope::common::{IDENTITY_MODULE_WAT, XOR_MODULE_WAT};
use dialscope::{
    Connection, ModuleProvider, TcpProvider, TransportListener, TransportModule, TransportProvider,
    spawn_echo_server,
};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

const BUFFER_SIZE: usize = 16384;

/// Starts an echo listener behind `provider` and returns a connection to it
async fn connect<P: TransportProvider>(provider: &P, scope: &CancellationToken) -> P::Conn {
    let listener = provider
        .listen(scope, "127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let listener = Arc::new(listener);
    spawn_echo_server(listener.clone(), BUFFER_SIZE);

    // Cancel the dial scope straight away, as the harness does mid-run
    let dial_scope = scope.child_token();
    let conn = provider.dial(&dial_scope, listener.local_addr()).await.unwrap();
    dial_scope.cancel();
    conn
}

async fn round_trip<C: Connection>(conn: &mut C, data: &[u8], response: &mut [u8]) {
    conn.write_all(data).await.unwrap();
    conn.read_exact(response).await.unwrap();
}

fn bench_provider<P: TransportProvider>(
    c: &mut Criterion,
    rt: &Runtime,
    name: &str,
    provider: &P,
    scope: &CancellationToken,
) {
    let mut group = c.benchmark_group("round_trip");
    let mut conn = rt.block_on(connect(provider, scope));

    for size in [64, 256, 1024, 4096, 16384] {
        let data = vec![b'x'; size];
        let mut response = vec![0u8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
            b.iter(|| rt.block_on(round_trip(&mut conn, black_box(&data), &mut response)));
        });
    }

    group.finish();
}

fn bench_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let scope = CancellationToken::new();

    bench_provider(c, &rt, "tcp", &TcpProvider::new(), &scope);

    for (name, wat) in [("module_plain", IDENTITY_MODULE_WAT), ("module_xor", XOR_MODULE_WAT)] {
        let module = TransportModule::from_bytes(wat.as_bytes()).unwrap();
        let provider = ModuleProvider::new(module, scope.clone(), BUFFER_SIZE);
        bench_provider(c, &rt, name, &provider, &scope);
    }

    scope.cancel();
}

criterion_group!(benches, bench_round_trip);
criterion_main!(benches);
