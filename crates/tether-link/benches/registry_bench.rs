//! Handle Registry and Dispatch Benchmarks
//!
//! # Scenarios
//!
//! 1. **Register/Revoke**: Cost of packing and unpacking one object
//! 2. **Resolve Hit**: Callback context lookup for a live listener
//! 3. **Resolve Miss**: Late callback after revocation
//! 4. **Dispatch**: Full loopback round trip through the trampoline

use std::net::SocketAddr;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tether_link::{
    ConnectionRequest, HandleRegistry, Listener, ListenerParams, LoopbackTransport,
};

fn bench_register_revoke(c: &mut Criterion) {
    let registry: HandleRegistry<u64> = HandleRegistry::new();

    c.bench_function("registry/register_revoke", |b| {
        b.iter(|| {
            let handle = registry.register(Arc::new(black_box(7u64)));
            black_box(registry.revoke(handle))
        })
    });
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry/resolve");

    for live in [1usize, 64, 4096] {
        let registry: HandleRegistry<u64> = HandleRegistry::new();
        let handles: Vec<_> = (0..live as u64)
            .map(|n| registry.register(Arc::new(n)))
            .collect();
        let target = handles[live / 2].into_ptr();

        group.bench_with_input(BenchmarkId::new("hit", live), &target, |b, &ptr| {
            b.iter(|| black_box(registry.resolve_ptr(black_box(ptr))))
        });

        let stale = registry.register(Arc::new(0));
        registry.revoke(stale);
        let stale = stale.into_ptr();
        group.bench_with_input(BenchmarkId::new("miss", live), &stale, |b, &ptr| {
            b.iter(|| black_box(registry.resolve_ptr(black_box(ptr))))
        });
    }

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let transport = Arc::new(LoopbackTransport::new());
    let mut params = ListenerParams::new();
    params
        .set_socket_address(SocketAddr::from(([127, 0, 0, 1], 0)))
        .expect("IPv4 is supported")
        .set_connection_handler(|req: ConnectionRequest| {
            let _ = req.reject();
        });
    let listener = Listener::create(params, transport.clone()).expect("loopback create");
    let native = listener.native_id().expect("listening");
    let peer = SocketAddr::from(([10, 0, 0, 1], 40000));

    c.bench_function("listener/dispatch_reject", |b| {
        b.iter(|| black_box(transport.inject_connection(native, peer)))
    });
}

criterion_group!(benches, bench_register_revoke, bench_resolve, bench_dispatch);
criterion_main!(benches);
