use anyhow::Result;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::ffi::c_void;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use tether_link::{
    conn_request_trampoline, dropped_callbacks, get_registry, outstanding_address_buffers,
    ConnectionRequest, Listener, ListenerError, ListenerParams, ListenerState, LoopbackTransport,
    TetherError,
};

// Registry and buffer counters are process-wide
static REGISTRY_TEST_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn peer(port: u16) -> SocketAddr {
    SocketAddr::from(([10, 0, 0, 1], port))
}

#[test]
fn test_reject_all_handler_lifecycle() -> Result<()> {
    let _lock = REGISTRY_TEST_MUTEX.lock();
    init_tracing();
    let registry_before = get_registry().count();
    let buffers_before = outstanding_address_buffers();

    let transport = Arc::new(LoopbackTransport::new());
    let mut params = ListenerParams::new();
    params
        .set_socket_address(("127.0.0.1".parse::<std::net::IpAddr>()?, 9000))?
        .set_connection_handler(|req: ConnectionRequest| {
            let _ = req.reject();
        });

    let mut listener = Listener::create(params, transport.clone())?;
    assert_eq!(listener.state(), ListenerState::Listening);
    assert_eq!(get_registry().count(), registry_before + 1);

    let native = listener.native_id().expect("listening");
    transport.inject_connection(native, peer(40000))?;

    assert_eq!(transport.rejected_count(), 1);
    assert_eq!(transport.accepted_count(), 0);
    assert_eq!(listener.stats().rejected, 1);

    listener.close()?;
    assert_eq!(get_registry().count(), registry_before);
    assert_eq!(outstanding_address_buffers(), buffers_before);
    assert_eq!(transport.listener_count(), 0);
    Ok(())
}

#[test]
fn test_late_callback_after_close_is_dropped() -> Result<()> {
    let _lock = REGISTRY_TEST_MUTEX.lock();
    init_tracing();

    let invoked = Arc::new(AtomicUsize::new(0));
    let counter = invoked.clone();
    let transport = Arc::new(LoopbackTransport::new());
    let mut params = ListenerParams::new();
    params
        .set_socket_address("127.0.0.1:9001".parse::<SocketAddr>()?)?
        .set_connection_handler(move |req: ConnectionRequest| {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = req.reject();
        });

    let mut listener = Listener::create(params, transport.clone())?;
    let context = listener.handle().expect("handler installed").into_ptr();
    listener.close()?;

    // The native side still holds the old context and fires anyway
    let dropped_before = dropped_callbacks();
    unsafe { conn_request_trampoline(0x1234usize as *mut c_void, context) };

    assert_eq!(invoked.load(Ordering::SeqCst), 0);
    assert_eq!(dropped_callbacks(), dropped_before + 1);
    Ok(())
}

#[test]
fn test_missing_address_registers_nothing() {
    let _lock = REGISTRY_TEST_MUTEX.lock();
    let registry_before = get_registry().count();

    let transport = Arc::new(LoopbackTransport::new());
    let mut params = ListenerParams::new();
    params.set_connection_handler(|_req: ConnectionRequest| {});

    let err = Listener::create(params, transport.clone()).unwrap_err();
    assert_eq!(err, ListenerError::MissingAddress);
    assert_eq!(err.code(), TetherError::MissingAddress);
    assert_eq!(get_registry().count(), registry_before);
    assert_eq!(transport.listener_count(), 0);
}

#[test]
fn test_native_failure_rolls_back() {
    let _lock = REGISTRY_TEST_MUTEX.lock();
    let registry_before = get_registry().count();
    let buffers_before = outstanding_address_buffers();

    let transport = Arc::new(LoopbackTransport::new());
    transport.fail_next_create(TetherError::NativeCreateFailed);

    let mut params = ListenerParams::new();
    params
        .set_socket_address("[::1]:9002".parse::<SocketAddr>().unwrap())
        .unwrap()
        .set_connection_handler(|_req: ConnectionRequest| {});

    let err = Listener::create(params, transport.clone()).unwrap_err();
    assert_eq!(err, ListenerError::NativeCreateFailed(TetherError::NativeCreateFailed));
    assert!(err.code().is_retryable());
    assert_eq!(get_registry().count(), registry_before);
    assert_eq!(outstanding_address_buffers(), buffers_before);
    assert_eq!(transport.listener_count(), 0);
}

#[test]
fn test_request_decided_once() -> Result<()> {
    let _lock = REGISTRY_TEST_MUTEX.lock();
    init_tracing();

    let outcomes: Arc<Mutex<Vec<ListenerError>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = outcomes.clone();
    let transport = Arc::new(LoopbackTransport::new());
    let mut params = ListenerParams::new();
    params
        .set_socket_address("127.0.0.1:9003".parse::<SocketAddr>()?)?
        .set_connection_handler(move |req: ConnectionRequest| {
            let endpoint = req.accept().expect("first decision");
            assert_eq!(endpoint.peer_address(), Some(peer(40001)));
            sink.lock().push(req.accept().unwrap_err());
            sink.lock().push(req.reject().unwrap_err());
            sink.lock().push(req.query().unwrap_err());
        });

    let listener = Listener::create(params, transport.clone())?;
    let native = listener.native_id().expect("listening");
    let request = transport.inject_connection(native, peer(40001))?;

    let outcomes = outcomes.lock();
    assert_eq!(outcomes.len(), 3);
    for err in outcomes.iter() {
        assert_eq!(*err, ListenerError::AlreadyConsumed(request));
    }

    let stats = listener.stats();
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.rejected, 0);
    assert_eq!(stats.auto_rejected, 0);
    assert_eq!(transport.accepted_count(), 1);
    assert_eq!(transport.rejected_count(), 0);
    Ok(())
}

#[test]
fn test_request_outlives_handler_call() -> Result<()> {
    let _lock = REGISTRY_TEST_MUTEX.lock();

    let parked: Arc<Mutex<Vec<ConnectionRequest>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = parked.clone();
    let transport = Arc::new(LoopbackTransport::new());
    let mut params = ListenerParams::new();
    params
        .set_socket_address("127.0.0.1:9004".parse::<SocketAddr>()?)?
        .set_connection_handler(move |req: ConnectionRequest| sink.lock().push(req));

    let listener = Listener::create(params, transport.clone())?;
    let native = listener.native_id().expect("listening");
    transport.inject_connection(native, peer(1))?;
    transport.inject_connection(native, peer(2))?;
    assert_eq!(transport.pending_requests(), 2);

    // Decide on another thread, after the callbacks returned
    let worker = thread::spawn(move || -> Result<()> {
        let mut requests = parked.lock();
        let second = requests.pop().expect("parked");
        assert_eq!(second.query()?.client_address, peer(2));
        let mut endpoint = second.accept()?;
        endpoint.close()?;
        // First is dropped undecided
        requests.clear();
        Ok(())
    });
    worker.join().expect("worker panicked")?;

    let stats = listener.stats();
    assert_eq!(stats.requests, 2);
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.auto_rejected, 1);
    assert_eq!(stats.decided(), 2);
    assert_eq!(transport.pending_requests(), 0);
    assert_eq!(transport.endpoint_count(), 0);
    Ok(())
}

#[test]
fn test_concurrent_callbacks() -> Result<()> {
    let _lock = REGISTRY_TEST_MUTEX.lock();

    let transport = Arc::new(LoopbackTransport::new());
    let mut params = ListenerParams::new();
    params
        .set_socket_address("0.0.0.0:0".parse::<SocketAddr>()?)?
        .set_connection_handler(|req: ConnectionRequest| {
            let _endpoint = req.accept();
        });
    let listener = Listener::create(params, transport.clone())?;
    let native = listener.native_id().expect("listening");

    let threads: Vec<_> = (0..8u16)
        .map(|t| {
            let transport = transport.clone();
            thread::spawn(move || {
                for i in 0..50u16 {
                    transport
                        .inject_connection(native, peer(t * 100 + i))
                        .expect("listener is live");
                }
            })
        })
        .collect();
    for handle in threads {
        handle.join().expect("injector panicked");
    }

    let stats = listener.stats();
    assert_eq!(stats.requests, 400);
    assert_eq!(stats.accepted, 400);
    assert_eq!(transport.accepted_count(), 400);
    assert_eq!(transport.endpoint_count(), 0);
    Ok(())
}

#[test]
fn test_close_races_callbacks() -> Result<()> {
    let _lock = REGISTRY_TEST_MUTEX.lock();
    let registry_before = get_registry().count();

    let invoked = Arc::new(AtomicUsize::new(0));
    let counter = invoked.clone();
    let transport = Arc::new(LoopbackTransport::new());
    let mut params = ListenerParams::new();
    params
        .set_socket_address("127.0.0.1:9005".parse::<SocketAddr>()?)?
        .set_connection_handler(move |req: ConnectionRequest| {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = req.reject();
        });
    let mut listener = Listener::create(params, transport.clone())?;
    let native = listener.native_id().expect("listening");

    let injectors: Vec<_> = (0..4u16)
        .map(|t| {
            let transport = transport.clone();
            thread::spawn(move || {
                let mut delivered = 0usize;
                while transport.inject_connection(native, peer(t)).is_ok() {
                    delivered += 1;
                }
                delivered
            })
        })
        .collect();

    thread::sleep(std::time::Duration::from_millis(5));
    listener.close()?;

    let delivered: usize = injectors
        .into_iter()
        .map(|h| h.join().expect("injector panicked"))
        .sum();

    // Every callback either reached the handler or was dropped
    assert!(invoked.load(Ordering::SeqCst) <= delivered);
    assert_eq!(listener.stats().requests as usize, invoked.load(Ordering::SeqCst));
    assert_eq!(get_registry().count(), registry_before);
    assert_eq!(listener.query().unwrap_err(), ListenerError::ListenerClosed);
    Ok(())
}

#[test]
fn test_drop_closes_listener() -> Result<()> {
    let _lock = REGISTRY_TEST_MUTEX.lock();
    let registry_before = get_registry().count();
    let buffers_before = outstanding_address_buffers();

    let transport = Arc::new(LoopbackTransport::new());
    {
        let mut params = ListenerParams::new();
        params
            .set_socket_address("127.0.0.1:9006".parse::<SocketAddr>()?)?
            .set_connection_handler(|_req: ConnectionRequest| {});
        let _listener = Listener::create(params, transport.clone())?;
        assert_eq!(transport.listener_count(), 1);
    }

    assert_eq!(transport.listener_count(), 0);
    assert_eq!(get_registry().count(), registry_before);
    assert_eq!(outstanding_address_buffers(), buffers_before);
    Ok(())
}
