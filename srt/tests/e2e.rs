//! End-to-end loopback scenarios against a real SRT listener and client
//! socket. These exercise the full stack (facade, server loop, connection
//! handle, chunked I/O) together rather than any one component in
//! isolation.

use std::{sync::Arc, time::Duration};

use rand::RngCore;
use srt::{
    config::Config,
    facade::Facade,
    io::WritePacing,
    server::{Server, ServerEvent},
};
use tokio::sync::oneshot;

fn ensure_startup() {
    static ONCE: std::sync::Once = std::sync::Once::new();
    ONCE.call_once(|| {
        srt::startup().expect("native srt_startup should succeed");
    });
}

async fn spawn_server(port: u16) -> Arc<Server> {
    let config = Config::new(port).expect("valid port");
    srt::listen(config).await.expect("server should come up")
}

/// Registers a one-shot listener for the next `connection` event on
/// `server` and returns its receiver. Registration happens synchronously,
/// before this function returns - callers must call this *before*
/// connecting a client, then `.await` the receiver afterward, or the
/// event can fire before anything is listening for it.
fn next_connection(server: &Arc<Server>) -> oneshot::Receiver<Arc<srt::connection::Connection>> {
    let (tx, rx) = oneshot::channel();
    let tx = parking_lot::Mutex::new(Some(tx));
    server.on_event(move |event| {
        if let ServerEvent::Connection(conn) = event {
            if let Some(tx) = tx.lock().take() {
                let _ = tx.send(conn.clone());
            }
        }
    });
    rx
}

async fn connect_client(facade: &Facade, addr: std::net::SocketAddr) -> i32 {
    let fd = facade
        .create_socket()
        .await
        .expect("client socket create should succeed");
    facade
        .set_sockopt(
            fd,
            srt::native::SockOpt::MESSAGEAPI,
            srt::native::OptValue::Bool(true),
        )
        .await
        .expect("set messageapi should succeed");
    facade
        .connect(fd, addr)
        .await
        .expect("client connect should succeed");
    fd
}

#[tokio::test]
async fn loopback_one_shot_yielding_loop() {
    ensure_startup();
    let server = spawn_server(9100).await;
    let accepted = next_connection(&server);

    let client_facade = Facade::spawn("e2e-client-yielding");
    let client_fd = connect_client(&client_facade, server.local_addr()).await;

    let server_conn = accepted.await.expect("a connection event should arrive");

    let mut payload = vec![0u8; 60000];
    rand::thread_rng().fill_bytes(&mut payload);
    let expected = payload.clone();

    let client_io = srt::io::ChunkedIo::new(client_facade.clone(), client_fd);
    let send = tokio::spawn(async move {
        client_io
            .write_chunks(payload, 1316, 8, WritePacing::YieldingLoop)
            .await
            .expect("write_chunks should complete")
    });

    let reader = server_conn.get_reader_writer();
    let received = reader
        .read_chunks(expected.len(), 4096, |_| {}, |_| {})
        .await;
    let received: Vec<u8> = received.into_iter().flatten().collect();

    send.await.expect("sender task should not panic");
    assert_eq!(received, expected);

    server_conn.close().await.ok();
    client_facade.dispose();
    server.dispose().await;
}

#[tokio::test]
async fn loopback_explicit_scheduling() {
    ensure_startup();
    let server = spawn_server(9101).await;
    let accepted = next_connection(&server);

    let client_facade = Facade::spawn("e2e-client-explicit");
    let client_fd = connect_client(&client_facade, server.local_addr()).await;

    let server_conn = accepted.await.expect("a connection event should arrive");

    let mut payload = vec![0u8; 60000];
    rand::thread_rng().fill_bytes(&mut payload);
    let expected = payload.clone();

    let client_io = srt::io::ChunkedIo::new(client_facade.clone(), client_fd);
    let send = tokio::spawn(async move {
        client_io
            .write_chunks(payload, 1316, 8, WritePacing::ExplicitScheduling)
            .await
            .expect("write_chunks should complete")
    });

    let reader = server_conn.get_reader_writer();
    let received = reader
        .read_chunks(expected.len(), 4096, |_| {}, |_| {})
        .await;
    let received: Vec<u8> = received.into_iter().flatten().collect();

    send.await.expect("sender task should not panic");
    assert_eq!(received, expected);

    server_conn.close().await.ok();
    client_facade.dispose();
    server.dispose().await;
}

#[tokio::test]
async fn accept_then_disconnect_empties_connection_table() {
    ensure_startup();
    let server = spawn_server(9102).await;
    let accepted = next_connection(&server);

    let client_facade = Facade::spawn("e2e-client-disconnect");
    let client_fd = connect_client(&client_facade, server.local_addr()).await;

    let server_conn = accepted.await.expect("a connection event should arrive");
    assert!(!server_conn.is_closed());

    client_facade.close(client_fd).await.ok();
    client_facade.dispose();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(server_conn.is_closed());

    server.dispose().await;
}

#[tokio::test]
async fn timeout_without_leak_then_eventual_connection() {
    ensure_startup();
    let server = spawn_server(9103).await;

    let raw_facade = Facade::spawn("e2e-timeout-probe");
    let probe_fd = raw_facade
        .create_socket()
        .await
        .expect("probe socket create should succeed");
    raw_facade
        .bind(probe_fd, "127.0.0.1:9104".parse().unwrap())
        .await
        .expect("probe bind should succeed");
    raw_facade
        .listen(probe_fd, 1)
        .await
        .expect("probe listen should succeed");
    let probe_result = raw_facade
        .call_with_timeout(
            srt::runner::Method::Accept { fd: probe_fd },
            Some(Duration::from_millis(100)),
        )
        .await;
    assert!(matches!(
        probe_result,
        Err(srt::error::FacadeError::Timeout)
    ));

    // The probe never had its options applied, so SRTO_RCVSYN is still
    // true and the accept above is blocking the worker thread at the
    // native layer even though the future just timed out. Connect a
    // peer to push the worker past it before issuing anything else on
    // this facade, or the close below queues up behind it forever.
    let probe_peer = Facade::spawn("e2e-timeout-probe-peer");
    let probe_peer_fd = probe_peer
        .create_socket()
        .await
        .expect("probe peer socket create should succeed");
    probe_peer
        .connect(probe_peer_fd, "127.0.0.1:9104".parse().unwrap())
        .await
        .expect("probe peer connect should succeed");

    raw_facade.close(probe_fd).await.ok();
    raw_facade.dispose();
    probe_peer.close(probe_peer_fd).await.ok();
    probe_peer.dispose();

    let accepted = next_connection(&server);
    let client_facade = Facade::spawn("e2e-timeout-client");
    let _client_fd = connect_client(&client_facade, server.local_addr()).await;
    let server_conn = accepted.await.expect("a connection event should arrive");
    assert!(!server_conn.is_closed());

    server_conn.close().await.ok();
    client_facade.dispose();
    server.dispose().await;
}

#[tokio::test]
async fn dispose_during_pending_clears_callbacks_without_firing_them() {
    ensure_startup();
    let facade = Facade::spawn("e2e-dispose-pending");
    let fd = facade.create_socket().await.expect("create should succeed");
    facade
        .bind(fd, "127.0.0.1:0".parse().unwrap())
        .await
        .expect("bind should succeed");
    facade
        .listen(fd, 1)
        .await
        .expect("listen should succeed");

    let pending_facade = facade.clone();
    let pending = tokio::spawn(async move {
        pending_facade
            .call_with_timeout(
                srt::runner::Method::Accept { fd },
                Some(Duration::from_secs(5)),
            )
            .await
    });

    // Give the accept call a moment to actually be in flight before we
    // dispose out from under it.
    tokio::time::sleep(Duration::from_millis(50)).await;
    facade.dispose();

    let result = pending.await.expect("task should not panic");
    assert!(matches!(
        result,
        Err(srt::error::FacadeError::WorkerGone) | Err(srt::error::FacadeError::Timeout)
    ));

    let resubmit = facade.create_socket().await;
    assert!(matches!(
        resubmit,
        Err(srt::error::FacadeError::Disposed)
    ));
}

#[tokio::test]
async fn option_batch_returns_before_open_succeeds() {
    ensure_startup();
    let facade = Facade::spawn("e2e-option-batch");
    let fd = facade.create_socket().await.expect("create should succeed");

    let results = facade
        .set_socket_flags(
            fd,
            vec![
                (
                    srt::native::SockOpt::MESSAGEAPI,
                    srt::native::OptValue::Bool(true),
                ),
                (
                    srt::native::SockOpt::PAYLOADSIZE,
                    srt::native::OptValue::U32(1316),
                ),
            ],
        )
        .await
        .expect("batch submission should not fail at the facade level");

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| matches!(r, Ok(true))));

    facade
        .bind(fd, "127.0.0.1:0".parse().unwrap())
        .await
        .expect("bind should succeed after the option batch");
    facade
        .listen(fd, 1)
        .await
        .expect("listen should succeed after the option batch");

    facade.close(fd).await.ok();
    facade.dispose();
}
