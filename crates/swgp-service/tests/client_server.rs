// ============================================
// File: crates/swgp-service/tests/client_server.rs
// ============================================
//! End-to-end relay tests over loopback.
//!
//! ```text
//! wg_client ──► client relay ──► server relay ──► wg_server
//! ```
//! Both WireGuard ends are plain UDP sockets.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;

use swgp_core::{ProxyMode, Psk};
use swgp_service::{Config, Manager, Role, RoleDescriptor, ServiceError};

const RECV_TIMEOUT: Duration = Duration::from_secs(3);

struct Pair {
    server: Manager,
    client: Manager,
    wg_server: UdpSocket,
    client_addr: SocketAddr,
    server_addr: SocketAddr,
}

impl Pair {
    async fn start(mode: ProxyMode) -> Self {
        Self::start_with(mode, |d| d).await
    }

    async fn start_with(mode: ProxyMode, tune: impl Fn(RoleDescriptor) -> RoleDescriptor) -> Self {
        let psk = Psk::generate();
        let wg_server = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let server = Manager::new(vec![tune(RoleDescriptor::new(
            "wg0",
            Role::Server,
            "127.0.0.1:0".parse().unwrap(),
            wg_server.local_addr().unwrap(),
            mode,
            psk.clone(),
        ))])
        .unwrap();
        server.start().await.unwrap();
        let server_addr = server.local_addr(Role::Server, "wg0").unwrap();

        let client = Manager::new(vec![tune(RoleDescriptor::new(
            "wg0",
            Role::Client,
            "127.0.0.1:0".parse().unwrap(),
            server_addr,
            mode,
            psk,
        ))])
        .unwrap();
        client.start().await.unwrap();
        let client_addr = client.local_addr(Role::Client, "wg0").unwrap();

        Self {
            server,
            client,
            wg_server,
            client_addr,
            server_addr,
        }
    }

    fn server_sessions(&self) -> usize {
        self.server.instances()[0].session_count()
    }

    async fn stop(&self) {
        self.client.stop().await;
        self.server.stop().await;
    }
}

async fn wg_client() -> UdpSocket {
    UdpSocket::bind("127.0.0.1:0").await.unwrap()
}

async fn recv(socket: &UdpSocket) -> (Vec<u8>, SocketAddr) {
    let mut buf = vec![0u8; 65535];
    let (len, from) = timeout(RECV_TIMEOUT, socket.recv_from(&mut buf))
        .await
        .expect("timed out waiting for datagram")
        .unwrap();
    buf.truncate(len);
    (buf, from)
}

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + len) as u8).collect()
}

async fn handshake(mode: ProxyMode) {
    let pair = Pair::start(mode).await;
    let wg = wg_client().await;

    let initiation = payload(148);
    wg.send_to(&initiation, pair.client_addr).await.unwrap();
    let (received, relay_src) = recv(&pair.wg_server).await;
    assert_eq!(received, initiation);

    let response = payload(92);
    pair.wg_server.send_to(&response, relay_src).await.unwrap();
    let (received, from) = recv(&wg).await;
    assert_eq!(received, response);
    assert_eq!(from, pair.client_addr);

    assert_eq!(pair.server_sessions(), 1);
    pair.stop().await;
}

#[tokio::test]
async fn test_handshake_zero_overhead() {
    handshake(ProxyMode::ZeroOverhead).await;
}

#[tokio::test]
async fn test_handshake_paranoid() {
    handshake(ProxyMode::Paranoid).await;
}

/// Receives two datagrams in whichever order they arrive, shortest first.
async fn recv_pair(socket: &UdpSocket) -> ([Vec<u8>; 2], SocketAddr) {
    let (first, from) = recv(socket).await;
    let (second, _) = recv(socket).await;
    let mut pair = [first, second];
    pair.sort_by_key(Vec::len);
    (pair, from)
}

/// Sends a 2048-byte then a 1024-byte datagram each way through a relay
/// pair; both must arrive intact in both directions.
async fn big_then_small_through(wg: &UdpSocket, relay: SocketAddr, wg_server: &UdpSocket) {
    let big = payload(2048);
    let small = payload(1024);

    wg.send_to(&big, relay).await.unwrap();
    wg.send_to(&small, relay).await.unwrap();
    let ([received_small, received_big], relay_src) = recv_pair(wg_server).await;
    assert_eq!(received_small, small);
    assert_eq!(received_big, big);

    wg_server.send_to(&big, relay_src).await.unwrap();
    wg_server.send_to(&small, relay_src).await.unwrap();
    let ([received_small, received_big], _) = recv_pair(wg).await;
    assert_eq!(received_small, small);
    assert_eq!(received_big, big);
}

async fn big_then_small(mode: ProxyMode) {
    let pair = Pair::start(mode).await;
    let wg = wg_client().await;

    big_then_small_through(&wg, pair.client_addr, &pair.wg_server).await;

    pair.stop().await;
}

#[tokio::test]
async fn test_big_then_small_zero_overhead() {
    big_then_small(ProxyMode::ZeroOverhead).await;
}

#[tokio::test]
async fn test_big_then_small_paranoid() {
    big_then_small(ProxyMode::Paranoid).await;
}

// ============================================
// Single manager from a TOML config
// ============================================

/// Picks two distinct ports that are currently free on all interfaces.
fn free_ports() -> (u16, u16) {
    let first = std::net::UdpSocket::bind("[::]:0").unwrap();
    let second = std::net::UdpSocket::bind("[::]:0").unwrap();
    (
        first.local_addr().unwrap().port(),
        second.local_addr().unwrap().port(),
    )
}

/// Server and client both named `wg0`, in one config and one manager.
fn config_pair(mode: &str, wg_server: SocketAddr) -> (Config, u16, u16) {
    let psk = Psk::generate().to_base64();
    let (server_port, client_port) = free_ports();

    let toml = format!(
        r#"
[[servers]]
name = "wg0"
proxy_listen = ":{server_port}"
proxy_mode = "{mode}"
proxy_psk = "{psk}"
wg_endpoint = "{wg_server}"

[[clients]]
name = "wg0"
wg_listen = ":{client_port}"
proxy_endpoint = "127.0.0.1:{server_port}"
proxy_mode = "{mode}"
proxy_psk = "{psk}"
"#
    );

    (toml.parse().unwrap(), server_port, client_port)
}

async fn config_manager_relays(mode: &str) {
    let wg_server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let (config, server_port, client_port) = config_pair(mode, wg_server.local_addr().unwrap());

    let manager = config.manager().unwrap();
    manager.start().await.unwrap();

    // ":port" listens on every interface
    let server_listen = manager.local_addr(Role::Server, "wg0").unwrap();
    let client_listen = manager.local_addr(Role::Client, "wg0").unwrap();
    assert!(server_listen.ip().is_unspecified());
    assert_eq!(server_listen.port(), server_port);
    assert_eq!(client_listen.port(), client_port);

    let wg = wg_client().await;
    let client_relay: SocketAddr = format!("127.0.0.1:{client_port}").parse().unwrap();

    let initiation = payload(148);
    wg.send_to(&initiation, client_relay).await.unwrap();
    let (received, relay_src) = recv(&wg_server).await;
    assert_eq!(received, initiation);

    let response = payload(92);
    wg_server.send_to(&response, relay_src).await.unwrap();
    let (received, from) = recv(&wg).await;
    assert_eq!(received, response);
    assert_eq!(from.port(), client_port);

    big_then_small_through(&wg, client_relay, &wg_server).await;

    manager.stop().await;
    assert!(!manager.is_running());
}

#[tokio::test]
async fn test_config_manager_zero_overhead() {
    config_manager_relays("zero-overhead").await;
}

#[tokio::test]
async fn test_config_manager_paranoid() {
    config_manager_relays("paranoid").await;
}

#[tokio::test]
async fn test_idle_sessions_evicted_and_recreated() {
    let pair = Pair::start_with(ProxyMode::Paranoid, |d| {
        d.with_session_timeout(Duration::from_millis(200))
            .with_cleanup_interval(Duration::from_millis(50))
    })
    .await;
    let wg = wg_client().await;

    wg.send_to(&payload(148), pair.client_addr).await.unwrap();
    recv(&pair.wg_server).await;
    assert_eq!(pair.server_sessions(), 1);

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(pair.server_sessions(), 0);
    assert_eq!(pair.client.instances()[0].session_count(), 0);

    // A late datagram gets a fresh session on both relays
    wg.send_to(&payload(92), pair.client_addr).await.unwrap();
    let (received, relay_src) = recv(&pair.wg_server).await;
    assert_eq!(received, payload(92));
    assert_eq!(pair.server_sessions(), 1);

    pair.wg_server.send_to(&payload(32), relay_src).await.unwrap();
    let (received, _) = recv(&wg).await;
    assert_eq!(received, payload(32));

    pair.stop().await;
}

#[tokio::test]
async fn test_rebound_client_gets_its_own_replies() {
    let pair = Pair::start(ProxyMode::ZeroOverhead).await;
    let first = wg_client().await;
    let second = wg_client().await;

    first.send_to(&payload(148), pair.client_addr).await.unwrap();
    let (_, first_src) = recv(&pair.wg_server).await;

    // WireGuard rebinding shows up as a new source port
    second.send_to(&payload(149), pair.client_addr).await.unwrap();
    let (received, second_src) = recv(&pair.wg_server).await;
    assert_eq!(received, payload(149));
    assert_ne!(first_src, second_src);

    pair.wg_server.send_to(&payload(60), second_src).await.unwrap();
    let (received, from) = recv(&second).await;
    assert_eq!(received, payload(60));
    assert_eq!(from, pair.client_addr);

    pair.wg_server.send_to(&payload(61), first_src).await.unwrap();
    let (received, _) = recv(&first).await;
    assert_eq!(received, payload(61));

    assert_eq!(pair.client.instances()[0].session_count(), 2);
    pair.stop().await;
}

#[tokio::test]
async fn test_paranoid_server_drops_garbage() {
    let pair = Pair::start(ProxyMode::Paranoid).await;
    let attacker = wg_client().await;

    attacker.send_to(&payload(148), pair.server_addr).await.unwrap();
    attacker.send_to(&[0u8; 10], pair.server_addr).await.unwrap();

    let mut buf = [0u8; 2048];
    let result = timeout(Duration::from_millis(300), pair.wg_server.recv_from(&mut buf)).await;
    assert!(result.is_err(), "garbage must not be forwarded");
    assert_eq!(pair.server_sessions(), 0);

    pair.stop().await;
}

#[tokio::test]
async fn test_start_stop_idempotent() {
    let pair = Pair::start(ProxyMode::ZeroOverhead).await;
    assert!(matches!(
        pair.server.start().await,
        Err(ServiceError::AlreadyRunning)
    ));

    let client_addr = pair.client_addr;
    pair.stop().await;
    pair.stop().await;
    assert!(!pair.client.is_running());

    // Listening port is released
    assert!(UdpSocket::bind(client_addr).await.is_ok());
}

#[tokio::test]
async fn test_failed_start_releases_everything() {
    let reserved = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    let first_addr = reserved.local_addr().unwrap();
    drop(reserved);

    let occupied = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let occupied_addr = occupied.local_addr().unwrap();

    let descriptor = |name: &str, listen: SocketAddr| {
        RoleDescriptor::new(
            name,
            Role::Server,
            listen,
            "127.0.0.1:51820".parse().unwrap(),
            ProxyMode::ZeroOverhead,
            Psk::generate(),
        )
    };
    let manager = Manager::new(vec![
        descriptor("first", first_addr),
        descriptor("second", occupied_addr),
    ])
    .unwrap();

    let err = manager.start().await.unwrap_err();
    assert!(matches!(err, ServiceError::Bind { .. }));
    assert!(err.to_string().contains("server/second"));
    assert!(manager.instances().is_empty());

    assert!(UdpSocket::bind(first_addr).await.is_ok());
    manager.stop().await;
}
