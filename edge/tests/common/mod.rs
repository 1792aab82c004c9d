#![allow(dead_code)]

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use edge::{
    listener::start_listener,
    state::{SecretTable, State},
};
use tokio::{
    io::AsyncReadExt,
    net::{TcpListener, TcpStream},
    time::{sleep, timeout, Instant},
};

pub const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
pub const WAIT: Duration = Duration::from_secs(5);
/// How long test edges keep a public port for the next control connection.
pub const HANDOVER: Duration = Duration::from_secs(1);

/// A port nothing is listening on right now.
pub async fn free_port() -> u16 {
    let listener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Starts an edge on an ephemeral localhost port where `web` has its own
/// secret and everything else needs `global`.
pub async fn start_edge() -> SocketAddr {
    start_edge_on(SocketAddr::new(LOCALHOST, 0)).await
}

pub async fn start_edge_on(addr: SocketAddr) -> SocketAddr {
    let state = Arc::new(State::new(
        SecretTable::new(
            [("web".to_string(), "s3cr3t".to_string())],
            "global".to_string(),
        ),
        LOCALHOST,
        Duration::from_secs(1),
        HANDOVER,
    ));

    start_listener(addr, state).await.unwrap()
}

/// Connects to a public port, retrying while the edge is still binding it.
pub async fn connect_public(port: u16) -> TcpStream {
    let deadline = Instant::now() + WAIT;

    loop {
        match TcpStream::connect((LOCALHOST, port)).await {
            Ok(stream) => return stream,
            Err(_) if Instant::now() < deadline => sleep(Duration::from_millis(20)).await,
            Err(e) => panic!("public port {port} never opened: {e}"),
        }
    }
}

/// Waits until nothing accepts connections on `port` any more.
pub async fn wait_until_closed(port: u16) {
    let deadline = Instant::now() + WAIT;

    while TcpStream::connect((LOCALHOST, port)).await.is_ok() {
        assert!(Instant::now() < deadline, "public port {port} stayed open");
        sleep(Duration::from_millis(20)).await;
    }
}

/// Asserts the peer closes `stream` without sending anything.
pub async fn assert_closed(stream: &mut TcpStream) {
    let mut buf = [0; 16];
    let read = timeout(WAIT, stream.read(&mut buf))
        .await
        .expect("connection was not closed");

    // a reset counts as closed too
    if let Ok(read) = read {
        assert_eq!(read, 0, "unexpected bytes: {:?}", &buf[..read]);
    }
}
