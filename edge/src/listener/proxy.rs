use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info, warn};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    select,
    sync::oneshot::{channel, Receiver},
    time::timeout,
};
use tunnel::{bridge, Closed};

use crate::{listener::control::ControlConnection, state::State};

/// Client bytes held back while no public connection is being relayed.
const MAX_PENDING: usize = 64 * 1024;

/// Serves one public listener for as long as its service keeps a control
/// connection on it.
///
/// A control connection carries a single unframed byte stream, so it relays
/// one public connection at a time; further ones wait in the accept backlog.
/// When a session ends the control connection is spent, but the listener stays
/// bound for `handover_timeout` while the service's next control connection
/// is handed over to it. A client hanging up while idle releases the listener
/// at once.
pub async fn serve_public(state: Arc<State>, listener: TcpListener, first: ControlConnection) {
    let service = first.service.clone();
    let port = first.public_port;
    let mut control = first;

    loop {
        let handoff_rx = match serve_control(&state, &listener, control).await {
            Ok(Some(mut handoff_rx)) => {
                match timeout(state.handover_timeout, &mut handoff_rx).await {
                    Ok(Ok(next)) => {
                        control = next;
                        continue;
                    }
                    _ => Some(handoff_rx),
                }
            }
            Ok(None) => None,
            Err(e) => {
                error!("{e:#}");
                None
            }
        };

        let mut ports = state.ports.lock().await;

        // a handover may have landed after the timeout fired
        if let Some(next) = handoff_rx.and_then(|mut rx| rx.try_recv().ok()) {
            control = next;
            continue;
        }

        ports.remove(&port);
        drop(listener);
        info!("[{service}] released port {port}");
        return;
    }
}

/// Waits for a public connection and relays it over `control`. Returns the
/// receiving end of the handover once a session has run, or `None` when the
/// client hung up first.
async fn serve_control(
    state: &State,
    listener: &TcpListener,
    control: ControlConnection,
) -> Result<Option<Receiver<ControlConnection>>> {
    let ControlConnection {
        service,
        public_port: port,
        peer,
        mut stream,
    } = control;

    let mut pending = Vec::new();
    let mut buf = [0; 4096];

    let (public, addr) = loop {
        select! {
            read = stream.read(&mut buf), if pending.len() < MAX_PENDING => {
                let read = read
                    .with_context(|| format!("[{service}] control connection from {peer} failed"))?;
                if read == 0 {
                    info!("[{service}] client {peer} disconnected");
                    return Ok(None);
                }
                pending.extend_from_slice(&buf[..read]);
            }

            accepted = listener.accept() => {
                break accepted
                    .with_context(|| format!("[{service}] public listener on port {port} failed"))?;
            }
        }
    };

    let (handoff_tx, handoff_rx) = channel();
    if let Some(public_port) = state.ports.lock().await.get_mut(&port) {
        public_port.handoff_tx = Some(handoff_tx);
    }

    info!("[{service}] relaying public connection from {addr} to {peer}");

    match relay(public, &pending, stream).await {
        Ok(closed) => info!("[{service}] session from {addr} finished ({closed:?})"),
        Err(e) => warn!("[{service}] session from {addr} failed: {e:#}"),
    }

    Ok(Some(handoff_rx))
}

/// Replays what the client sent before the session, then bridges.
async fn relay(
    mut public: TcpStream,
    pending: &[u8],
    control: BufReader<TcpStream>,
) -> Result<Closed> {
    public
        .write_all(pending)
        .await
        .context("unable to replay buffered client bytes")?;

    Ok(bridge(public, control).await?)
}
