use std::{net::SocketAddr, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use log::info;
use tokio::{
    io::BufReader,
    net::{TcpListener, TcpStream},
    time::timeout,
};
use tunnel::read_auth;

use crate::{
    listener::proxy::serve_public,
    state::{PublicPort, State},
};

/// An authenticated client connection, bound to one service and one public
/// port for as long as it lives.
pub struct ControlConnection {
    pub service: String,
    pub public_port: u16,
    pub peer: SocketAddr,
    /// Buffered so nothing read past the handshake is lost.
    pub stream: BufReader<TcpStream>,
}

pub async fn handle_control_stream(
    stream: TcpStream,
    peer: SocketAddr,
    state: Arc<State>,
) -> Result<()> {
    let mut stream = BufReader::new(stream);

    let auth = timeout(state.handshake_timeout, read_auth(&mut stream))
        .await
        .map_err(|_| anyhow!("no handshake within {:?}", state.handshake_timeout))?
        .context("invalid auth payload")?;

    state.secrets.authorize(&auth).context("authorization failed")?;

    let public_addr = SocketAddr::new(state.public_host, auth.public_port);

    let control = ControlConnection {
        service: auth.service,
        public_port: auth.public_port,
        peer,
        stream,
    };

    let mut ports = state.ports.lock().await;

    if let Some(port) = ports.get_mut(&control.public_port) {
        let handoff_tx = match port.handoff_tx.take() {
            Some(tx) if port.service == control.service => tx,
            other => {
                port.handoff_tx = other;
                bail!(
                    "[{}] {public_addr} is already in use by {}",
                    control.service,
                    port.service
                );
            }
        };

        info!("[{}] handing {public_addr} over to {peer}", control.service);

        // sent under the lock, so the port cannot be released in between
        return handoff_tx
            .send(control)
            .map_err(|control| anyhow!("[{}] {public_addr} was released", control.service));
    }

    let listener = TcpListener::bind(public_addr)
        .await
        .with_context(|| format!("[{}] failed to bind {public_addr}", control.service))?;

    ports.insert(
        control.public_port,
        PublicPort {
            service: control.service.clone(),
            handoff_tx: None,
        },
    );
    drop(ports);

    info!("[{}] accepted tunnel from {peer} on {public_addr}", control.service);

    serve_public(state, listener, control).await;
    Ok(())
}
