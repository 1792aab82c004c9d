use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use log::{error, info};
use tokio::net::TcpListener;

use crate::state::State;

pub mod control;
pub mod proxy;

/// Binds the listener clients open their control connections to and serves
/// it in the background. Returns the bound address.
pub async fn start_listener(addr: SocketAddr, state: Arc<State>) -> Result<SocketAddr> {
    info!("starting control listener...");

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to listen on {addr}"))?;
    let local_addr = listener.local_addr()?;

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, peer)) => {
                    let state = state.clone();

                    tokio::spawn(async move {
                        if let Err(e) = control::handle_control_stream(socket, peer, state).await
                        {
                            error!("control connection from {peer} closed: {e:#}");
                        }
                    });
                }
                Err(e) => {
                    error!("failed to accept control connection: {e}");
                }
            }
        }
    });

    Ok(local_addr)
}
