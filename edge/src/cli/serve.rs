use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use anyhow::Result;
use log::info;
use tokio::signal::ctrl_c;

use crate::{
    config::Configuration,
    listener,
    state::{SecretTable, State},
};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
/// Longer than the client's reconnect delay.
const HANDOVER_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn serve(cfg: Configuration, host: IpAddr) -> Result<()> {
    info!("booting with {} service secrets...", cfg.service_secrets.len());

    let state = Arc::new(State::new(
        SecretTable::new(cfg.service_secrets, cfg.global_secret),
        host,
        HANDSHAKE_TIMEOUT,
        HANDOVER_TIMEOUT,
    ));

    let addr = listener::start_listener(SocketAddr::new(host, cfg.port), state).await?;
    info!("listening on {addr} for tunnel connections");

    ctrl_c().await?;

    info!("shutting down...");

    Ok(())
}
