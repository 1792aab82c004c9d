use std::time::Duration;

use anyhow::Result;
use log::{debug, error, info, warn};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    pin, select,
    task::JoinHandle,
    time::sleep,
};
use tunnel::{bridge, write_auth, Closed};

use crate::config::{Configuration, Service};

/// Relayed bytes buffered while the local service is unreachable.
const MAX_PENDING: usize = 64 * 1024;

/// Fixed delays between the states of a tunnel. None of them grow.
#[derive(Debug, Clone, Copy)]
pub struct Intervals {
    /// After failing to reach the edge.
    pub connect_retry: Duration,
    /// After failing to send the handshake.
    pub auth_retry: Duration,
    /// After losing an established control connection.
    pub reconnect: Duration,
    /// Between attempts to reach the local service.
    pub local_retry: Duration,
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            connect_retry: Duration::from_secs(5),
            auth_retry: Duration::from_secs(3),
            reconnect: Duration::from_secs(3),
            local_retry: Duration::from_secs(2),
        }
    }
}

enum State {
    Disconnected(Duration),
    Connecting,
    Authenticating(TcpStream),
    Forwarding(TcpStream),
}

enum Forwarded {
    /// A session ran over the control connection and used it up.
    Session,
    /// The edge closed the control connection without relaying anything.
    Lost,
}

/// Spawns one tunnel task per configured service.
pub fn start_workers(cfg: &Configuration, intervals: Intervals) -> Vec<JoinHandle<()>> {
    cfg.services
        .iter()
        .map(|service| {
            let server = cfg.server_address.clone();
            let service = service.clone();

            tokio::spawn(run_tunnel(server, service, intervals))
        })
        .collect()
}

/// Keeps one control connection to `server` alive for `service`. Never returns.
pub async fn run_tunnel(server: String, service: Service, intervals: Intervals) {
    let name = service.service_name.as_str();
    let mut state = State::Connecting;

    loop {
        state = match state {
            State::Disconnected(delay) => {
                sleep(delay).await;
                State::Connecting
            }

            State::Connecting => match TcpStream::connect(&server).await {
                Ok(stream) => State::Authenticating(stream),
                Err(e) => {
                    warn!(
                        "[{name}] unable to reach edge at {server}: {e}, retrying in {:?}",
                        intervals.connect_retry
                    );
                    State::Disconnected(intervals.connect_retry)
                }
            },

            State::Authenticating(mut stream) => {
                match write_auth(&mut stream, &service.auth_message()).await {
                    Ok(()) => {
                        info!(
                            "[{name}] tunnel up (public :{} -> {})",
                            service.public_port, service.local_address
                        );
                        State::Forwarding(stream)
                    }
                    Err(e) => {
                        warn!("[{name}] failed to send handshake: {e}");
                        State::Disconnected(intervals.auth_retry)
                    }
                }
            }

            State::Forwarding(stream) => {
                match forward(stream, &service, intervals.local_retry).await {
                    Ok(Forwarded::Session) => {
                        debug!("[{name}] session finished, reconnecting");
                        State::Disconnected(Duration::ZERO)
                    }
                    Ok(Forwarded::Lost) => {
                        warn!(
                            "[{name}] disconnected from edge, retrying in {:?}",
                            intervals.reconnect
                        );
                        State::Disconnected(intervals.reconnect)
                    }
                    Err(e) => {
                        error!("[{name}] forwarding failed: {e}");
                        State::Disconnected(intervals.reconnect)
                    }
                }
            }
        };
    }
}

/// Connects the local service to the control connection as soon as the
/// tunnel is up, so services that speak first can greet the public side.
async fn forward(
    mut control: TcpStream,
    service: &Service,
    local_retry: Duration,
) -> Result<Forwarded> {
    let name = service.service_name.as_str();
    let mut pending = Vec::new();

    let Some(mut local) = dial_local(&mut control, &mut pending, service, local_retry).await?
    else {
        return Ok(Forwarded::Lost);
    };

    debug!("[{name}] {} connected", service.local_address);

    local.write_all(&pending).await?;
    let closed = bridge(control, local).await?;

    debug!("[{name}] session closed: {closed:?}");

    match closed {
        // the edge hung up before relaying anything, e.g. a rejected handshake
        Closed::Left(0) => Ok(Forwarded::Lost),
        _ => Ok(Forwarded::Session),
    }
}

/// Dials the local service until it answers. Keeps reading the control
/// connection in between so that relayed bytes are kept and the edge hanging
/// up is noticed; returns `None` in that case.
async fn dial_local(
    control: &mut TcpStream,
    pending: &mut Vec<u8>,
    service: &Service,
    retry: Duration,
) -> Result<Option<TcpStream>> {
    let name = service.service_name.as_str();
    let mut buf = [0; 4096];

    loop {
        match TcpStream::connect(&service.local_address).await {
            Ok(local) => return Ok(Some(local)),
            Err(e) => warn!(
                "[{name}] unable to reach local service {}: {e}, retrying in {retry:?}",
                service.local_address
            ),
        }

        let wait = sleep(retry);
        pin!(wait);

        loop {
            select! {
                _ = &mut wait => break,

                read = control.read(&mut buf), if pending.len() < MAX_PENDING => {
                    let read = read?;
                    if read == 0 {
                        return Ok(None);
                    }
                    pending.extend_from_slice(&buf[..read]);
                }
            }
        }
    }
}
