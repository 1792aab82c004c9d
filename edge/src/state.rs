use std::{collections::HashMap, net::IpAddr, time::Duration};

use thiserror::Error;
use tokio::sync::{oneshot::Sender, Mutex};
use tunnel::AuthMessage;

use crate::listener::control::ControlConnection;

/// Everything a control connection handler needs. Built once at startup and
/// shared between all of them.
pub struct State {
    pub secrets: SecretTable,
    /// Address public listeners are bound on.
    pub public_host: IpAddr,
    pub handshake_timeout: Duration,
    /// How long a public listener outlives a finished session while it waits
    /// for the service's next control connection.
    pub handover_timeout: Duration,
    /// Bound public ports. Binding and releasing happen under this lock.
    pub ports: Mutex<HashMap<u16, PublicPort>>,
}

impl State {
    pub fn new(
        secrets: SecretTable,
        public_host: IpAddr,
        handshake_timeout: Duration,
        handover_timeout: Duration,
    ) -> Self {
        Self {
            secrets,
            public_host,
            handshake_timeout,
            handover_timeout,
            ports: Mutex::new(HashMap::new()),
        }
    }
}

/// A bound public port and the service it belongs to.
pub struct PublicPort {
    pub service: String,
    /// Set once a session has started on the port. The service's next
    /// control connection is handed over through it.
    pub handoff_tx: Option<Sender<ControlConnection>>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("wrong secret for service '{0}'")]
    WrongSecret(String),

    #[error("unauthorized access to service '{0}' with global secret")]
    Unauthorized(String),
}

/// Expected secrets per service, with a global secret for services that are
/// not listed.
pub struct SecretTable {
    services: HashMap<String, String>,
    global: String,
}

impl SecretTable {
    pub fn new<I>(services: I, global: String) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            services: services.into_iter().collect(),
            global,
        }
    }

    /// A listed service only accepts its own secret; the global secret is
    /// consulted for unlisted services alone.
    pub fn authorize(&self, auth: &AuthMessage) -> Result<(), AuthError> {
        match self.services.get(&auth.service) {
            Some(expected) if *expected == auth.secret => Ok(()),
            Some(_) => Err(AuthError::WrongSecret(auth.service.clone())),
            None if auth.secret == self.global => Ok(()),
            None => Err(AuthError::Unauthorized(auth.service.clone())),
        }
    }
}
