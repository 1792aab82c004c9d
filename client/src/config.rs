use std::{collections::HashSet, fs::read_to_string, path::Path};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tunnel::AuthMessage;

pub const CONFIG_PATH: &str = "client.json";

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Configuration {
    pub server_address: String,
    pub services: Vec<Service>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Service {
    pub service_name: String,
    pub public_port: u16,
    pub local_address: String,
    pub secret: String,
}

impl Service {
    pub fn auth_message(&self) -> AuthMessage {
        AuthMessage {
            secret: self.secret.clone(),
            service: self.service_name.clone(),
            public_port: self.public_port,
        }
    }
}

pub fn load_config(path: impl AsRef<Path>) -> Result<Configuration> {
    let path = path.as_ref();

    let file =
        read_to_string(path).with_context(|| format!("unable to read {}", path.display()))?;
    let config: Configuration =
        serde_json::from_str(&file).with_context(|| format!("invalid {}", path.display()))?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Configuration) -> Result<()> {
    if config.services.is_empty() {
        bail!("no services defined");
    }

    let mut names = HashSet::new();
    for service in &config.services {
        if service.public_port == 0 {
            bail!("service {} has public port 0", service.service_name);
        }

        if !names.insert(service.service_name.as_str()) {
            bail!("service {} is defined more than once", service.service_name);
        }
    }

    Ok(())
}
