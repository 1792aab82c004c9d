use std::{collections::BTreeMap, fs::read_to_string, io::ErrorKind, path::Path};

use anyhow::{anyhow, bail, Context, Result};
use log::{info, warn};

pub const SECRETS_PATH: &str = "service_secrets.json";
pub const SECRET_PATH: &str = "secret.txt";
pub const PORT_PATH: &str = "port.txt";

/// Per-service secrets as stored on disk, service name to secret.
pub type ServiceSecrets = BTreeMap<String, String>;

pub struct Configuration {
    pub port: u16,
    pub service_secrets: ServiceSecrets,
    pub global_secret: String,
}

/// An unreadable per-service secret file is not fatal here: the edge starts
/// with the global secret only.
pub fn load_config(secrets: &Path, secret: &Path, port: &Path) -> Result<Configuration> {
    let service_secrets = load_service_secrets(secrets).unwrap_or_else(|e| {
        warn!("{e:#}, using global secret only");
        ServiceSecrets::new()
    });

    Ok(Configuration {
        service_secrets,
        global_secret: load_global_secret(secret)?,
        port: load_port(port)?,
    })
}

/// A missing file means no service has its own secret. Anything else that
/// goes wrong is an error, so a broken file is never overwritten.
pub fn load_service_secrets(path: &Path) -> Result<ServiceSecrets> {
    match read_to_string(path) {
        Ok(file) => {
            serde_json::from_str(&file).with_context(|| format!("invalid {}", path.display()))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("no {} found, using global secret only", path.display());
            Ok(ServiceSecrets::new())
        }
        Err(e) => Err(e).with_context(|| format!("unable to read {}", path.display())),
    }
}

pub fn write_service_secrets(path: &Path, secrets: &ServiceSecrets) -> Result<()> {
    let file = serde_json::to_string_pretty(secrets)?;
    std::fs::write(path, file).with_context(|| format!("unable to write {}", path.display()))?;
    Ok(())
}

/// The global secret is the raw file contents, trailing newline included.
pub fn load_global_secret(path: &Path) -> Result<String> {
    let secret = read_to_string(path)
        .with_context(|| format!("missing required {}", path.display()))?;

    // stricter than raw contents: an empty secret would let every unlisted
    // service in with an empty secret
    if secret.is_empty() {
        bail!("{} is empty", path.display());
    }

    Ok(secret)
}

pub fn load_port(path: &Path) -> Result<u16> {
    let file = read_to_string(path)
        .with_context(|| format!("unable to read port file {}", path.display()))?;

    let line = file
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .ok_or_else(|| anyhow!("port file {} is empty", path.display()))?;

    match line.parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => bail!("invalid port number in {}: {line}", path.display()),
    }
}
