use std::path::Path;

use anyhow::{bail, Result};
use log::info;
use rand::random;

use crate::config::{load_service_secrets, write_service_secrets};

/// Stores a freshly generated secret for `name` and returns it.
pub fn add_service(path: &Path, name: String) -> Result<String> {
    let mut secrets = load_service_secrets(path)?;

    if secrets.contains_key(&name) {
        bail!("service {name} already has a secret");
    }

    let key = generate_key();
    secrets.insert(name.clone(), key.clone());

    write_service_secrets(path, &secrets)?;

    info!("service {name} added");
    Ok(key)
}

fn generate_key() -> String {
    let bytes = random::<[u8; 32]>();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
