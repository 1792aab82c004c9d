use std::path::Path;

use anyhow::{anyhow, Result};
use log::info;

use crate::config::{load_service_secrets, write_service_secrets};

/// Removes `name` from the secrets file. The service then falls back to the
/// global secret.
pub fn delete_service(path: &Path, name: String) -> Result<()> {
    let mut secrets = load_service_secrets(path)?;

    secrets
        .remove(&name)
        .ok_or_else(|| anyhow!("service {name} not found"))?;

    write_service_secrets(path, &secrets)?;

    info!("service {name} deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::add_service::add_service;
    use tempfile::TempDir;

    #[test]
    fn removes_only_the_named_service() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("service_secrets.json");

        add_service(&path, "web".to_string()).unwrap();
        add_service(&path, "ssh".to_string()).unwrap();

        delete_service(&path, "web".to_string()).unwrap();

        let secrets = load_service_secrets(&path).unwrap();
        assert!(!secrets.contains_key("web"));
        assert!(secrets.contains_key("ssh"));
    }

    #[test]
    fn unknown_service_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("service_secrets.json");

        assert!(delete_service(&path, "web".to_string()).is_err());
    }
}
