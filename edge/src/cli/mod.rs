use std::{net::IpAddr, path::PathBuf};

use clap::{Parser, Subcommand};

use crate::config::{PORT_PATH, SECRETS_PATH, SECRET_PATH};

pub mod add_service;
pub mod delete_service;
pub mod serve;

#[derive(Parser, Debug)]
#[command(name = "edge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Relays public TCP connections to tunnel clients behind NAT")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Per-service secrets, a JSON object of service name to secret
    #[arg(long, global = true, default_value = SECRETS_PATH)]
    pub secrets: PathBuf,

    /// Secret accepted for services without their own entry
    #[arg(long, global = true, default_value = SECRET_PATH)]
    pub secret: PathBuf,

    /// File holding the port clients connect to
    #[arg(long, global = true, default_value = PORT_PATH)]
    pub port_file: PathBuf,

    /// Address the control and public listeners are bound on
    #[arg(long, global = true, default_value = "0.0.0.0")]
    pub host: IpAddr,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Accept tunnel clients and relay their public ports (default)
    Serve,
    /// Generate a secret for a service and store it in the secrets file
    AddService { name: String },
    /// Remove a service from the secrets file
    DeleteService { name: String },
}
