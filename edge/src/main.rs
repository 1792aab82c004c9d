use anyhow::Result;
use clap::Parser;
use edge::{
    cli::{add_service::add_service, delete_service::delete_service, serve::serve, Cli, Commands},
    config::load_config,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let cfg = load_config(&cli.secrets, &cli.secret, &cli.port_file)?;
            serve(cfg, cli.host).await
        }
        Commands::AddService { name } => {
            let key = add_service(&cli.secrets, name)?;
            println!("{key}");
            Ok(())
        }
        Commands::DeleteService { name } => delete_service(&cli.secrets, name),
    }
}

fn init_logging() {
    let level = if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}
