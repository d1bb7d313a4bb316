//! aaa-server - authentication and authorization-resolution service

use std::io::Read;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use aaa_server::{
    auth::SecretVerifier,
    cli::{Cli, Command},
    config::Config,
    gateway::Server,
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    match cli.command {
        Some(Command::HashSecret { ref secret }) => match hash_secret(&cli, secret.clone()) {
            Ok(hash) => {
                println!("{hash}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {e:#}");
                ExitCode::FAILURE
            }
        },
        Some(Command::Serve) | None => run_server(cli).await,
    }
}

/// Hash a client secret with the configured Argon2id parameters.
fn hash_secret(cli: &Cli, secret: Option<String>) -> anyhow::Result<String> {
    let secret = match secret {
        Some(s) => s,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading secret from stdin")?;
            buf.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    anyhow::ensure!(!secret.is_empty(), "secret must not be empty");

    let params = match cli.config.as_deref() {
        Some(path) => Config::load(Some(path))?.secrets,
        None => Config::default().secrets,
    };
    let verifier = SecretVerifier::new(&params)?;
    Ok(verifier.hash(&secret)?)
}

/// Load configuration and serve until shutdown
async fn run_server(cli: Cli) -> ExitCode {
    let config = match Config::load(cli.config.as_deref()) {
        Ok(mut config) => {
            // Apply CLI overrides
            if let Some(port) = cli.port {
                config.server.port = port;
            }
            if let Some(ref host) = cli.host {
                config.server.host = host.clone();
            }
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.server.port,
        issuer = %config.oidc.issuer,
        "Starting aaa-server"
    );

    let server = match Server::new(config).await {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to start server: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = server.run().await {
        error!("Server error: {e}");
        return ExitCode::FAILURE;
    }

    info!("Shutdown complete");
    ExitCode::SUCCESS
}
