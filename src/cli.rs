//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Authentication and authorization-resolution service
#[derive(Parser, Debug)]
#[command(name = "aaa-server")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "AAA_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "AAA_PORT")]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "AAA_HOST")]
    pub host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "AAA_LOG_LEVEL", global = true)]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "AAA_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the server (default)
    Serve,

    /// Print an Argon2id PHC hash of a client secret, for seeding client rows
    HashSecret {
        /// Secret to hash. Read from stdin when omitted.
        secret: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::parse_from(["aaa-server", "--port", "9000"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.port, Some(9000));
    }

    #[test]
    fn hash_secret_takes_optional_argument() {
        let cli = Cli::parse_from(["aaa-server", "hash-secret", "s3cret"]);
        match cli.command {
            Some(Command::HashSecret { secret }) => assert_eq!(secret.as_deref(), Some("s3cret")),
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = Cli::parse_from(["aaa-server", "hash-secret"]);
        assert!(matches!(cli.command, Some(Command::HashSecret { secret: None })));
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::parse_from(["aaa-server", "serve", "--log-format", "json"]);
        assert_eq!(cli.log_format.as_deref(), Some("json"));
    }
}
