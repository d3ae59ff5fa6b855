use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "chatbridge")]
#[command(version)]
#[command(about = "Websocket chat front-end for local and hosted language models", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Start the chat server (default)
    Serve {
        /// Address to bind, overrides server.host
        #[arg(long)]
        host: Option<String>,

        /// Port to bind, overrides server.port and PORT
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Write a default configuration file
    Init,
    /// Show the resolved backend and whether it is reachable
    Status,
    /// Show version information
    Version,
}

impl Cli {
    /// The subcommand to run, defaulting to `serve`
    pub fn command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or(Commands::Serve { host: None, port: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_serve() {
        let cli = Cli::parse_from(["chatbridge"]);
        assert_eq!(cli.command(), Commands::Serve { host: None, port: None });
        assert!(!cli.verbose);
    }

    #[test]
    fn test_serve_overrides() {
        let cli = Cli::parse_from([
            "chatbridge",
            "--config",
            "/etc/chatbridge.toml",
            "serve",
            "--host",
            "127.0.0.1",
            "--port",
            "9000",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/chatbridge.toml")));
        assert_eq!(
            cli.command(),
            Commands::Serve {
                host: Some("127.0.0.1".to_string()),
                port: Some(9000),
            }
        );
    }

    #[test]
    fn test_status_subcommand() {
        let cli = Cli::parse_from(["chatbridge", "-v", "status"]);
        assert!(cli.verbose);
        assert_eq!(cli.command(), Commands::Status);
    }
}
