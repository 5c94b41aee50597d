//! Command-line interface for the mnemo-server binary.
//!
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod init;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Mnemo - conversational memory server
#[derive(Parser, Debug)]
#[command(
    name = "mnemo-server",
    version,
    about = "Mnemo - multimodal streaming chat with windowed context and rolling summaries",
    after_help = "EXAMPLES:\n    \
                  mnemo-server init                 # Write mnemo.toml and data/\n    \
                  mnemo-server                      # Start the server\n    \
                  mnemo-server token --user alice   # Issue an access token\n    \
                  mnemo-server config --validate    # Check the configuration"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "mnemo.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server (the default)
    Serve,

    /// Write a default mnemo.toml, .env.example and the data directory
    Init {
        /// Directory to initialize
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite an existing mnemo.toml
        #[arg(short, long)]
        force: bool,

        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, default_value = "3000")]
        port: u16,

        /// Allow requests without a token
        #[arg(long)]
        anonymous: bool,
    },

    /// Issue an access token for a user id
    Token {
        #[arg(short, long)]
        user: String,
    },

    /// Show configuration information
    Config {
        /// Print the effective configuration as TOML
        #[arg(short = 'f', long)]
        full: bool,

        /// Only validate the configuration
        #[arg(long)]
        validate: bool,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_serve() {
        let cli = Cli::try_parse_from(["mnemo-server"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.config, PathBuf::from("mnemo.toml"));
    }

    #[test]
    fn test_token_command() {
        let cli = Cli::try_parse_from(["mnemo-server", "token", "--user", "alice"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Token { user }) if user == "alice"));
    }

    #[test]
    fn test_global_config_flag() {
        let cli =
            Cli::try_parse_from(["mnemo-server", "config", "--validate", "-c", "other.toml"])
                .unwrap();
        assert_eq!(cli.config, PathBuf::from("other.toml"));
        assert!(matches!(
            cli.command,
            Some(Commands::Config { validate: true, full: false })
        ));
    }
}
