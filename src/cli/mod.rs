// CLI module for session-recovery
// Author: kelexine (https://github.com/kelexine)

use clap::{Parser, Subcommand};

/// session-recovery - resilient API requests with idempotent session teardown
#[derive(Parser, Debug)]
#[command(name = "session-recovery", version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode the claims of a session token (no signature verification)
    Inspect {
        /// Bearer token to decode
        #[arg(long, env = "SESSION_TOKEN")]
        token: Option<String>,
    },

    /// GET a JSON resource through the retrying client
    Fetch {
        /// Path relative to the configured base URL, e.g. `/api/me`
        path: String,

        /// Bearer token to send
        #[arg(long, env = "SESSION_TOKEN")]
        token: Option<String>,

        /// Print collected metrics in Prometheus text format afterwards
        #[arg(long)]
        metrics: bool,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fetch() {
        let args = Args::try_parse_from(["session-recovery", "fetch", "/api/me", "--token", "t"]).unwrap();
        match args.command {
            Command::Fetch {
                path,
                token,
                metrics,
            } => {
                assert_eq!(path, "/api/me");
                assert_eq!(token.as_deref(), Some("t"));
                assert!(!metrics);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_config() {
        let args = Args::try_parse_from(["session-recovery", "config"]).unwrap();
        assert!(matches!(args.command, Command::Config));
    }
}
