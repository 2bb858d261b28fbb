//! CLI definitions for the `rendezvous` binary.
//!
//! Uses clap derive macros for argument parsing.

use clap::{Parser, Subcommand};

/// Two-party meetup coordination server.
#[derive(Parser)]
#[command(name = "rendezvous", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Suppress all log output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Default log filter when `RUST_LOG` is not set.
    pub fn log_directive(&self) -> &'static str {
        match self.verbose {
            0 if self.quiet => "error",
            0 => "info",
            1 => "info,rendezvous=debug",
            _ => "trace",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP and WebSocket server.
    Serve {
        /// Port to listen on (overrides config.toml and PORT).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides config.toml).
        #[arg(long)]
        host: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_with_overrides() {
        let cli = Cli::parse_from(["rendezvous", "-v", "serve", "--port", "9000"]);
        assert_eq!(cli.log_directive(), "info,rendezvous=debug");
        let Commands::Serve { port, host } = cli.command;
        assert_eq!(port, Some(9000));
        assert!(host.is_none());
    }

    #[test]
    fn test_quiet_and_verbosity_directives() {
        let quiet = Cli::parse_from(["rendezvous", "--quiet", "serve"]);
        assert_eq!(quiet.log_directive(), "error");
        let trace = Cli::parse_from(["rendezvous", "-vv", "serve"]);
        assert_eq!(trace.log_directive(), "trace");
        let default = Cli::parse_from(["rendezvous", "serve"]);
        assert_eq!(default.log_directive(), "info");
        assert!(!default.otel);
    }
}
