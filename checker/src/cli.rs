//! # CLI Interface
//!
//! Defines the command-line argument structure for `knots-checker` using
//! `clap` derive. Supports four subcommands: `check`, `decode`, `serve`,
//! and `version`.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

use knots_filter::config::{DEFAULT_API_PORT, DEFAULT_METRICS_PORT};
use knots_filter::script::Network;

use crate::logging::LogFormat;

/// Bitcoin Knots spam-filter checker.
///
/// Decodes a raw transaction and runs it through Knots-style relay policy:
/// script templates, size and sigop limits, fee rate, dust, and overlay
/// protocol heuristics.
#[derive(Parser, Debug)]
#[command(
    name = "knots-checker",
    about = "Bitcoin Knots spam-filter checker",
    version,
    propagate_version = true
)]
pub struct KnotsCheckerCli {
    /// Log filter when `RUST_LOG` is unset. Defaults to `warn`, or to
    /// `info` for `serve`.
    #[arg(long, global = true, env = "KNOTS_LOG")]
    pub log_level: Option<String>,

    /// Log output format.
    #[arg(
        long,
        global = true,
        env = "KNOTS_LOG_FORMAT",
        value_enum,
        ignore_case = true,
        default_value_t = LogFormat::Pretty
    )]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate one transaction and print the verdict.
    ///
    /// Exits 0 when accepted, 2 when rejected, 1 on error.
    Check(CheckArgs),
    /// Decode one transaction and print it as JSON.
    Decode(DecodeArgs),
    /// Serve the HTTP API and Prometheus metrics.
    Serve(ServeArgs),
    /// Print version information and exit.
    Version,
}

/// How a verdict is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Pretty,
    Json,
}

/// Arguments for the `check` subcommand.
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Raw transaction: hex, `@path` to a file holding hex, or `-` for stdin.
    #[arg(long)]
    pub tx: String,

    /// Policy context file (JSON). Thresholds and known prevouts.
    #[arg(long, short = 'c', env = "KNOTS_CONTEXT")]
    pub context: Option<PathBuf>,

    /// A spent output, as `TXID:VOUT:VALUE:SCRIPTHEX`. Repeatable; takes
    /// precedence over the same outpoint in the context file.
    #[arg(long = "prevout", value_name = "TXID:VOUT:VALUE:SCRIPTHEX")]
    pub prevouts: Vec<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
    pub format: OutputFormat,
}

/// Arguments for the `decode` subcommand.
#[derive(Parser, Debug)]
pub struct DecodeArgs {
    /// Raw transaction: hex, `@path` to a file holding hex, or `-` for stdin.
    #[arg(long)]
    pub tx: String,

    /// Network used to render output addresses.
    #[arg(long, env = "KNOTS_NETWORK", default_value = "mainnet")]
    pub network: Network,
}

/// Arguments for the `serve` subcommand.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address for the JSON API.
    #[arg(long, env = "KNOTS_LISTEN", default_value_t = default_listen(DEFAULT_API_PORT))]
    pub listen: SocketAddr,

    /// Address for the Prometheus `/metrics` endpoint.
    #[arg(long, env = "KNOTS_METRICS_LISTEN", default_value_t = default_listen(DEFAULT_METRICS_PORT))]
    pub metrics_listen: SocketAddr,

    /// Policy context file (JSON) applied to every request.
    #[arg(long, short = 'c', env = "KNOTS_CONTEXT")]
    pub context: Option<PathBuf>,

    /// Network used to render addresses in `/decode`.
    #[arg(long, env = "KNOTS_NETWORK", default_value = "mainnet")]
    pub network: Network,
}

fn default_listen(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        // Ensures the derive macros produce a valid CLI definition.
        KnotsCheckerCli::command().debug_assert();
    }

    #[test]
    fn check_collects_repeated_prevouts() {
        let cli = KnotsCheckerCli::try_parse_from([
            "knots-checker",
            "check",
            "--tx",
            "00",
            "--prevout",
            "a:0:1:51",
            "--prevout",
            "b:1:2:51",
            "--format",
            "json",
        ])
        .unwrap();
        match cli.command {
            Commands::Check(args) => {
                assert_eq!(args.prevouts.len(), 2);
                assert_eq!(args.format, OutputFormat::Json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn decode_parses_network() {
        let cli = KnotsCheckerCli::try_parse_from([
            "knots-checker",
            "decode",
            "--tx",
            "00",
            "--network",
            "testnet",
        ])
        .unwrap();
        assert_eq!(cli.log_format, LogFormat::Pretty);
        match cli.command {
            Commands::Decode(args) => assert_eq!(args.network, Network::Testnet),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn log_flags_are_global() {
        let cli = KnotsCheckerCli::try_parse_from([
            "knots-checker",
            "serve",
            "--log-format",
            "json",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn serve_defaults_to_loopback() {
        let cli = KnotsCheckerCli::try_parse_from(["knots-checker", "serve"]).unwrap();
        match cli.command {
            Commands::Serve(args) => {
                assert!(args.listen.ip().is_loopback());
                assert_eq!(args.listen.port(), DEFAULT_API_PORT);
                assert_eq!(args.metrics_listen.port(), DEFAULT_METRICS_PORT);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
