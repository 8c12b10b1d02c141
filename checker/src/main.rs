// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Knots Spam-Filter Checker
//!
//! Entry point for the `knots-checker` binary. Parses CLI arguments,
//! initializes logging, and either evaluates a single transaction or serves
//! the HTTP API with Prometheus metrics.
//!
//! The binary supports four subcommands:
//!
//! - `check`   — evaluate one transaction, exit 0 (accepted) / 2 (rejected)
//! - `decode`  — print a decoded transaction as JSON
//! - `serve`   — run the HTTP API and metrics endpoint
//! - `version` — print build version information
//!
//! Any error exits with status 1.

mod api;
mod cli;
mod input;
mod logging;
mod metrics;
mod report;
#[cfg(test)]
mod test_vectors;

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;

use knots_filter::policy::check_hex;
use knots_filter::transaction::Transaction;

use cli::{Commands, KnotsCheckerCli, OutputFormat};
use metrics::CheckerMetrics;

/// Exit status of a `check` whose transaction was rejected.
const EXIT_REJECTED: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = KnotsCheckerCli::parse();

    let fallback = match cli.command {
        Commands::Serve(_) => logging::SERVE_FILTER,
        _ => logging::QUIET_FILTER,
    };
    logging::init_logging(
        logging::env_filter(cli.log_level.as_deref(), fallback),
        cli.log_format,
    );

    let result = match cli.command {
        Commands::Check(args) => check(args),
        Commands::Decode(args) => decode(args),
        Commands::Serve(args) => serve(args).await.map(|()| ExitCode::SUCCESS),
        Commands::Version => {
            print_version();
            Ok(ExitCode::SUCCESS)
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Evaluates one transaction and prints the verdict.
fn check(args: cli::CheckArgs) -> Result<ExitCode> {
    let hex = input::read_tx_arg(&args.tx)?;
    let ctx = input::build_context(args.context.as_deref(), &args.prevouts)?;
    let verdict = check_hex(&hex, &ctx).context("cannot evaluate transaction")?;

    match args.format {
        OutputFormat::Pretty => print!("{}", report::VerdictReport(&verdict)),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&verdict).context("failed to serialize verdict")?
        ),
    }

    Ok(if verdict.accepted {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_REJECTED)
    })
}

/// Decodes one transaction and prints it as JSON.
fn decode(args: cli::DecodeArgs) -> Result<ExitCode> {
    let hex = input::read_tx_arg(&args.tx)?;
    let tx = Transaction::from_hex(&hex).context("cannot decode transaction")?;
    let view = report::TransactionView::new(&tx, args.network);
    println!(
        "{}",
        serde_json::to_string_pretty(&view).context("failed to serialize transaction")?
    );
    Ok(ExitCode::SUCCESS)
}

/// Runs the HTTP API and the metrics endpoint until a shutdown signal.
async fn serve(args: cli::ServeArgs) -> Result<()> {
    let config = input::load_config(args.context.as_deref())?;

    tracing::info!(
        listen = %args.listen,
        metrics_listen = %args.metrics_listen,
        network = %args.network,
        prevouts = config.prevouts.len(),
        "starting knots-checker"
    );

    // --- Metrics ---
    let checker_metrics =
        Arc::new(CheckerMetrics::new().context("failed to register prometheus metrics")?);

    // --- Application state ---
    let app_state = api::AppState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        config,
        args.network,
        Arc::clone(&checker_metrics),
    );

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("failed to bind API listener on {}", args.listen))?;
    tracing::info!("API server listening on {}", args.listen);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&checker_metrics));
    let metrics_listener = tokio::net::TcpListener::bind(args.metrics_listen)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", args.metrics_listen))?;
    tracing::info!("Metrics server listening on {}", args.metrics_listen);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            res.context("API server error")?;
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            res.context("metrics server error")?;
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    tracing::info!("knots-checker stopped");
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("knots-checker {}", env!("CARGO_PKG_VERSION"));
    println!("rustc         {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
