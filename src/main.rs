//! Greeter server entry point.

use std::process::ExitCode;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use greeter::config::{Config, LogFormat};
use greeter::lifecycle::install_panic_hook;
use greeter::server;

/// Minimal greeting HTTP server.
#[derive(Parser, Debug)]
#[command(name = "greeter")]
#[command(about = "Greeting HTTP server with supervisor-aware graceful shutdown")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,

    /// Listening port (overrides PORT).
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default).
    Serve {
        /// Listening port (overrides PORT).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check configuration validity.
    CheckConfig,
}

fn main() -> ExitCode {
    let args = Args::parse();

    match try_main(args) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn try_main(args: Args) -> anyhow::Result<ExitCode> {
    let config = Config::load().context("Failed to load configuration")?;

    init_logging(&config, args.verbose);
    install_panic_hook();

    match args.command {
        Some(Command::CheckConfig) => Ok(cmd_check_config(&config)),
        Some(Command::Serve { port }) => cmd_serve(config, port.or(args.port)),
        None => cmd_serve(config, args.port),
    }
}

fn init_logging(config: &Config, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("greeter=debug,access=info,tower_http=debug,info")
    } else {
        EnvFilter::try_new(&config.rust_log).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Text => registry.with(fmt::layer()).init(),
    }
}

/// Check configuration validity.
fn cmd_check_config(config: &Config) -> ExitCode {
    println!("======================================================================");
    println!("GREETER - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Validating configuration... ");
    if let Err(e) = config.validate() {
        println!("FAILED");
        println!("  Error: {}", e);
        return ExitCode::FAILURE;
    }
    println!("OK");

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Listen Address: {}", config.bind_addr());
    println!("  Reuse Port: {}", config.reuse_port);
    println!("  Shutdown Timeout: {}ms", config.shutdown_timeout_ms);
    println!("  Trust Proxy: {}", config.trust_proxy);
    println!(
        "  Supervisor: {} (resolved: {})",
        config.supervisor,
        config.effective_supervisor()
    );
    println!("  Log Format: {}", config.log_format);
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    ExitCode::SUCCESS
}

/// Run the server on a single-threaded runtime.
fn cmd_serve(mut config: Config, port_override: Option<u16>) -> anyhow::Result<ExitCode> {
    if let Some(port) = port_override {
        config.port = port;
    }

    config
        .validate()
        .map_err(|e| anyhow!("Configuration validation failed: {}", e))?;
    info!(port = config.port, supervisor = %config.effective_supervisor(), "Configuration loaded");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    let outcome = runtime
        .block_on(server::run(&config))
        .context("Server failed")?;

    info!(outcome = %outcome, "Exiting");
    // Exit straight away; a forced shutdown may leave tasks running.
    std::process::exit(outcome.exit_code());
}
