use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use zbakd::core::executor::SystemExecutor;
use zbakd::core::notifications::create_notifier;
use zbakd::core::orchestrator::Orchestrator;
use zbakd::{adapters, config, context, logging};

#[derive(Parser)]
#[command(name = "zbakd")]
#[command(about = "Hotplug-triggered ZFS backup daemon", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    config: PathBuf,

    /// Run the pipeline once for every configured volume that is currently
    /// attached, then exit instead of waiting for hotplug events
    #[arg(long)]
    run_present: bool,

    /// Use the simulated hardware adapter, driven by stdin commands
    /// ('attach <label>' / 'detach <label>')
    #[arg(long)]
    simulation: bool,

    /// Enable debug logging
    #[arg(long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(logging::LogConfig {
        json: cli.json_logs,
        verbose: cli.verbose,
    });

    let config = config::load(&cli.config).context("failed to load configuration")?;
    info!("loaded configuration:\n{config}");

    let notifier = create_notifier(&config);
    let ctx = context::AppContext::new(config, notifier, Arc::new(SystemExecutor));
    let adapter = adapters::get_adapter(cli.simulation);
    let orchestrator = Orchestrator::new(ctx, adapter);

    if cli.run_present {
        return orchestrator.run_present().await;
    }

    let shutdown = orchestrator.shutdown_token();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for shutdown signal: {e}");
            return;
        }
        info!("interrupt received, shutting down");
        shutdown.cancel();
    });

    orchestrator.start().await
}
