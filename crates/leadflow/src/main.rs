//! Leadflow CLI - thin shell over the pipeline engine.

mod config_file;
mod crm_stub;
mod secrets;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use leadflow_engine::{Pipeline, PipelineDeps};
use leadflow_enrich::EnrichmentProviders;
use leadflow_export::CrmClient;
use leadflow_fetch::{HttpTransport, SecretResolver, Transport};
use leadflow_logging::{init_logging, LogConfig};
use leadflow_types::SourceId;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "leadflow", about = "Autonomous construction-lead pipeline", version)]
struct Cli {
    /// Path to the pipeline configuration file
    #[arg(short, long, default_value = "leadflow.toml")]
    config: PathBuf,

    /// Verbose console logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline until interrupted
    Run,
    /// Fetch and process due sources once, then exit
    RunOnce {
        /// Process only this source id
        #[arg(long)]
        source: Option<String>,
    },
    /// Run one export window immediately
    ExportNow,
    /// Print pipeline status
    Status,
    /// Validate the configuration and exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(LogConfig {
        app_name: "leadflow",
        verbose: cli.verbose,
    })?;

    let config = config_file::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    if matches!(cli.command, Command::CheckConfig) {
        config.validate()?;
        println!("Configuration OK: {} sources", config.sources.len());
        return Ok(());
    }

    let secrets: Arc<dyn SecretResolver> = Arc::new(secrets::EnvSecrets::new());
    let transport: Arc<dyn Transport> =
        Arc::new(HttpTransport::new(&config.fetch, Arc::clone(&secrets))?);
    let crm: Arc<dyn CrmClient> = Arc::new(crm_stub::LoggingCrm::new());
    let deps = PipelineDeps::with_defaults(transport, crm, EnrichmentProviders::default());

    let pipeline = Pipeline::new(config, deps).await?;

    match cli.command {
        Command::Run => {
            pipeline.start();
            info!("Pipeline running; Ctrl-C to stop");
            tokio::signal::ctrl_c()
                .await
                .context("waiting for interrupt")?;
            let report = pipeline.shutdown().await;
            println!(
                "Shutdown: {} workers completed, {} abandoned",
                report.tasks_completed, report.tasks_abandoned
            );
            println!("{}", report.metrics.summary());
        }
        Command::RunOnce { source } => {
            let only = source
                .map(|raw| raw.parse::<SourceId>())
                .transpose()
                .context("invalid source id")?;
            let report = pipeline.run_once(only).await?;
            println!(
                "Fetched {} sources ({} unchanged, {} failed, {} deferred): \
                 {} candidates, {} stored, {} merged, {} rejected",
                report.sources_fetched,
                report.sources_unchanged,
                report.sources_failed,
                report.sources_deferred,
                report.candidates,
                report.leads_stored,
                report.leads_merged,
                report.rejections,
            );
            pipeline.shutdown().await;
        }
        Command::ExportNow => {
            let report = pipeline.export_now().await;
            if report.skipped {
                println!("Export window skipped (off-hours or nothing qualified)");
            } else {
                println!("Exported {}, failed {}", report.exported, report.failed);
            }
            pipeline.shutdown().await;
        }
        Command::Status => {
            let status = pipeline.status().await;
            println!("Running: {}", status.running);
            println!(
                "Governor: paused={} fetch_slots={} worker_slots={}",
                status.governor.paused,
                status.governor.fetch_slots_available,
                status.governor.worker_slots_available,
            );
            println!(
                "Leads: {} total, {} awaiting export",
                status.leads_total, status.leads_exportable
            );
            println!("{}", status.metrics.summary());
            for (source, health) in status.sources {
                println!(
                    "  {source}: {} ok / {} failed, {} candidates, {} rejected",
                    health.fetches_succeeded,
                    health.fetches_failed,
                    health.candidates,
                    health.rejections,
                );
            }
        }
        Command::CheckConfig => unreachable!("handled above"),
    }

    Ok(())
}
