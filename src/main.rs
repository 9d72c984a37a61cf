use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use common::cli::{CommonArgs, CommonCommands, utils};
use querier::{AlertQuery, LogQuery, TraceQuery, VirtualBackend};

#[derive(Parser, Debug)]
#[command(name = "mirage", about = "Synthetic telemetry virtual backend")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Option<CommonCommands>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    utils::init_logging(&cli.common);

    let config = utils::load_config(cli.common.config.as_ref())?;
    let command = cli.command.unwrap_or_default();
    if utils::handle_common_command(&command, &config).await? {
        return Ok(());
    }

    utils::validate_config(&config)?;
    let backend = Arc::new(VirtualBackend::new(config));

    // Warm every cache once so the first dashboard query is served hot.
    report_snapshot(&backend).await?;
    log::info!("Virtual backend ready");

    // Real-time mode: a cooperative timer re-queries the backend so expired
    // snapshots regenerate; the engine itself has no clock.
    let ttl = backend.config().cache.ttl;
    let refresh_backend = Arc::clone(&backend);
    let refresh_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(ttl);
        interval.tick().await; // the warm-up above covered the first tick
        loop {
            interval.tick().await;
            if let Err(e) = report_snapshot(&refresh_backend).await {
                log::error!("Snapshot refresh failed: {e}");
            }
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl+c signal")?;
    log::info!("Shutting down");
    refresh_handle.abort();

    Ok(())
}

/// Query every telemetry family once and log dataset statistics.
async fn report_snapshot(backend: &VirtualBackend) -> Result<()> {
    let traces = backend.search_traces(TraceQuery::default()).await?;
    let logs = backend.search_logs(LogQuery::default()).await?;
    let alerts = backend.search_alerts(AlertQuery::default()).await?;
    let stats = backend.alert_statistics().await?;
    let topology = backend
        .get_service_topology(backend.default_window(), None)
        .await?;

    log::info!(
        "snapshot: {} traces, {} logs, {} alert events ({} active), {} services, {} call edges",
        traces.total,
        logs.total,
        alerts.total,
        stats.active,
        topology.nodes.len(),
        topology.edges.len()
    );
    Ok(())
}
