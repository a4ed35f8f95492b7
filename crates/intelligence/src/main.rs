use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use tracing_subscriber::EnvFilter;

use intelligence::{
    clients::{AlertSource, AlertmanagerClient, GrafanaClient},
    config::Config,
    metrics,
    pipeline::{shutdown_channel, stream_from, Pipeline, Shutdown},
};

#[derive(Parser)]
#[command(author, version, about = "Silence-aware Grafana annotations for Alertmanager alerts", long_about = None)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Increase verbosity (-v debug, -vv trace); overrides server.verbose when higher
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Seconds between pipeline runs (defaults to server.interval)
    #[arg(long)]
    interval: Option<u64>,

    /// Run the pipeline once and exit
    #[arg(long)]
    once: bool,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!("Unable to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Fetches the current alerts and drains them through one pipeline activation.
async fn run_cycle(pipeline: &Pipeline, alerts: &dyn AlertSource, shutdown: Shutdown) {
    let events = match alerts.list_alerts().await {
        Ok(events) => events,
        Err(e) => {
            warn!("Unable to fetch alerts: {}", e);
            Vec::new()
        }
    };
    let received = events.len();

    let mut output = pipeline.run(stream_from(events, shutdown.clone()), shutdown).await;
    let mut forwarded = 0usize;
    while let Some(event) = output.recv().await {
        forwarded += 1;
        trace!(?event, "Processed alert");
    }

    info!(received, forwarded, "Pipeline run finished");
    match metrics::gather_metrics() {
        Ok(text) => trace!("Metrics:\n{}", text),
        Err(e) => debug!("Unable to gather metrics: {}", e),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    init_tracing(cli.verbose.max(config.server.verbose));
    metrics::register_metrics()?;
    if !config.annotation.is_authenticated() {
        warn!("Annotation token is not set. Grafana requests will be unauthenticated.");
    }
    info!(
        services = config.services.len(),
        alertmanager = %config.alerts.alertmanager_url,
        grafana = %config.annotation.url,
        "Loaded configuration"
    );

    let alertmanager = Arc::new(AlertmanagerClient::new(&config)?);
    let grafana = Arc::new(GrafanaClient::new(&config)?);
    let pipeline = Pipeline::new(&config, alertmanager.clone(), grafana.clone(), grafana)?;

    let (trigger, shutdown) = shutdown_channel();
    tokio::spawn(async move {
        wait_for_shutdown().await;
        info!("Shutdown signal received");
        trigger.trigger();
    });

    let interval = cli
        .interval
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.server.interval());

    loop {
        run_cycle(&pipeline, alertmanager.as_ref(), shutdown.clone()).await;
        if cli.once || shutdown.is_cancelled() {
            break;
        }
        let mut shutdown = shutdown.clone();
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.cancelled() => break,
        }
    }

    let counts = pipeline.silence_table().counters();
    info!(
        active = counts.active,
        expired = counts.expired,
        pending = counts.pending,
        "Silences seen"
    );
    Ok(())
}
