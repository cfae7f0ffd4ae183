mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use cli::Cli;
use folder_watch::quit::QuitSignal;
use folder_watch::{LogProcessor, NotifySource, Supervisor, WatchConfig, register};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "folder_watch=debug"
    } else {
        "folder_watch=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = WatchConfig::load(&cli.config)
        .with_context(|| format!("cannot start without a valid config ({})", cli.config.display()))?;

    let folders = register(&config.folders);
    if folders.is_empty() {
        warn!("no usable folders configured, consumers will idle until quit");
    }

    let supervisor = Supervisor::new(NotifySource, LogProcessor)
        .with_consumers(cli.consumers.unwrap_or_else(|| config.consumer_count()))
        .with_shutdown_timeout(config.shutdown_timeout());

    let quit = QuitSignal::stdin(config.quit_key());
    quit.prompt();

    let stop = supervisor.token();
    let report = supervisor
        .run(folders, async move {
            let reason = quit.wait(&stop).await;
            info!(?reason, "quit requested");
        })
        .await;

    info!(?report, "done");
    Ok(())
}
