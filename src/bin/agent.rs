use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use guardia_checks::{
    CheckBuffer, CheckScheduler, HttpSink, LogSink, Uplink,
    checks::build_checks,
    config::{Config, UplinkConfig, read_config_file},
    storage::{MetricStore, sqlite::SqliteBackend},
    util::{get_config_path, get_secret},
};
use tokio::spawn;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file, defaults to $AGENT_CONFIG or ./config.json
    #[arg(short)]
    file: Option<String>,
}

fn init() {
    dotenv::dotenv().ok();

    let filter = filter::Targets::new().with_targets(vec![
        ("guardia_checks", LevelFilter::DEBUG),
        ("agent", LevelFilter::TRACE),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    match &args.file {
        Some(file) => read_config_file(file),
        None => {
            let path = get_config_path();
            if Path::new(&path).exists() {
                read_config_file(&path)
            } else {
                warn!("no config file at {path}, using defaults");
                Ok(Config::default())
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = load_config(&args)?;

    let store = Arc::new(
        SqliteBackend::new(&config.storage.path)
            .await
            .context("failed to open metric store")?,
    );

    let shutdown = CancellationToken::new();
    let ctx = shutdown.child_token();
    let (buffer, receivers) = CheckBuffer::new(config.buffer_capacity);

    let uplink = match &config.uplink {
        Some(UplinkConfig { url, token }) => {
            let sink = HttpSink::new(url.clone(), token.clone().or_else(get_secret))?;
            info!("uploading metrics to {url}");
            spawn(Uplink::new(receivers, sink).run(shutdown.child_token()))
        }
        None => {
            info!("no uplink configured, metrics are only logged");
            spawn(Uplink::new(receivers, LogSink).run(shutdown.child_token()))
        }
    };

    let checks = build_checks(&config.check_settings(), &buffer, store.clone());
    let scheduler = CheckScheduler::spawn(checks, ctx);
    // the scheduled checks own the remaining producers
    drop(buffer);

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutting down");
    shutdown.cancel();

    scheduler.join().await;
    match uplink.await {
        Ok(delivered) => info!("uplink delivered {delivered} metrics"),
        Err(e) => error!("uplink task failed: {e}"),
    }

    store.close().await?;
    Ok(())
}
