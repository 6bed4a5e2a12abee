use clap::Parser;
use grid_loadgen::{Config, Error, LoadGenerator, Result};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "grid-loadgen")]
#[command(about = "Smart-meter reading generator for Kafka", long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", env = "CONFIG_PATH", default_value = "config.toml")]
    config: PathBuf,

    #[arg(short, long, help = "Enable JSON output for logs")]
    json_logs: bool,

    #[arg(short, long, help = "Verbose logging")]
    verbose: bool,

    #[arg(short = 'n', long, help = "Readings to publish (0 runs until interrupted)")]
    records: Option<i64>,

    #[arg(short, long, help = "Readings per Kafka batch")]
    batch_size: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.json_logs, args.verbose);

    info!("Starting grid-loadgen");
    info!("Loading configuration from {:?}", args.config);

    let mut config = match Config::from_file(&args.config) {
        Ok(cfg) => {
            info!("Configuration loaded successfully");
            cfg
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };
    if let Some(records) = args.records {
        config.pipeline.target_records = records;
    }
    if let Some(batch_size) = args.batch_size {
        config.pipeline.batch_size = batch_size;
    }

    info!(
        kafka_brokers = ?config.kafka.brokers,
        kafka_topic = %config.kafka.topic,
        compression = %config.kafka.compression,
        acks = %config.kafka.acks,
        target_records = config.pipeline.target_records,
        batch_size = config.pipeline.batch_size,
        "Configuration summary"
    );

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone())?;

    match LoadGenerator::new(config).run(cancel).await {
        Ok(_) => Ok(()),
        Err(e) => {
            error!("Load generation failed: {}", e);
            Err(e)
        }
    }
}

fn spawn_signal_handler(cancel: CancellationToken) -> Result<()> {
    #[cfg(unix)]
    let mut terminate =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .map_err(Error::Io)?;

    tokio::spawn(async move {
        #[cfg(unix)]
        let terminated = terminate.recv();
        #[cfg(not(unix))]
        let terminated = std::future::pending::<Option<()>>();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Received SIGINT, initiating shutdown"),
            _ = terminated => info!("Received SIGTERM, initiating shutdown"),
        }
        cancel.cancel();
    });

    Ok(())
}

fn init_logging(json: bool, verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("grid_loadgen=debug,info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("grid_loadgen=info,warn"))
    };

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_span_list(false)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
