use anyhow::Context;
use clap::Parser;
use swapmeet::{
    config::AppConfig,
    service::sweep_approved,
    telemetry::init_tracing,
    Clock, CompletionPolicy, SqliteExchangeStore, SystemClock,
};
use std::path::Path;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "sweeper")]
#[command(about = "Resolves approved exchanges whose date has passed into Successful or Failed")]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[arg(short, long, env = "SWAPMEET_DATABASE_URL")]
    database_url: Option<String>,

    /// Seconds between sweeps; overrides the config file
    #[arg(short, long)]
    interval: Option<u64>,

    /// Run a single sweep and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = if Path::new(&args.config).exists() {
        AppConfig::load_with_env_overrides(&args.config)?
    } else {
        let mut config = AppConfig::default();
        config.apply_env_overrides();
        config
    };
    if let Some(url) = args.database_url {
        config.database.url = url;
    }
    if let Some(interval) = args.interval {
        config.sweeper.interval_seconds = interval;
    }
    config.validate()?;

    init_tracing(&config.logging);

    let store = SqliteExchangeStore::from_config(&config.database)
        .await
        .with_context(|| format!("opening {}", config.database.url))?;
    let policy = CompletionPolicy::from(&config.engine);
    let clock = SystemClock;

    tracing::info!(
        database = %config.database.url,
        interval_seconds = config.sweeper.interval_seconds,
        failure_grace_hours = config.engine.failure_grace_hours,
        "Sweeper started"
    );

    if args.once {
        let resolved = sweep_approved(&store, clock.now(), &policy).await?;
        println!("Resolved {} exchange(s)", resolved);
        return Ok(());
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(config.sweeper.interval_seconds));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = sweep_approved(&store, clock.now(), &policy).await {
                    tracing::error!("Sweep failed: {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down sweeper");
                break;
            }
        }
    }

    Ok(())
}
