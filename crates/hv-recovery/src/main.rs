use chrono::{Duration as ChronoDuration, Utc};
use clap::Parser;
use dotenvy::dotenv;
use tokio::time::{sleep, Duration};
use tracing::info;

use hv_core::db::{analysis_logs, apply_schema, create_pool_from_url};

#[derive(Debug, Parser)]
#[command(
    name = "hv-recovery",
    about = "Fail stale processing analysis logs so their emails retry"
)]
struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    db_url: String,

    /// Minutes a log may sit in processing before it counts as stale
    #[arg(long, default_value_t = 15)]
    max_processing_minutes: i64,

    /// Run once and exit instead of sweeping on an interval
    #[arg(long, default_value_t = false)]
    once: bool,

    /// Sweep interval in seconds when running as a service
    #[arg(long, default_value_t = 300)]
    sweep_interval_secs: u64,
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    hv_core::logging::init("hv-recovery");
    hv_metrics::init_metrics("HV_RECOVERY_METRICS_PORT", 9643);

    let args = Cli::parse();
    let pool = create_pool_from_url(&args.db_url)?;
    apply_schema(&pool).await?;

    let max_processing = ChronoDuration::minutes(args.max_processing_minutes);
    info!(
        max_processing_minutes = args.max_processing_minutes,
        once = args.once,
        "recovery sweeper started"
    );

    loop {
        let reclaimed =
            analysis_logs::fail_stale_processing(&pool, Utc::now(), max_processing).await?;
        hv_metrics::record_stale_reclaimed(reclaimed);
        if reclaimed > 0 {
            info!(reclaimed, "reclaimed stale analysis logs");
        }
        if args.once {
            break;
        }
        sleep(Duration::from_secs(args.sweep_interval_secs)).await;
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("hv-recovery failed: {err}");
        std::process::exit(1);
    }
}
