use std::collections::HashMap;

use chrono::{Duration as ChronoDuration, Utc};
use clap::Parser;
use dotenvy::dotenv;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use hv_core::analysis::runner::{analyze_email, RunOutcome};
use hv_core::analysis::AnalysisEngine;
use hv_core::db::{apply_schema, create_pool_from_url, emails, PgPool};
use hv_core::entities::EntityDetector;
use hv_core::llm::{LlmConfig, OpenAiChatModel};
use hv_core::queue::{AnalysisJob, AnalysisQueue, JobError, JobStatus};
use hv_core::subject::subject_hash;
use hv_core::EmailMessage;

#[derive(Debug, Parser)]
#[command(name = "hv-analysis-worker", about = "Run AI analysis over classified emails")]
struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    db_url: String,

    /// Worker id recorded on processing logs
    #[arg(long, default_value = "hv-analysis-worker")]
    worker_id: String,

    /// Emails fetched per polling round
    #[arg(long, default_value_t = 20)]
    batch_size: i64,

    /// Optional cap on emails to analyze in one run
    #[arg(long)]
    max_emails: Option<usize>,

    /// In-process retry budget per email
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,

    /// Base backoff in seconds between in-process retries
    #[arg(long, default_value_t = 30)]
    retry_backoff_secs: i64,

    /// Exit when nothing needs analysis instead of polling
    #[arg(long, default_value_t = false)]
    exit_on_empty: bool,

    /// Idle poll interval in milliseconds when running as a service
    #[arg(long, default_value_t = 5000)]
    idle_poll_interval_ms: u64,
}

async fn drain_queue(
    pool: &PgPool,
    engine: &AnalysisEngine<OpenAiChatModel>,
    detector: &EntityDetector,
    queue: &mut AnalysisQueue,
    by_email: &HashMap<i64, EmailMessage>,
    worker_id: &str,
) -> usize {
    let mut analyzed = 0usize;

    loop {
        let Some(job) = queue.begin_next(worker_id, Utc::now()) else {
            if queue.pending_count() == 0 {
                break;
            }
            // Everything left is waiting on its backoff gate.
            let next_due = queue
                .jobs
                .iter()
                .filter(|j| j.status == JobStatus::Pending)
                .filter_map(|j| j.next_attempt_at)
                .min()
                .unwrap_or_else(Utc::now);
            let wait = (next_due - Utc::now()).num_milliseconds().max(100) as u64;
            sleep(Duration::from_millis(wait)).await;
            continue;
        };
        let Some(email) = by_email.get(&job.email_id) else {
            queue.resolve(
                job.id,
                Err(JobError::Permanent {
                    message: "email missing from batch".into(),
                }),
            );
            continue;
        };

        let outcome = match analyze_email(pool, engine, detector, email).await {
            Ok(RunOutcome::Analyzed {
                tasks_created,
                confidence,
                cost_usd,
            }) => {
                analyzed += 1;
                hv_metrics::record_analysis_completed(confidence, cost_usd);
                hv_metrics::record_tasks_created("ai_analysis", tasks_created as u64);
                Ok(())
            }
            Ok(RunOutcome::Skipped) => Ok(()),
            Ok(RunOutcome::Degraded) => {
                hv_metrics::record_analysis_failed();
                Err(JobError::Retryable {
                    message: "all model passes failed".into(),
                })
            }
            Err(err) => {
                hv_metrics::record_analysis_failed();
                Err(JobError::Retryable {
                    message: err.to_string(),
                })
            }
        };
        queue.resolve(job.id, outcome);
    }

    for failed in queue.failed_jobs() {
        warn!(
            email_id = failed.email_id,
            attempts = failed.attempts,
            error = failed.last_error.as_deref().unwrap_or("unknown"),
            "analysis exhausted its retry budget"
        );
    }
    analyzed
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    hv_core::logging::init("hv-analysis-worker");
    hv_metrics::init_metrics("HV_ANALYSIS_METRICS_PORT", 9642);

    let args = Cli::parse();
    let llm_config = LlmConfig::from_env()?;
    let model_name = llm_config.model.clone();
    let engine = AnalysisEngine::new(OpenAiChatModel::new(llm_config)?);
    let detector = EntityDetector::default();

    let pool = create_pool_from_url(&args.db_url)?;
    apply_schema(&pool).await?;

    let status = pool.status();
    info!(
        size = status.size,
        available = status.available,
        worker_id = %args.worker_id,
        model = %model_name,
        "analysis worker started"
    );

    let mut analyzed = 0usize;
    let max_emails = args.max_emails.unwrap_or(usize::MAX);
    let failed_budget = i64::from(args.max_attempts);

    while analyzed < max_emails {
        let batch = emails::fetch_needing_analysis(&pool, args.batch_size, failed_budget).await?;
        if batch.is_empty() {
            if args.exit_on_empty {
                if analyzed == 0 {
                    info!("nothing needs analysis; exiting");
                }
                break;
            }
            sleep(Duration::from_millis(args.idle_poll_interval_ms)).await;
            continue;
        }

        let mut queue = AnalysisQueue::new(
            args.max_attempts,
            ChronoDuration::seconds(args.retry_backoff_secs),
        );
        let mut by_email: HashMap<i64, EmailMessage> = HashMap::new();
        for email in batch {
            let Some(email_id) = email.id else { continue };
            if queue.enqueue(AnalysisJob::new(email_id, &subject_hash(&email.subject))) {
                by_email.insert(email_id, email);
            }
        }

        analyzed +=
            drain_queue(&pool, &engine, &detector, &mut queue, &by_email, &args.worker_id).await;
    }

    info!(analyzed, "analysis worker run finished");
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("hv-analysis-worker failed: {err}");
        std::process::exit(1);
    }
}
