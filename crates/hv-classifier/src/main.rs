use chrono::Utc;
use clap::Parser;
use dotenvy::dotenv;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use hv_core::analysis::runner::classify_and_persist;
use hv_core::db::tasks::TaskInsert;
use hv_core::db::{
    apply_schema, create_pool_from_url, emails, housing_authorities, properties, tasks, PgPool,
};
use hv_core::entities::EntityDetector;
use hv_core::extraction::extract_facts;
use hv_core::matching::match_property;
use hv_core::synth::{synthesize_tasks, SynthesisInput};
use hv_core::EmailMessage;

#[derive(Debug, Parser)]
#[command(name = "hv-classifier", about = "Classify inbound emails and synthesize tasks")]
struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    db_url: String,

    /// Emails fetched per polling round
    #[arg(long, default_value_t = 50)]
    batch_size: i64,

    /// Optional cap on emails to process in one run
    #[arg(long)]
    max_emails: Option<usize>,

    /// Exit when no unclassified emails remain instead of polling
    #[arg(long, default_value_t = false)]
    exit_on_empty: bool,

    /// Idle poll interval in milliseconds when running as a service
    #[arg(long, default_value_t = 5000)]
    idle_poll_interval_ms: u64,
}

async fn process_email(
    pool: &PgPool,
    detector: &EntityDetector,
    email: &EmailMessage,
) -> Result<usize, Box<dyn std::error::Error>> {
    let (classification, freshly_classified) =
        classify_and_persist(pool, detector, email).await?;
    if !freshly_classified {
        // Another worker already triaged this email.
        return Ok(0);
    }
    hv_metrics::record_classified(classification.category.as_str());

    let email_id = match email.id {
        Some(id) => id,
        None => return Ok(0),
    };
    let body = email.body_preview_text();
    let facts = extract_facts(&email.subject, body);
    let authority = detector.detect_housing_authority(&email.sender_email, &email.subject);
    let utility = detector.detect_utility(&email.sender_email, &email.subject);

    let directory = properties::fetch_for_organization(pool, email.organization_id).await?;
    let property = match_property(None, 0.0, facts.property_address.as_deref(), &directory);

    let mut housing_authority_id = None;
    if let Some(kind) = authority {
        let authority_id =
            housing_authorities::find_or_create(pool, email.organization_id, kind).await?;
        housing_authority_id = Some(authority_id);
        if let Some(property_id) = property.property_id {
            properties::link_housing_authority(pool, property_id, authority_id).await?;
        }
    }

    let synthesized = synthesize_tasks(&SynthesisInput {
        category: classification.category,
        subject: &email.subject,
        body_preview: body,
        facts: &facts,
        authority,
        housing_authority_id,
        utility,
        property_id: property.property_id,
        today: Utc::now().date_naive(),
    });

    if synthesized.tasks.is_empty() {
        return Ok(0);
    }

    let existing = tasks::titles_for_email(pool, email_id).await?;
    let today = Utc::now().date_naive();
    let mut created = 0usize;
    for draft in &synthesized.tasks {
        if existing.iter().any(|title| title == &draft.title) {
            continue;
        }
        let insert = TaskInsert::from_draft(draft, email.organization_id, Some(email_id), today);
        match tasks::insert_task(pool, &insert).await {
            Ok(_) => created += 1,
            Err(err) => {
                warn!(email_id, title = %insert.title, error = %err, "task insert failed, continuing");
            }
        }
    }
    hv_metrics::record_tasks_created("rule_engine", created as u64);
    Ok(created)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    hv_core::logging::init("hv-classifier");
    hv_metrics::init_metrics("HV_CLASSIFIER_METRICS_PORT", 9641);

    let args = Cli::parse();
    let pool = create_pool_from_url(&args.db_url)?;
    apply_schema(&pool).await?;
    let detector = EntityDetector::default();

    let status = pool.status();
    info!(
        size = status.size,
        available = status.available,
        batch_size = args.batch_size,
        "classifier started"
    );

    let mut processed = 0usize;
    let max_emails = args.max_emails.unwrap_or(usize::MAX);

    while processed < max_emails {
        let batch = emails::fetch_unclassified(&pool, args.batch_size).await?;
        if batch.is_empty() {
            if args.exit_on_empty {
                if processed == 0 {
                    info!("no unclassified emails; exiting");
                }
                break;
            }
            sleep(Duration::from_millis(args.idle_poll_interval_ms)).await;
            continue;
        }

        for email in &batch {
            match process_email(&pool, &detector, email).await {
                Ok(tasks_created) => {
                    processed += 1;
                    info!(
                        email_id = email.id.unwrap_or(0),
                        subject = %email.subject,
                        tasks_created,
                        "email classified"
                    );
                }
                Err(err) => {
                    warn!(email_id = email.id.unwrap_or(0), error = %err, "classification failed, continuing batch");
                }
            }
            if processed >= max_emails {
                break;
            }
        }
    }

    info!(processed, "classifier run finished");
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("hv-classifier failed: {err}");
        std::process::exit(1);
    }
}
