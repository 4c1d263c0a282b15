use std::{env, sync::Arc};

use anyhow::{bail, Context, Result};
use meter_client::domain::ApartmentId;
use reading_engine::{
    backend,
    config::AppConfig,
    intake, metrics_server, observability,
    store::{ReadingStore, RefreshOutcome},
    ReadingValidator, ReadingWorkflow, SubmitReport,
};
use time::OffsetDateTime;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        bail!("usage: submit_readings <apartment_id> <csv_file_path>");
    }
    let apartment_id: ApartmentId = args[1]
        .parse()
        .with_context(|| format!("invalid apartment id '{}'", args[1]))?;
    let batch = intake::read_batch_file(&args[2])?;
    let date = batch.date.unwrap_or_else(|| OffsetDateTime::now_utc().date());

    let cfg = AppConfig::load()?;
    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let backend = backend::connect(&cfg).await?;
    let store = Arc::new(ReadingStore::new(backend.clone()));
    let workflow = ReadingWorkflow::new(
        backend,
        store,
        ReadingValidator::new(cfg.submission.same_day_policy),
    );

    match workflow.submit(apartment_id, &batch.input, date).await? {
        SubmitReport::NothingToSubmit => {
            tracing::info!(apartment_id, "batch file has no readings");
        }
        SubmitReport::Invalid(errors) => {
            for (counter_id, error) in &errors {
                eprintln!("counter {counter_id}: {error}");
            }
            bail!("{} reading(s) failed validation; nothing was submitted", errors.len());
        }
        SubmitReport::Submitted { result, refresh } => {
            for item in &result.items {
                match item.outcome.rejected() {
                    None => println!("counter {}: accepted {}", item.draft.counter_id, item.draft.value),
                    Some(e) => println!("counter {}: rejected ({e})", item.draft.counter_id),
                }
            }
            if let RefreshOutcome::Failed(e) = &refresh {
                tracing::warn!(apartment_id, error = %e, "could not reload readings after submission");
            }
            if result.session_expired() {
                bail!("session expired; log in again and resubmit the rejected readings");
            }
            if !result.all_fulfilled() {
                bail!(
                    "{} of {} reading(s) rejected",
                    result.rejected().count(),
                    result.items.len()
                );
            }
        }
    }

    Ok(())
}
