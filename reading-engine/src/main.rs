use std::collections::BTreeMap;

use anyhow::{bail, Result};
use meter_client::{
    domain::{ApartmentId, CounterId},
    ReadingsBackend,
};
use reading_engine::{
    aggregate::{consumption, group_by_period},
    backend,
    chart::{ChartData, ChartPalette, ChartProjector},
    config::AppConfig,
    metrics_server, observability,
    store::{ReadingStore, RefreshOutcome},
    summary::{reading_history, summarize, CounterSummary, HistoryRow},
};
use serde::Serialize;
use time::OffsetDateTime;

#[derive(Serialize)]
struct ApartmentReport {
    apartment_id: ApartmentId,
    apartment_number: String,
    /// Set when the latest refresh failed and this report shows older data.
    stale: bool,
    counters: Vec<CounterSummary>,
    history: BTreeMap<CounterId, Vec<HistoryRow>>,
    readings_chart: ChartData,
    consumption_chart: ChartData,
    integrity_warnings: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;

    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let backend = backend::connect(&cfg).await?;
    let store = ReadingStore::new(backend.clone());
    let projector = ChartProjector::new(ChartPalette::from_config(&cfg.charts));
    let granularity = cfg.report.granularity;
    let today = OffsetDateTime::now_utc().date();

    let apartment_ids: Vec<ApartmentId> = if !cfg.report.apartment_ids.is_empty() {
        cfg.report.apartment_ids.clone()
    } else if let Some(user_id) = &cfg.report.user_id {
        backend
            .user_apartments(user_id)
            .await?
            .into_iter()
            .map(|a| a.id)
            .collect()
    } else {
        bail!("configure report.apartment_ids or report.user_id");
    };
    tracing::info!(apartments = apartment_ids.len(), ?granularity, "building consumption reports");

    for apartment_id in apartment_ids {
        let stale = match store.refresh(apartment_id).await {
            RefreshOutcome::Failed(_) => true,
            RefreshOutcome::Committed(_) | RefreshOutcome::Superseded => false,
        };
        let Some(apartment) = store.snapshot().apartment(apartment_id) else {
            tracing::error!(apartment_id, "no readings available, skipping");
            continue;
        };

        let grouped = group_by_period(&apartment, granularity);
        let series = consumption(&grouped);

        let report = ApartmentReport {
            apartment_id,
            apartment_number: apartment.apartment_number.clone(),
            stale,
            counters: summarize(&apartment, &series, today),
            history: apartment
                .counters
                .iter()
                .map(|c| (c.id, reading_history(c)))
                .collect(),
            readings_chart: projector.readings_chart(&grouped),
            consumption_chart: projector.consumption_chart(&series),
            integrity_warnings: series.warnings.len(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}
