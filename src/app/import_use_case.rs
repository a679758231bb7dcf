use crate::app::ports::{ErrorReport, ImportEngine};
use crate::error::Result;
use crate::pipeline::{Pipeline, PipelineContext, StageReport};
use crate::types::{ItemCollection, Row};
use metrics::{counter, gauge};
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Summary of one profile run
#[derive(Debug)]
pub struct ImportRun {
    pub run_id: Uuid,
    pub profile: String,
    pub reports: Vec<StageReport>,
    pub rows: usize,
    pub error_report: ErrorReport,
}

/// Use case for running a profile's pipeline and handing the result to the import engine
pub struct ImportUseCase {
    pipeline: Pipeline,
    engine: Box<dyn ImportEngine>,
}

impl ImportUseCase {
    pub fn new(pipeline: Pipeline, engine: Box<dyn ImportEngine>) -> Self {
        Self { pipeline, engine }
    }

    /// Run all stages from an empty collection, then import.
    pub async fn run(&self) -> Result<ImportRun> {
        self.run_with_items(ItemCollection::new()).await
    }

    /// Run all stages starting from `items`, then import.
    pub async fn run_with_items(&self, items: ItemCollection) -> Result<ImportRun> {
        let run_id = Uuid::new_v4();
        let profile = self.pipeline.name().to_string();
        info!("🚀 Starting import run {} for profile {}", run_id, profile);

        let started = Instant::now();
        let mut ctx = PipelineContext::with_items(&profile, items);
        let reports = self.pipeline.run_with(&mut ctx).await?;

        let elapsed = started.elapsed().as_secs_f64();
        let items_per_second = if elapsed > 0.0 {
            ctx.items.len() as f64 / elapsed
        } else {
            ctx.items.len() as f64
        };
        info!(
            "Processed {} items in {:.2}s ({:.1} items/sec)",
            ctx.items.len(),
            elapsed,
            items_per_second
        );
        gauge!("feed_importer_items_per_second").set(items_per_second);

        let rows = flatten(&ctx.items);
        let row_count = rows.len();
        let error_report = self.engine.import(rows)?;

        if error_report.is_clean() {
            info!("✅ Import engine accepted {} rows", row_count);
        } else {
            warn!("Import engine reported {} errors:\n{}", error_report.errors.len(), error_report);
        }
        counter!("feed_importer_rows_imported_total").increment(row_count as u64);

        Ok(ImportRun {
            run_id,
            profile,
            reports,
            rows: row_count,
            error_report,
        })
    }
}

/// Flat import rows in collection order.
pub fn flatten(items: &ItemCollection) -> Vec<Row> {
    items.values().map(|item| item.to_row()).collect()
}
