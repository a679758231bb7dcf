use super::steps::{Stage, StageReport};
use super::PipelineContext;
use crate::error::{ImportError, Result};
use crate::types::ItemCollection;
use metrics::counter;
use std::time::Instant;
use tracing::{error, info, instrument};

/// Ordered list of stages run over one item collection
pub struct Pipeline {
    name: String,
    stages: Vec<Box<dyn Stage>>,
}

/// Items and per-stage reports of a completed run
#[derive(Debug)]
pub struct PipelineOutcome {
    pub items: ItemCollection,
    pub reports: Vec<StageReport>,
}

impl Pipeline {
    pub fn new(name: &str, stages: Vec<Box<dyn Stage>>) -> Self {
        Self {
            name: name.to_string(),
            stages,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.stage_name()).collect()
    }

    /// Runs every stage starting from an empty collection.
    pub async fn run(&self) -> Result<PipelineOutcome> {
        let mut ctx = PipelineContext::new(&self.name);
        let reports = self.run_with(&mut ctx).await?;
        Ok(PipelineOutcome {
            items: ctx.items,
            reports,
        })
    }

    /// Runs every stage against an existing context.
    ///
    /// A stage error aborts the run and is returned wrapped with the stage name.
    #[instrument(skip(self, ctx), fields(pipeline = %self.name))]
    pub async fn run_with(&self, ctx: &mut PipelineContext) -> Result<Vec<StageReport>> {
        info!("🚀 Starting pipeline '{}' with {} stages", self.name, self.stages.len());
        let mut reports = Vec::with_capacity(self.stages.len());

        for (index, stage) in self.stages.iter().enumerate() {
            let name = stage.stage_name();
            info!("🔄 Executing stage {}/{}: {}", index + 1, self.stages.len(), name);
            let started = Instant::now();

            match stage.process(ctx).await {
                Ok(report) => {
                    info!(
                        "✅ Stage '{}' completed in {:.2}s: {} ({} items in collection)",
                        name,
                        started.elapsed().as_secs_f64(),
                        report.message,
                        ctx.items.len()
                    );
                    counter!("feed_importer_stage_runs_total", "stage" => name).increment(1);
                    reports.push(report);
                }
                Err(e) => {
                    error!("❌ Stage '{}' failed: {}", name, e);
                    counter!("feed_importer_stage_failures_total", "stage" => name).increment(1);
                    return Err(ImportError::stage(name, e));
                }
            }
        }

        info!("🎉 Pipeline '{}' finished with {} items", self.name, ctx.items.len());
        Ok(reports)
    }
}
