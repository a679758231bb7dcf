use super::{Stage, StageReport};
use crate::app::ports::AttributeOptionStore;
use crate::error::Result;
use crate::pipeline::processing::AttributeOptionReconciler;
use crate::pipeline::PipelineContext;
use async_trait::async_trait;
use std::sync::Arc;

/// Creates missing attribute options before the items are imported
pub struct AttributeOptionsStage {
    store: Arc<dyn AttributeOptionStore>,
    attributes: Vec<String>,
}

impl AttributeOptionsStage {
    pub fn new(store: Arc<dyn AttributeOptionStore>, attributes: Vec<String>) -> Self {
        Self { store, attributes }
    }
}

#[async_trait]
impl Stage for AttributeOptionsStage {
    async fn process(&self, ctx: &mut PipelineContext) -> Result<StageReport> {
        let created = AttributeOptionReconciler::new(self.store.as_ref())
            .reconcile(&ctx.items, &self.attributes)?;
        let total: usize = created.values().sum();

        let report = StageReport::success(
            self.stage_name(),
            self.attributes.len(),
            format!("{} options created for {} attributes", total, self.attributes.len()),
        )
        .with_created(total);

        Ok(created
            .into_iter()
            .fold(report, |report, (code, count)| report.with_metadata(&code, count)))
    }

    fn stage_name(&self) -> &'static str {
        "attribute_options"
    }
}
