use super::{Stage, StageReport};
use crate::error::Result;
use crate::pipeline::processing::VariantGrouper;
use crate::pipeline::PipelineContext;
use async_trait::async_trait;

/// Groups simple items into configurable parents
pub struct VariantGroupingStage {
    grouper: VariantGrouper,
}

impl VariantGroupingStage {
    pub fn new(grouper: VariantGrouper) -> Self {
        Self { grouper }
    }
}

#[async_trait]
impl Stage for VariantGroupingStage {
    async fn process(&self, ctx: &mut PipelineContext) -> Result<StageReport> {
        let report = self.grouper.group(&mut ctx.items);

        let message = format!(
            "{} configurables created from {} children",
            report.created_groups, report.grouped_children
        );
        Ok(StageReport::success(self.stage_name(), report.potential_groups, message)
            .with_created(report.created_groups)
            .with_metadata("split_groups", report.split_groups))
    }

    fn stage_name(&self) -> &'static str {
        "variant_grouping"
    }
}
